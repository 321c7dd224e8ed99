//! Update submission.
//!
//! Writes verified values to the destination programs: the native update
//! for same-chain feeds, the capture call for direct feeds, and the relay
//! call plus proof submission for the attested paths. Every submission goes
//! through the chain adapter exactly once; writes are never retried. Relay
//! submissions pass the protocol invariant guard first so a transaction
//! that is certain to revert never leaves the process.

pub mod invariants;

pub use invariants::{InvariantError, ProtocolRules};

use alloy_primitives::{Address as AlloyAddress, FixedBytes, I256, U256};
use alloy_sol_types::SolCall;
use relayer_chains::contracts::{
	AttestedEvent, AttestedRequestBody, AttestedResponse, AttestedResponseBody, ICaptureProgram,
	IDestinationFeed, IRelayProgram, TransactionProof,
};
use relayer_chains::{ChainError, ChainRegistry};
use relayer_types::{
	truncate_hash, Address, ChainId, Clock, Feed, PriceSample, Proof, Transaction,
	TransactionReceipt,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Chain error: {0}")]
	Chain(ChainError),

	/// The destination program rejected the update. The reason is the
	/// program's own, verbatim; identical inputs fail deterministically
	/// again, so this is never retried.
	#[error("Rejected on-chain: {0}")]
	Rejected(String),

	#[error(transparent)]
	Invariant(#[from] InvariantError),

	#[error("Transaction {0} reverted")]
	TransactionFailed(String),

	#[error("Decode error: {0}")]
	Decode(String),

	#[error("Feed {0} is missing its {1} program address")]
	MissingProgram(String, String),
}

impl From<ChainError> for DeliveryError {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::Revert(reason) => DeliveryError::Rejected(reason),
			other => DeliveryError::Chain(other),
		}
	}
}

/// Public counters every destination feed exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReadback {
	pub latest_value: U256,
	pub last_update_timestamp: u64,
	pub update_count: u64,
}

/// Outcome of a relay submission.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
	pub receipt: TransactionReceipt,
	/// Source timestamp actually submitted, after the skew clamp.
	pub submitted_timestamp: u64,
}

/// Writes updates to the destination programs.
pub struct UpdateSubmitter {
	chains: Arc<ChainRegistry>,
	destination_chain_id: ChainId,
	rules: ProtocolRules,
	clock: Arc<dyn Clock>,
}

impl UpdateSubmitter {
	pub fn new(
		chains: Arc<ChainRegistry>,
		destination_chain_id: ChainId,
		rules: ProtocolRules,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			chains,
			destination_chain_id,
			rules,
			clock,
		}
	}

	pub fn rules(&self) -> &ProtocolRules {
		&self.rules
	}

	async fn send_and_confirm(
		&self,
		chain_id: ChainId,
		to: &Address,
		data: Vec<u8>,
	) -> Result<TransactionReceipt, DeliveryError> {
		let adapter = self.chains.get(chain_id).map_err(DeliveryError::from)?;

		let tx = Transaction {
			to: to.clone(),
			data,
			value: U256::ZERO,
			chain_id: chain_id.0,
			gas_limit: None,
		};

		let hash = adapter.write_contract(tx).await?;
		let receipt = adapter
			.wait_for_receipt(&hash, adapter.confirmations())
			.await?;

		if !receipt.success {
			warn!(tx_hash = %truncate_hash(&hash), "Transaction reverted");
			return Err(DeliveryError::TransactionFailed(hash.to_string()));
		}

		Ok(receipt)
	}

	/// Native topology: one "update from current state" transaction, then a
	/// read-back of the three public counters for confirmation.
	pub async fn submit_native_update(
		&self,
		feed: &Feed,
	) -> Result<(TransactionReceipt, FeedReadback), DeliveryError> {
		let receipt = self
			.send_and_confirm(
				feed.source_chain_id,
				&feed.destination_program,
				IDestinationFeed::updateFromNativePoolCall {}.abi_encode(),
			)
			.await?;

		let readback = self.read_feed_counters(feed).await?;
		info!(
			alias = %feed.alias,
			update_count = readback.update_count,
			"Native update confirmed"
		);

		Ok((receipt, readback))
	}

	/// Direct topology: invoke the capture program on the source chain and
	/// wait for the snapshot transaction to confirm.
	pub async fn submit_capture(&self, feed: &Feed) -> Result<TransactionReceipt, DeliveryError> {
		let capture = feed
			.capture_program
			.as_ref()
			.ok_or_else(|| DeliveryError::MissingProgram(feed.alias.clone(), "capture".into()))?;

		let call = ICaptureProgram::recordPriceCall {
			pool: AlloyAddress::from_slice(&feed.source_pool.0),
		};

		self.send_and_confirm(feed.source_chain_id, capture, call.abi_encode())
			.await
	}

	/// Relay topology: guard the sample against the relay program's rule
	/// set, clamp the timestamp, then submit the relay call on the
	/// destination chain.
	pub async fn submit_relay(
		&self,
		feed: &Feed,
		sample: &PriceSample,
		price_e6: u128,
	) -> Result<RelayOutcome, DeliveryError> {
		let relay = feed
			.relay_program
			.as_ref()
			.ok_or_else(|| DeliveryError::MissingProgram(feed.alias.clone(), "relay".into()))?;

		let adapter = self
			.chains
			.get(self.destination_chain_id)
			.map_err(DeliveryError::from)?;

		// Last accepted state for this (chain, pool) pair.
		let last_call = IRelayProgram::lastRelayCall {
			sourceChainId: feed.source_chain_id.0,
			pool: AlloyAddress::from_slice(&feed.source_pool.0),
		};
		let bytes = adapter
			.read_contract(relay, last_call.abi_encode())
			.await?;
		let last = IRelayProgram::lastRelayCall::abi_decode_returns(&bytes, true)
			.map_err(|e| DeliveryError::Decode(format!("lastRelay: {}", e)))?;

		let destination_now = adapter.get_block(None).await?.timestamp;

		self.rules
			.check_interval(self.clock.now_unix(), last.relayedAt)?;
		self.rules
			.check_monotonic(sample.source_block, last.sourceBlockNumber)?;
		let prior_e6 = u128::try_from(last.priceE6).unwrap_or(u128::MAX);
		self.rules.check_deviation(prior_e6, price_e6)?;

		let submitted_timestamp = self
			.rules
			.clamp_future_skew(sample.source_timestamp, destination_now);
		if submitted_timestamp != sample.source_timestamp {
			info!(
				alias = %feed.alias,
				candidate = sample.source_timestamp,
				clamped = submitted_timestamp,
				"Clamped source timestamp to the future-skew bound"
			);
		}

		let call = IRelayProgram::relayPriceCall {
			sourceChainId: feed.source_chain_id.0,
			pool: AlloyAddress::from_slice(&feed.source_pool.0),
			sqrtPriceX96: sample.sqrt_price_x96,
			tick: I256::try_from(i64::from(sample.tick))
				.map_err(|e| DeliveryError::Decode(format!("tick: {}", e)))?,
			liquidity: sample.liquidity,
			token0: AlloyAddress::from_slice(&sample.token0.0),
			token1: AlloyAddress::from_slice(&sample.token1.0),
			sourceTimestamp: submitted_timestamp,
			sourceBlockNumber: sample.source_block,
		};

		let receipt = self
			.send_and_confirm(self.destination_chain_id, relay, call.abi_encode())
			.await?;

		Ok(RelayOutcome {
			receipt,
			submitted_timestamp,
		})
	}

	/// Attested paths: submit the assembled proof to the destination
	/// program's proof-consuming entry point.
	pub async fn submit_proof(
		&self,
		feed: &Feed,
		proof: &Proof,
	) -> Result<TransactionReceipt, DeliveryError> {
		let encoded = encode_proof(proof)?;
		let call = IDestinationFeed::updateFromProofCall { proof: encoded };

		self.send_and_confirm(
			self.destination_chain_id,
			&feed.destination_program,
			call.abi_encode(),
		)
		.await
	}

	/// Reads the three public counters the destination feed exposes.
	pub async fn read_feed_counters(&self, feed: &Feed) -> Result<FeedReadback, DeliveryError> {
		// The destination program always lives on the destination chain;
		// for native feeds that is also the source chain.
		let adapter = self
			.chains
			.get(self.destination_chain_id)
			.map_err(DeliveryError::from)?;
		let program = &feed.destination_program;

		let bytes = adapter
			.read_contract(program, IDestinationFeed::latestValueCall {}.abi_encode())
			.await?;
		let latest_value = IDestinationFeed::latestValueCall::abi_decode_returns(&bytes, true)
			.map_err(|e| DeliveryError::Decode(format!("latestValue: {}", e)))?
			._0;

		let bytes = adapter
			.read_contract(
				program,
				IDestinationFeed::lastUpdateTimestampCall {}.abi_encode(),
			)
			.await?;
		let last_update_timestamp =
			IDestinationFeed::lastUpdateTimestampCall::abi_decode_returns(&bytes, true)
				.map_err(|e| DeliveryError::Decode(format!("lastUpdateTimestamp: {}", e)))?
				._0;

		let bytes = adapter
			.read_contract(program, IDestinationFeed::updateCountCall {}.abi_encode())
			.await?;
		let update_count = IDestinationFeed::updateCountCall::abi_decode_returns(&bytes, true)
			.map_err(|e| DeliveryError::Decode(format!("updateCount: {}", e)))?
			._0;

		Ok(FeedReadback {
			latest_value,
			last_update_timestamp,
			update_count,
		})
	}
}

/// Left-aligned UTF-8 tag padded to a 32-byte word, the convention the
/// verifier uses for attestation type and source id.
fn tag_to_word(tag: &str) -> Result<FixedBytes<32>, DeliveryError> {
	let bytes = tag.as_bytes();
	if bytes.len() > 32 {
		return Err(DeliveryError::Decode(format!(
			"tag '{}' exceeds 32 bytes",
			tag
		)));
	}
	let mut word = [0u8; 32];
	word[..bytes.len()].copy_from_slice(bytes);
	Ok(FixedBytes::from(word))
}

/// Converts the typed proof into the calldata structure the destination
/// verifier checks against the round's merkle root.
pub fn encode_proof(proof: &Proof) -> Result<TransactionProof, DeliveryError> {
	if proof.request_body.transaction_hash.0.len() != 32 {
		return Err(DeliveryError::Decode(
			"proof transaction hash must be 32 bytes".into(),
		));
	}

	let events = proof
		.response_body
		.events
		.iter()
		.map(|event| AttestedEvent {
			logIndex: event.log_index,
			emitterAddress: AlloyAddress::from_slice(&event.emitter.0),
			topics: event.topics.iter().map(|t| FixedBytes::from(*t)).collect(),
			data: event.data.clone().into(),
			removed: event.removed,
		})
		.collect();

	Ok(TransactionProof {
		merkleProof: proof
			.merkle_proof
			.iter()
			.map(|node| FixedBytes::from(*node))
			.collect(),
		data: AttestedResponse {
			attestationType: tag_to_word(&proof.attestation_type)?,
			sourceId: tag_to_word(&proof.source_id)?,
			votingRound: proof.voting_round,
			lowestUsedTimestamp: proof.lowest_used_timestamp,
			requestBody: AttestedRequestBody {
				transactionHash: FixedBytes::from_slice(&proof.request_body.transaction_hash.0),
				requiredConfirmations: proof.request_body.required_confirmations as u16,
			},
			responseBody: AttestedResponseBody {
				blockNumber: proof.response_body.block_number,
				timestamp: proof.response_body.timestamp,
				sourceAddress: AlloyAddress::from_slice(&proof.response_body.source_address.0),
				receivingAddress: AlloyAddress::from_slice(
					&proof.response_body.receiving_address.0,
				),
				value: proof.response_body.value,
				status: proof.response_body.status,
				events,
			},
		},
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::{ProofEvent, ProofRequestBody, ProofResponseBody, TransactionHash};

	fn sample_proof() -> Proof {
		Proof {
			attestation_type: "EVMTransaction".into(),
			source_id: "testETH".into(),
			voting_round: 841_223,
			lowest_used_timestamp: 1_700_000_000,
			request_body: ProofRequestBody {
				transaction_hash: TransactionHash(vec![0xab; 32]),
				required_confirmations: 2,
			},
			response_body: ProofResponseBody {
				block_number: 19_000_000,
				timestamp: 1_700_000_123,
				source_address: Address(vec![0x11; 20]),
				receiving_address: Address(vec![0x22; 20]),
				value: U256::ZERO,
				status: 1,
				events: vec![ProofEvent {
					log_index: 3,
					emitter: Address(vec![0x33; 20]),
					topics: vec![[0x44; 32]],
					data: vec![0xde, 0xad],
					removed: false,
				}],
			},
			merkle_proof: vec![[0x55; 32]],
		}
	}

	#[test]
	fn test_encode_proof_preserves_fields() {
		let encoded = encode_proof(&sample_proof()).unwrap();

		assert_eq!(encoded.data.votingRound, 841_223);
		assert_eq!(encoded.data.requestBody.requiredConfirmations, 2);
		assert_eq!(encoded.data.responseBody.blockNumber, 19_000_000);
		assert_eq!(encoded.data.responseBody.status, 1);
		assert_eq!(encoded.data.responseBody.events.len(), 1);
		assert_eq!(encoded.data.responseBody.events[0].logIndex, 3);
		assert_eq!(encoded.merkleProof.len(), 1);

		// Tags are left-aligned in their words.
		let tag = encoded.data.attestationType;
		assert_eq!(&tag[..14], b"EVMTransaction");
		assert!(tag[14..].iter().all(|b| *b == 0));
	}

	#[test]
	fn test_encode_proof_rejects_short_hash() {
		let mut proof = sample_proof();
		proof.request_body.transaction_hash = TransactionHash(vec![0xab; 20]);
		assert!(encode_proof(&proof).is_err());
	}

	#[test]
	fn test_oversized_tag_rejected() {
		let mut proof = sample_proof();
		proof.attestation_type = "x".repeat(40);
		assert!(encode_proof(&proof).is_err());
	}
}
