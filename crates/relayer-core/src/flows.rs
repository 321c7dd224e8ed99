//! Per-feed update flows, one state machine per topology.
//!
//! A flow drives a feed end-to-end: sample, (for the attested paths)
//! capture or relay plus attestation and proof assembly, then the
//! destination update. The scheduler runs at most one flow at a time; the
//! flow itself performs many async operations.

use crate::sink::{LogLevel, LogSink};
use async_trait::async_trait;
use relayer_attestation::{AttestationClient, AttestationError, RoundRegistry};
use relayer_chains::ChainRegistry;
use relayer_source::{price_e6, Eligibility, PriceSourceService};
use relayer_types::{
	AttestationEvent, ChainId, DeliveryEvent, EventBus, Feed, FlowEvent, PriceSample, Proof,
	RelayerEvent, Topology, TransactionHash, TransactionKind, TransactionReceipt,
};
use relayer_delivery::UpdateSubmitter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// A flow failure, carrying the step it died in so the log line alone is
/// enough to diagnose without replay.
#[derive(Debug, Error)]
#[error("{step}: {message}")]
pub struct FlowError {
	pub step: &'static str,
	pub message: String,
}

impl FlowError {
	fn new(step: &'static str, err: impl std::fmt::Display) -> Self {
		Self {
			step,
			message: err.to_string(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct FlowOutcome {
	/// Price written (or observed, for the native path), at 6 decimals.
	pub price_e6: u128,
	/// Receipt of the final destination update.
	pub receipt: Option<TransactionReceipt>,
}

/// The scheduler's view of a flow implementation.
#[async_trait]
pub trait FeedFlow: Send + Sync {
	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, FlowError>;
	async fn run(&self, feed: &Feed) -> Result<FlowOutcome, FlowError>;
}

/// Production flow runner wired to the real subsystems.
pub struct FlowRunner {
	chains: Arc<ChainRegistry>,
	source: Arc<PriceSourceService>,
	attestation: Arc<AttestationClient>,
	rounds: Arc<RoundRegistry>,
	submitter: Arc<UpdateSubmitter>,
	destination_chain_id: ChainId,
	bus: EventBus,
	sink: Arc<LogSink>,
}

impl FlowRunner {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		chains: Arc<ChainRegistry>,
		source: Arc<PriceSourceService>,
		attestation: Arc<AttestationClient>,
		rounds: Arc<RoundRegistry>,
		submitter: Arc<UpdateSubmitter>,
		destination_chain_id: ChainId,
		bus: EventBus,
		sink: Arc<LogSink>,
	) -> Self {
		Self {
			chains,
			source,
			attestation,
			rounds,
			submitter,
			destination_chain_id,
			bus,
			sink,
		}
	}

	fn convert(&self, feed: &Feed, sample: &PriceSample) -> Result<u128, FlowError> {
		price_e6(
			sample.sqrt_price_x96,
			feed.token0.decimals,
			feed.token1.decimals,
			feed.invert,
		)
		.map_err(|e| FlowError::new("convert_price", e))
	}

	fn publish_confirmed(&self, feed: &Feed, receipt: &TransactionReceipt, kind: TransactionKind) {
		self.bus
			.publish(RelayerEvent::Delivery(DeliveryEvent::TransactionConfirmed {
				alias: feed.alias.clone(),
				receipt: receipt.clone(),
				kind,
			}))
			.ok();
	}

	/// One pass through the attestation phase: prepare, wait out the
	/// round, look up the round id, fetch and assemble the proof.
	async fn attest_once(
		&self,
		feed: &Feed,
		attested_chain: ChainId,
		tx_hash: &TransactionHash,
		confirmations: u64,
		block_timestamp: u64,
	) -> Result<Proof, AttestationError> {
		let request = self
			.attestation
			.prepare(attested_chain, tx_hash, confirmations)
			.await?;

		self.bus
			.publish(RelayerEvent::Attestation(AttestationEvent::RequestPrepared {
				alias: feed.alias.clone(),
				attempts: 1,
			}))
			.ok();

		self.attestation.await_finalization().await;

		let round = self.rounds.round_id_for(block_timestamp).await?;
		let proof = self.attestation.retrieve_proof(&request, round).await?;

		self.bus
			.publish(RelayerEvent::Attestation(AttestationEvent::ProofRetrieved {
				alias: feed.alias.clone(),
				voting_round: proof.voting_round,
			}))
			.ok();

		Ok(proof)
	}

	/// Runs the attestation phase, re-running it once if the proof came
	/// back incomplete. The capture/relay transaction hash is reusable, so
	/// only this phase repeats, never the paid transaction.
	async fn attest(
		&self,
		feed: &Feed,
		attested_chain: ChainId,
		tx_hash: &TransactionHash,
		block_timestamp: u64,
	) -> Result<Proof, FlowError> {
		let adapter = self
			.chains
			.get(attested_chain)
			.map_err(|e| FlowError::new("attestation", e))?;
		let confirmations = adapter.confirmations();

		let mut reran = false;
		loop {
			match self
				.attest_once(feed, attested_chain, tx_hash, confirmations, block_timestamp)
				.await
			{
				Ok(proof) => return Ok(proof),
				Err(AttestationError::Proof(e)) if !reran => {
					warn!(
						alias = %feed.alias,
						"Incomplete proof, re-running the attestation phase: {}",
						e
					);
					self.sink.record(
						LogLevel::Warn,
						format!("incomplete proof, re-running attestation: {}", e),
						Some(&feed.alias),
						Some(tx_hash.to_string()),
					);
					reran = true;
				}
				Err(AttestationError::BudgetExhausted {
					attempts,
					waited_secs,
					last_status,
				}) => {
					self.bus
						.publish(RelayerEvent::Attestation(AttestationEvent::BudgetExhausted {
							alias: feed.alias.clone(),
							attempts,
							last_status: last_status.clone(),
						}))
						.ok();
					return Err(FlowError::new(
						"attestation",
						format!(
							"budget exhausted after {} attempts ({}s), last status: {}",
							attempts, waited_secs, last_status
						),
					));
				}
				Err(other) => return Err(FlowError::new("attestation", other)),
			}
		}
	}

	async fn run_native(&self, feed: &Feed) -> Result<FlowOutcome, FlowError> {
		let sample = self
			.source
			.read(feed)
			.await
			.map_err(|e| FlowError::new("read_sample", e))?;
		let price = self.convert(feed, &sample)?;

		let (receipt, readback) = self
			.submitter
			.submit_native_update(feed)
			.await
			.map_err(|e| FlowError::new("submit_update", e))?;

		self.publish_confirmed(feed, &receipt, TransactionKind::NativeUpdate);
		self.sink.record(
			LogLevel::Info,
			format!(
				"native update confirmed, update #{} at value {}",
				readback.update_count, readback.latest_value
			),
			Some(&feed.alias),
			Some(receipt.hash.to_string()),
		);

		Ok(FlowOutcome {
			price_e6: price,
			receipt: Some(receipt),
		})
	}

	async fn run_direct(&self, feed: &Feed) -> Result<FlowOutcome, FlowError> {
		let sample = self
			.source
			.read(feed)
			.await
			.map_err(|e| FlowError::new("read_sample", e))?;
		let price = self.convert(feed, &sample)?;

		let capture_receipt = self
			.submitter
			.submit_capture(feed)
			.await
			.map_err(|e| FlowError::new("submit_capture", e))?;
		self.publish_confirmed(feed, &capture_receipt, TransactionKind::Capture);

		// The capture receipt's block is authoritative for the voting
		// round the attestation lands in.
		let adapter = self
			.chains
			.get(feed.source_chain_id)
			.map_err(|e| FlowError::new("read_capture_block", e))?;
		let block = adapter
			.get_block(Some(capture_receipt.block_number))
			.await
			.map_err(|e| FlowError::new("read_capture_block", e))?;

		let proof = self
			.attest(feed, feed.source_chain_id, &capture_receipt.hash, block.timestamp)
			.await?;

		let update_receipt = self
			.submitter
			.submit_proof(feed, &proof)
			.await
			.map_err(|e| FlowError::new("submit_proof", e))?;
		self.publish_confirmed(feed, &update_receipt, TransactionKind::ProofUpdate);

		Ok(FlowOutcome {
			price_e6: price,
			receipt: Some(update_receipt),
		})
	}

	async fn run_relay(&self, feed: &Feed) -> Result<FlowOutcome, FlowError> {
		let sample = self
			.source
			.read(feed)
			.await
			.map_err(|e| FlowError::new("read_sample", e))?;
		let price = self.convert(feed, &sample)?;

		let relay = self
			.submitter
			.submit_relay(feed, &sample, price)
			.await
			.map_err(|e| FlowError::new("submit_relay", e))?;
		self.publish_confirmed(feed, &relay.receipt, TransactionKind::Relay);

		// The relay transaction itself is what gets attested.
		let adapter = self
			.chains
			.get(self.destination_chain_id)
			.map_err(|e| FlowError::new("read_relay_block", e))?;
		let block = adapter
			.get_block(Some(relay.receipt.block_number))
			.await
			.map_err(|e| FlowError::new("read_relay_block", e))?;

		let proof = self
			.attest(
				feed,
				self.destination_chain_id,
				&relay.receipt.hash,
				block.timestamp,
			)
			.await?;

		let update_receipt = self
			.submitter
			.submit_proof(feed, &proof)
			.await
			.map_err(|e| FlowError::new("submit_proof", e))?;
		self.publish_confirmed(feed, &update_receipt, TransactionKind::ProofUpdate);

		Ok(FlowOutcome {
			price_e6: price,
			receipt: Some(update_receipt),
		})
	}
}

#[async_trait]
impl FeedFlow for FlowRunner {
	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, FlowError> {
		self.source
			.check_eligibility(feed)
			.await
			.map_err(|e| FlowError::new("eligibility", e))
	}

	async fn run(&self, feed: &Feed) -> Result<FlowOutcome, FlowError> {
		self.bus
			.publish(RelayerEvent::Flow(FlowEvent::Started {
				alias: feed.alias.clone(),
				topology: feed.topology.to_string(),
			}))
			.ok();
		info!(alias = %feed.alias, topology = %feed.topology, "Flow started");

		let result = match feed.topology {
			Topology::Native => self.run_native(feed).await,
			Topology::Direct => self.run_direct(feed).await,
			Topology::Relay => self.run_relay(feed).await,
		};

		match &result {
			Ok(outcome) => {
				self.bus
					.publish(RelayerEvent::Flow(FlowEvent::Completed {
						alias: feed.alias.clone(),
						price_e6: outcome.price_e6,
					}))
					.ok();
				info!(alias = %feed.alias, price_e6 = outcome.price_e6, "Flow completed");
			}
			Err(e) => {
				self.bus
					.publish(RelayerEvent::Flow(FlowEvent::Failed {
						alias: feed.alias.clone(),
						step: e.step.to_string(),
						error: e.message.clone(),
					}))
					.ok();
				error!(alias = %feed.alias, step = e.step, "Flow failed: {}", e.message);
				self.sink
					.error(&feed.alias, format!("{}: {}", e.step, e.message));
			}
		}

		result
	}
}
