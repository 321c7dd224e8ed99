//! Voting-round lookup.
//!
//! The attestation network finalizes in discrete voting rounds. The round
//! containing a given timestamp is read from a registry contract on the
//! destination chain; proofs are keyed by that round id.

use crate::AttestationError;
use alloy_sol_types::SolCall;
use relayer_chains::contracts::IRoundRegistry;
use relayer_chains::ChainAdapter;
use relayer_types::Address;
use std::sync::Arc;

pub struct RoundRegistry {
	adapter: Arc<dyn ChainAdapter>,
	registry: Address,
}

impl RoundRegistry {
	pub fn new(adapter: Arc<dyn ChainAdapter>, registry: Address) -> Self {
		Self { adapter, registry }
	}

	/// Returns the id of the voting round containing `timestamp`.
	pub async fn round_id_for(&self, timestamp: u64) -> Result<u64, AttestationError> {
		let call = IRoundRegistry::roundIdForTimestampCall { timestamp };
		let bytes = self
			.adapter
			.read_contract(&self.registry, call.abi_encode())
			.await?;

		let round = IRoundRegistry::roundIdForTimestampCall::abi_decode_returns(&bytes, true)
			.map_err(|e| AttestationError::Decode(format!("roundIdForTimestamp: {}", e)))?
			._0;

		Ok(round as u64)
	}
}
