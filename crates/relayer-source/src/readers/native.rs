//! Native topology: the pool lives on the destination chain and is read
//! directly. No attestation, no extra transaction beyond the update itself.

use crate::readers::read_pool_state;
use crate::{Eligibility, SourceError, SourceReader};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use relayer_chains::contracts::IDestinationFeed;
use relayer_chains::ChainRegistry;
use relayer_types::{Clock, Feed, PriceSample, Topology};
use std::sync::Arc;

pub struct NativeReader {
	chains: Arc<ChainRegistry>,
	clock: Arc<dyn Clock>,
	/// Minimum seconds between destination updates.
	update_interval_secs: u64,
}

impl NativeReader {
	pub fn new(chains: Arc<ChainRegistry>, clock: Arc<dyn Clock>, update_interval_secs: u64) -> Self {
		Self {
			chains,
			clock,
			update_interval_secs,
		}
	}
}

#[async_trait]
impl SourceReader for NativeReader {
	fn topology(&self) -> Topology {
		Topology::Native
	}

	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, SourceError> {
		let adapter = self.chains.get(feed.source_chain_id)?;

		let bytes = adapter
			.read_contract(
				&feed.destination_program,
				IDestinationFeed::lastUpdateTimestampCall {}.abi_encode(),
			)
			.await?;
		let last_update = IDestinationFeed::lastUpdateTimestampCall::abi_decode_returns(&bytes, true)
			.map_err(|e| SourceError::Decode(format!("lastUpdateTimestamp: {}", e)))?
			._0;

		let now = self.clock.now_unix();
		let elapsed = now.saturating_sub(last_update);
		if elapsed >= self.update_interval_secs {
			Ok(Eligibility::Eligible)
		} else {
			Ok(Eligibility::Ineligible(format!(
				"native interval not elapsed: {}s of {}s",
				elapsed, self.update_interval_secs
			)))
		}
	}

	async fn read(&self, feed: &Feed) -> Result<PriceSample, SourceError> {
		let adapter = self.chains.get(feed.source_chain_id)?;
		read_pool_state(adapter.as_ref(), feed).await
	}
}
