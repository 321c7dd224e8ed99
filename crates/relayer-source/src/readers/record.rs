//! Direct topology: a capture transaction on the source chain snapshots the
//! price; the capture is then attested. Eligibility mirrors the capture
//! program's own gate so an ineligible call never costs a fee.

use crate::readers::read_pool_state;
use crate::{Eligibility, SourceError, SourceReader};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use relayer_chains::contracts::ICaptureProgram;
use relayer_chains::ChainRegistry;
use relayer_types::{Feed, PriceSample, Topology};
use std::sync::Arc;

pub struct RecordReader {
	chains: Arc<ChainRegistry>,
}

impl RecordReader {
	pub fn new(chains: Arc<ChainRegistry>) -> Self {
		Self { chains }
	}
}

#[async_trait]
impl SourceReader for RecordReader {
	fn topology(&self) -> Topology {
		Topology::Direct
	}

	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, SourceError> {
		let capture = feed
			.capture_program
			.as_ref()
			.ok_or_else(|| SourceError::Decode("direct feed without capture program".into()))?;
		let adapter = self.chains.get(feed.source_chain_id)?;

		let pool = alloy_primitives::Address::from_slice(&feed.source_pool.0);
		let bytes = adapter
			.read_contract(capture, ICaptureProgram::canUpdateCall { pool }.abi_encode())
			.await?;
		let can_update = ICaptureProgram::canUpdateCall::abi_decode_returns(&bytes, true)
			.map_err(|e| SourceError::Decode(format!("canUpdate: {}", e)))?
			._0;

		if can_update {
			Ok(Eligibility::Eligible)
		} else {
			Ok(Eligibility::Ineligible(
				"capture program interval not elapsed".to_string(),
			))
		}
	}

	/// Samples the pool off-chain. The authoritative block number and
	/// timestamp for a direct flow come from the capture receipt; the flow
	/// overwrites those fields once the capture confirms.
	async fn read(&self, feed: &Feed) -> Result<PriceSample, SourceError> {
		let adapter = self.chains.get(feed.source_chain_id)?;
		read_pool_state(adapter.as_ref(), feed).await
	}
}
