//! Relay topology: the pool state is read off-chain (no source-chain
//! transaction) and later relayed onto the destination chain.

use crate::readers::read_pool_state;
use crate::{Eligibility, SourceError, SourceReader};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use relayer_chains::contracts::IRelayProgram;
use relayer_chains::ChainRegistry;
use relayer_types::{ChainId, Feed, PriceSample, Topology};
use std::sync::Arc;

pub struct RelayFetchReader {
	chains: Arc<ChainRegistry>,
	/// Chain the relay program lives on.
	destination_chain_id: ChainId,
}

impl RelayFetchReader {
	pub fn new(chains: Arc<ChainRegistry>, destination_chain_id: ChainId) -> Self {
		Self {
			chains,
			destination_chain_id,
		}
	}
}

#[async_trait]
impl SourceReader for RelayFetchReader {
	fn topology(&self) -> Topology {
		Topology::Relay
	}

	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, SourceError> {
		let relay = feed
			.relay_program
			.as_ref()
			.ok_or_else(|| SourceError::Decode("relay feed without relay program".into()))?;
		let adapter = self.chains.get(self.destination_chain_id)?;

		let call = IRelayProgram::canRelayCall {
			sourceChainId: feed.source_chain_id.0,
			pool: alloy_primitives::Address::from_slice(&feed.source_pool.0),
		};
		let bytes = adapter.read_contract(relay, call.abi_encode()).await?;
		let can_relay = IRelayProgram::canRelayCall::abi_decode_returns(&bytes, true)
			.map_err(|e| SourceError::Decode(format!("canRelay: {}", e)))?
			._0;

		if can_relay {
			Ok(Eligibility::Eligible)
		} else {
			Ok(Eligibility::Ineligible(
				"relay program gate closed (interval or enablement)".to_string(),
			))
		}
	}

	async fn read(&self, feed: &Feed) -> Result<PriceSample, SourceError> {
		let adapter = self.chains.get(feed.source_chain_id)?;
		read_pool_state(adapter.as_ref(), feed).await
	}
}
