//! Reader strategy implementations, one per topology.

pub mod native;
pub mod record;
pub mod relay_fetch;

pub use native::NativeReader;
pub use record::RecordReader;
pub use relay_fetch::RelayFetchReader;

use crate::SourceError;
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use relayer_chains::contracts::ISourcePool;
use relayer_chains::ChainAdapter;
use relayer_types::{Address, Feed, PriceSample};

/// Reads the pool's current state and the enclosing block, shared by every
/// strategy that samples a pool directly.
pub(crate) async fn read_pool_state(
	adapter: &dyn ChainAdapter,
	feed: &Feed,
) -> Result<PriceSample, SourceError> {
	let pool = &feed.source_pool;

	let slot0_bytes = adapter
		.read_contract(pool, ISourcePool::slot0Call {}.abi_encode())
		.await?;
	let slot0 = ISourcePool::slot0Call::abi_decode_returns(&slot0_bytes, true)
		.map_err(|e| SourceError::Decode(format!("slot0: {}", e)))?;

	let liquidity_bytes = adapter
		.read_contract(pool, ISourcePool::liquidityCall {}.abi_encode())
		.await?;
	let liquidity = ISourcePool::liquidityCall::abi_decode_returns(&liquidity_bytes, true)
		.map_err(|e| SourceError::Decode(format!("liquidity: {}", e)))?
		._0;

	let token0_bytes = adapter
		.read_contract(pool, ISourcePool::token0Call {}.abi_encode())
		.await?;
	let token0 = ISourcePool::token0Call::abi_decode_returns(&token0_bytes, true)
		.map_err(|e| SourceError::Decode(format!("token0: {}", e)))?
		._0;

	let token1_bytes = adapter
		.read_contract(pool, ISourcePool::token1Call {}.abi_encode())
		.await?;
	let token1 = ISourcePool::token1Call::abi_decode_returns(&token1_bytes, true)
		.map_err(|e| SourceError::Decode(format!("token1: {}", e)))?
		._0;

	let block = adapter.get_block(None).await?;

	Ok(PriceSample {
		sqrt_price_x96: U256::from_be_slice(&slot0.sqrtPriceX96.to_be_bytes::<20>()),
		tick: slot0.tick.as_i32(),
		liquidity,
		token0: Address(token0.as_slice().to_vec()),
		token1: Address(token1.as_slice().to_vec()),
		source_timestamp: block.timestamp,
		source_block: block.number,
	})
}
