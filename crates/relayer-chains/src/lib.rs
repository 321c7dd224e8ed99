//! Chain adapters for connecting to the chains a feed spans.
//!
//! This crate provides a unified interface for interacting with blockchain
//! networks through the `ChainAdapter` trait: read contract state, send a
//! transaction, wait for a receipt, read a block. The surface is
//! intentionally small; everything the relayer does on-chain goes through
//! these four operations.

pub mod contracts;
pub mod implementations;
pub mod registry;
pub mod retry;

pub use implementations::evm::AlloyAdapter;
pub use registry::ChainRegistry;

use async_trait::async_trait;
use relayer_types::{Address, BlockInfo, ChainId, Transaction, TransactionHash, TransactionReceipt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Network error: {0}")]
	Network(String),

	/// The node reported a revert. The reason string is preserved verbatim;
	/// identical inputs fail deterministically again, so callers must not
	/// retry.
	#[error("Execution reverted: {0}")]
	Revert(String),

	#[error("Timeout: {0}")]
	Timeout(String),

	#[error("No adapter registered for chain {0}")]
	UnknownChain(ChainId),

	#[error("Invalid input: {0}")]
	InvalidInput(String),
}

/// Per-chain client used by every component that touches a chain.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
	/// Chain this adapter is connected to.
	fn chain_id(&self) -> ChainId;

	/// Confirmations considered final on this chain.
	fn confirmations(&self) -> u64;

	/// Calls a read-only contract function and returns the raw return data.
	async fn read_contract(&self, to: &Address, calldata: Vec<u8>) -> Result<Vec<u8>, ChainError>;

	/// Signs and submits a transaction. Never retried internally: a resend
	/// after an ambiguous failure could double-submit.
	async fn write_contract(&self, tx: Transaction) -> Result<TransactionHash, ChainError>;

	/// Waits until the transaction has the requested number of
	/// confirmations, polling with a deadline derived from the chain's
	/// block time.
	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ChainError>;

	/// Reads a block header; `None` means the latest block.
	async fn get_block(&self, number: Option<u64>) -> Result<BlockInfo, ChainError>;
}
