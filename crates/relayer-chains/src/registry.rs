//! Registry of chain adapters keyed by chain id.

use crate::{ChainAdapter, ChainError};
use relayer_types::ChainId;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds one adapter per configured chain.
///
/// Built once at startup; lookups are read-only afterwards.
#[derive(Default)]
pub struct ChainRegistry {
	adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl ChainRegistry {
	pub fn new() -> Self {
		Self {
			adapters: HashMap::new(),
		}
	}

	pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
		self.adapters.insert(adapter.chain_id(), adapter);
	}

	pub fn get(&self, chain_id: ChainId) -> Result<Arc<dyn ChainAdapter>, ChainError> {
		self.adapters
			.get(&chain_id)
			.cloned()
			.ok_or(ChainError::UnknownChain(chain_id))
	}

	pub fn chain_ids(&self) -> Vec<ChainId> {
		self.adapters.keys().copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_types::{
		Address, BlockInfo, Transaction, TransactionHash, TransactionReceipt,
	};

	struct StubAdapter(ChainId);

	#[async_trait]
	impl ChainAdapter for StubAdapter {
		fn chain_id(&self) -> ChainId {
			self.0
		}

		fn confirmations(&self) -> u64 {
			1
		}

		async fn read_contract(
			&self,
			_to: &Address,
			_calldata: Vec<u8>,
		) -> Result<Vec<u8>, ChainError> {
			Ok(Vec::new())
		}

		async fn write_contract(&self, _tx: Transaction) -> Result<TransactionHash, ChainError> {
			Ok(TransactionHash(vec![0u8; 32]))
		}

		async fn wait_for_receipt(
			&self,
			hash: &TransactionHash,
			_confirmations: u64,
		) -> Result<TransactionReceipt, ChainError> {
			Ok(TransactionReceipt {
				hash: hash.clone(),
				block_number: 1,
				success: true,
			})
		}

		async fn get_block(&self, _number: Option<u64>) -> Result<BlockInfo, ChainError> {
			Ok(BlockInfo {
				number: 1,
				timestamp: 0,
			})
		}
	}

	#[test]
	fn test_register_and_get() {
		let mut registry = ChainRegistry::new();
		registry.register(Arc::new(StubAdapter(ChainId(114))));

		assert!(registry.get(ChainId(114)).is_ok());
		assert!(matches!(
			registry.get(ChainId(1)),
			Err(ChainError::UnknownChain(ChainId(1)))
		));
	}
}
