//! Alloy-based EVM chain adapter.
//!
//! Uses an HTTP provider with a wallet filler for submission, so signing
//! happens inside the provider stack with the single relayer key.

use crate::retry::with_read_retry;
use crate::{ChainAdapter, ChainError};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address as AlloyAddress, Bytes, FixedBytes, TxKind};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, TransactionInput, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use relayer_types::{
	truncate_hash, Address, BlockInfo, ChainId, Transaction, TransactionHash, TransactionReceipt,
};
use std::sync::Arc;

/// EVM adapter backed by Alloy.
pub struct AlloyAdapter {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	chain_id: ChainId,
	confirmations: u64,
	block_time_secs: u64,
}

impl AlloyAdapter {
	/// Connects to the given RPC endpoint with the relayer's signing key.
	pub fn new(
		rpc_url: &str,
		chain_id: ChainId,
		confirmations: u64,
		block_time_secs: u64,
		signer: PrivateKeySigner,
	) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Network(format!("Invalid RPC URL: {}", e)))?;

		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
			chain_id,
			confirmations,
			block_time_secs,
		})
	}

	fn to_alloy_address(address: &Address) -> Result<AlloyAddress, ChainError> {
		if address.0.len() != 20 {
			return Err(ChainError::InvalidInput(format!(
				"Address {} is not 20 bytes",
				address
			)));
		}
		let mut bytes = [0u8; 20];
		bytes.copy_from_slice(&address.0);
		Ok(AlloyAddress::from(bytes))
	}
}

/// Maps a provider error, preserving revert reasons verbatim so they can be
/// surfaced without retry.
fn classify_error(context: &str, err: impl std::fmt::Display) -> ChainError {
	let message = err.to_string();
	if message.contains("revert") || message.contains("execution reverted") {
		ChainError::Revert(message)
	} else {
		ChainError::Network(format!("{}: {}", context, message))
	}
}

#[async_trait]
impl ChainAdapter for AlloyAdapter {
	fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	fn confirmations(&self) -> u64 {
		self.confirmations
	}

	async fn read_contract(&self, to: &Address, calldata: Vec<u8>) -> Result<Vec<u8>, ChainError> {
		let to = Self::to_alloy_address(to)?;
		let request = TransactionRequest {
			to: Some(TxKind::Call(to)),
			input: TransactionInput {
				input: Some(Bytes::from(calldata)),
				data: None,
			},
			..Default::default()
		};

		let bytes = with_read_retry("read_contract", || {
			let request = request.clone();
			async move {
				self.provider
					.call(&request)
					.await
					.map_err(|e| classify_error("Contract call failed", e))
			}
		})
		.await?;

		Ok(bytes.to_vec())
	}

	async fn write_contract(&self, tx: Transaction) -> Result<TransactionHash, ChainError> {
		let to = Self::to_alloy_address(&tx.to)?;
		let request = TransactionRequest {
			chain_id: Some(tx.chain_id),
			to: Some(TxKind::Call(to)),
			value: Some(tx.value),
			gas: tx.gas_limit,
			input: TransactionInput {
				input: Some(Bytes::from(tx.data)),
				data: None,
			},
			..Default::default()
		};

		// Send transaction - the provider's wallet handles signing. No
		// retry here: an ambiguous failure must not double-submit.
		let pending_tx = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| classify_error("Failed to send transaction", e))?;

		let tx_hash = *pending_tx.tx_hash();
		let hash = TransactionHash(tx_hash.0.to_vec());
		tracing::info!(tx_hash = %truncate_hash(&hash), chain = %self.chain_id, "Submitted transaction");

		Ok(hash)
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ChainError> {
		if hash.0.len() != 32 {
			return Err(ChainError::InvalidInput("Transaction hash must be 32 bytes".into()));
		}
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		let poll_interval = tokio::time::Duration::from_secs(self.block_time_secs.max(1));
		// Allow a few block times per confirmation, capped at one hour.
		let seconds_per_confirmation = self.block_time_secs.max(1) * 3;
		let timeout_seconds = (confirmations * seconds_per_confirmation)
			.max(seconds_per_confirmation)
			.min(3600);
		let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(timeout_seconds);

		tracing::info!(
			tx_hash = %truncate_hash(hash),
			"Waiting for {} confirmations (timeout: {}s)",
			confirmations,
			timeout_seconds
		);

		loop {
			if tokio::time::Instant::now() > deadline {
				return Err(ChainError::Timeout(format!(
					"Timed out waiting for {} confirmations after {} seconds",
					confirmations, timeout_seconds
				)));
			}

			let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					// Not yet mined
					tokio::time::sleep(poll_interval).await;
					continue;
				}
				Err(e) => return Err(classify_error("Failed to get receipt", e)),
			};

			let current_block = self
				.provider
				.get_block_number()
				.await
				.map_err(|e| classify_error("Failed to get block number", e))?;

			let tx_block = receipt.block_number.unwrap_or(0);
			let current_confirmations = current_block.saturating_sub(tx_block);

			if current_confirmations >= confirmations {
				return Ok(TransactionReceipt {
					hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
					block_number: tx_block,
					success: receipt.status(),
				});
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				confirmations.saturating_sub(current_confirmations)
			);

			tokio::time::sleep(poll_interval).await;
		}
	}

	async fn get_block(&self, number: Option<u64>) -> Result<BlockInfo, ChainError> {
		let tag = match number {
			Some(n) => BlockNumberOrTag::Number(n),
			None => BlockNumberOrTag::Latest,
		};

		let block = with_read_retry("get_block", || async {
			self.provider
				.get_block_by_number(tag, BlockTransactionsKind::Hashes)
				.await
				.map_err(|e| classify_error("Failed to get block", e))
		})
		.await?
		.ok_or_else(|| ChainError::Network(format!("Block {:?} not found", number)))?;

		Ok(BlockInfo {
			number: block.header.number,
			timestamp: block.header.timestamp,
		})
	}
}
