//! File-backed feed store.
//!
//! Reads a JSON document containing the active feed set. The file is read on
//! every call, matching the no-caching contract of the interface.

use crate::{FeedStoreError, FeedStoreInterface};
use async_trait::async_trait;
use relayer_types::Feed;
use std::path::PathBuf;

pub struct FileFeedStore {
	path: PathBuf,
}

impl FileFeedStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl FeedStoreInterface for FileFeedStore {
	async fn load_active(&self) -> Result<Vec<Feed>, FeedStoreError> {
		let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
			FeedStoreError::Backend(format!("Failed to read {}: {}", self.path.display(), e))
		})?;

		serde_json::from_slice(&bytes).map_err(|e| FeedStoreError::Serialization(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FeedStoreService;
	use relayer_types::{Address, ChainId, TokenDescriptor, Topology};

	fn sample_feed(alias: &str, topology: Topology) -> Feed {
		Feed {
			id: format!("feed-{}", alias),
			alias: alias.to_string(),
			source_chain_id: ChainId(114),
			topology,
			source_pool: Address(vec![0x22; 20]),
			destination_program: Address(vec![0x33; 20]),
			capture_program: None,
			relay_program: None,
			token0: TokenDescriptor {
				address: Address(vec![0x01; 20]),
				symbol: "WFLR".into(),
				decimals: 18,
			},
			token1: TokenDescriptor {
				address: Address(vec![0x02; 20]),
				symbol: "USDC".into(),
				decimals: 6,
			},
			invert: false,
			created_at: 1_700_000_000,
			updated_at: 1_700_000_000,
		}
	}

	#[tokio::test]
	async fn test_load_active_rereads_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("feeds.json");

		let feeds = vec![sample_feed("a", Topology::Native)];
		std::fs::write(&path, serde_json::to_vec(&feeds).unwrap()).unwrap();

		let store = FileFeedStore::new(&path);
		assert_eq!(store.load_active().await.unwrap().len(), 1);

		// A change on disk is visible on the very next load.
		let feeds = vec![
			sample_feed("a", Topology::Native),
			sample_feed("b", Topology::Native),
		];
		std::fs::write(&path, serde_json::to_vec(&feeds).unwrap()).unwrap();
		assert_eq!(store.load_active().await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_service_rejects_malformed_shape() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("feeds.json");

		// Relay topology without a relay program violates the feed shape.
		let feeds = vec![sample_feed("bad", Topology::Relay)];
		std::fs::write(&path, serde_json::to_vec(&feeds).unwrap()).unwrap();

		let service = FeedStoreService::new(Box::new(FileFeedStore::new(&path)));
		assert!(matches!(
			service.load_active().await,
			Err(FeedStoreError::Shape(_))
		));
	}

	#[tokio::test]
	async fn test_find_by_alias() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("feeds.json");

		let feeds = vec![
			sample_feed("a", Topology::Native),
			sample_feed("b", Topology::Native),
		];
		std::fs::write(&path, serde_json::to_vec(&feeds).unwrap()).unwrap();

		let service = FeedStoreService::new(Box::new(FileFeedStore::new(&path)));
		assert_eq!(service.find_by_alias("b").await.unwrap().alias, "b");
		assert!(matches!(
			service.find_by_alias("missing").await,
			Err(FeedStoreError::NotFound(_))
		));
	}
}
