//! Feed store access for the relayer.
//!
//! The feed set lives in an external store owned by the deployment flow; the
//! core consumes it read-only through `FeedStoreInterface`. The scheduler
//! re-reads the set every tick with no cross-tick caching, so feeds added
//! or retired between ticks take effect on the next one.

pub mod implementations {
	pub mod file;
}

use async_trait::async_trait;
use relayer_types::{Feed, FeedShapeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedStoreError {
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error(transparent)]
	Shape(#[from] FeedShapeError),
}

/// Low-level interface any feed store backend must implement.
#[async_trait]
pub trait FeedStoreInterface: Send + Sync {
	/// Returns the currently active feed set.
	async fn load_active(&self) -> Result<Vec<Feed>, FeedStoreError>;
}

/// High-level feed store service.
///
/// Wraps a backend and enforces the feed shape invariant on every load, so
/// a malformed entry in the store can never reach a flow.
pub struct FeedStoreService {
	backend: Box<dyn FeedStoreInterface>,
}

impl FeedStoreService {
	pub fn new(backend: Box<dyn FeedStoreInterface>) -> Self {
		Self { backend }
	}

	pub async fn load_active(&self) -> Result<Vec<Feed>, FeedStoreError> {
		let feeds = self.backend.load_active().await?;
		for feed in &feeds {
			feed.check_shape()?;
		}
		Ok(feeds)
	}

	pub async fn find_by_alias(&self, alias: &str) -> Result<Feed, FeedStoreError> {
		self.load_active()
			.await?
			.into_iter()
			.find(|f| f.alias == alias)
			.ok_or_else(|| FeedStoreError::NotFound(alias.to_string()))
	}
}
