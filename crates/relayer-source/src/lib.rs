//! Price source readers.
//!
//! A reader produces a normalized price sample for a feed via one of three
//! strategies, and answers the eligibility question the scheduler asks
//! before committing to a flow. Strategies are keyed by topology; the
//! service routes each feed to the reader matching its topology.

pub mod conversion;
pub mod readers;

pub use conversion::{price_e6, ConversionError};

use async_trait::async_trait;
use relayer_types::{Feed, PriceSample, Topology};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
	#[error("Chain error: {0}")]
	Chain(#[from] relayer_chains::ChainError),

	#[error("Decode error: {0}")]
	Decode(String),

	#[error("No reader for topology {0}")]
	UnknownTopology(Topology),

	#[error(transparent)]
	Conversion(#[from] ConversionError),
}

/// Scheduler-facing answer to "should this feed run now?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
	Eligible,
	Ineligible(String),
}

impl Eligibility {
	pub fn is_eligible(&self) -> bool {
		matches!(self, Eligibility::Eligible)
	}
}

/// One price-observation strategy.
#[async_trait]
pub trait SourceReader: Send + Sync {
	/// Topology this reader serves.
	fn topology(&self) -> Topology;

	/// Whether the feed may be driven right now. Derived from the
	/// destination programs' own gates so an ineligible feed never costs a
	/// transaction.
	async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, SourceError>;

	/// Produces a normalized sample for the feed.
	async fn read(&self, feed: &Feed) -> Result<PriceSample, SourceError>;
}

/// Routes feeds to the reader matching their topology.
pub struct PriceSourceService {
	readers: HashMap<Topology, Box<dyn SourceReader>>,
}

impl PriceSourceService {
	pub fn new(readers: HashMap<Topology, Box<dyn SourceReader>>) -> Self {
		Self { readers }
	}

	fn reader(&self, feed: &Feed) -> Result<&dyn SourceReader, SourceError> {
		self.readers
			.get(&feed.topology)
			.map(|r| r.as_ref())
			.ok_or(SourceError::UnknownTopology(feed.topology))
	}

	pub async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, SourceError> {
		self.reader(feed)?.check_eligibility(feed).await
	}

	pub async fn read(&self, feed: &Feed) -> Result<PriceSample, SourceError> {
		self.reader(feed)?.read(feed).await
	}
}
