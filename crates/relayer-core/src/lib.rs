//! Relayer engine: the feed scheduler and its state.
//!
//! The engine owns the round-robin cursor, the single-flight permit and the
//! timer loop. Each tick selects at most one eligible feed and drives it
//! end-to-end; only one feed advances per tick, bounding attestation-fee
//! spend and keeping two flows from ever racing proofs for the same
//! destination program. The manual trigger shares the same permit, so a
//! caller invoking both concurrently still gets exactly one flow.

pub mod flows;
pub mod sink;
pub mod state;

pub use flows::{FeedFlow, FlowError, FlowOutcome, FlowRunner};
pub use sink::{LogLevel, LogRecord, LogSink};
pub use state::{BotState, BotStatus, FeedCounters, StateSnapshot};

use relayer_feeds::{FeedStoreError, FeedStoreService};
use relayer_source::Eligibility;
use relayer_types::{EventBus, RelayerEvent, SchedulerEvent, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Feed store error: {0}")]
	Feeds(#[from] FeedStoreError),
}

#[derive(Debug, Error)]
pub enum TriggerError {
	#[error("A flow is already in flight")]
	Busy,

	#[error("Unknown feed: {0}")]
	UnknownFeed(String),

	#[error(transparent)]
	Flow(#[from] FlowError),

	#[error("Feed store error: {0}")]
	Feeds(FeedStoreError),
}

pub struct RelayerEngine {
	tick_interval: Duration,
	feeds: Arc<FeedStoreService>,
	flows: Arc<dyn FeedFlow>,
	state: Arc<BotState>,
	bus: EventBus,
	sink: Arc<LogSink>,
	/// Single-flight permit shared by the timer loop and the manual
	/// trigger.
	flight: Mutex<()>,
	shutdown_tx: watch::Sender<bool>,
}

impl RelayerEngine {
	pub fn state(&self) -> &BotState {
		&self.state
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.bus
	}

	pub fn sink(&self) -> &LogSink {
		&self.sink
	}

	pub fn snapshot(&self) -> StateSnapshot {
		self.state.snapshot()
	}

	/// Runs the timer loop until `shutdown` is called. Stopping halts the
	/// timer and lets an in-flight flow reach natural completion; network
	/// calls are not aborted.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.state.set_status(BotStatus::Running);
		info!(
			tick_interval_secs = self.tick_interval.as_secs(),
			"Scheduler started"
		);

		let mut ticker = tokio::time::interval(self.tick_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// The interval fires immediately; the first real tick waits one
		// period.
		ticker.tick().await;

		let mut shutdown_rx = self.shutdown_tx.subscribe();

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					self.tick().await;
				}
				_ = shutdown_rx.changed() => {
					break;
				}
			}
		}

		// Wait for any in-flight flow (a manual trigger may hold the
		// permit) before declaring the stop complete.
		let _ = self.flight.lock().await;

		self.state.set_status(BotStatus::Stopped);
		self.state.reset();
		info!("Scheduler stopped");
		Ok(())
	}

	/// Signals the timer loop to stop.
	pub fn shutdown(&self) {
		self.state.set_status(BotStatus::Stopping);
		let _ = self.shutdown_tx.send(true);
	}

	/// One scheduler tick: skip if a flow is in flight, otherwise reload
	/// the feed set, advance the cursor to exactly one feed, and drive it
	/// if eligible. The cursor advances regardless of the outcome.
	pub async fn tick(&self) {
		let _permit = match self.flight.try_lock() {
			Ok(permit) => permit,
			Err(_) => {
				self.state.record_tick_skipped();
				self.bus
					.publish(RelayerEvent::Scheduler(SchedulerEvent::TickSkipped {
						reason: "flow in flight".to_string(),
					}))
					.ok();
				debug!("Tick skipped: flow in flight");
				return;
			}
		};

		// Re-read the feed set every tick; no cross-tick caching.
		let feeds = match self.feeds.load_active().await {
			Ok(feeds) => {
				if self.state.status() == BotStatus::Error {
					self.state.set_status(BotStatus::Running);
				}
				feeds
			}
			Err(e) => {
				self.state.set_status(BotStatus::Error);
				error!("Failed to load feed set: {}", e);
				self.sink
					.record(LogLevel::Error, format!("feed store: {}", e), None, None);
				return;
			}
		};
		if feeds.is_empty() {
			debug!("Feed set is empty");
			return;
		}

		let index = self.state.advance_cursor(feeds.len());
		let feed = &feeds[index];

		self.bus
			.publish(RelayerEvent::Scheduler(SchedulerEvent::FeedSelected {
				alias: feed.alias.clone(),
			}))
			.ok();

		match self.flows.check_eligibility(feed).await {
			Ok(Eligibility::Eligible) => {
				self.state.record_attempt(&feed.alias);
				match self.flows.run(feed).await {
					Ok(_) => self.state.record_success(&feed.alias),
					// The flow has already published and logged the
					// failure with its step.
					Err(_) => self.state.record_failure(&feed.alias),
				}
			}
			Ok(Eligibility::Ineligible(reason)) => {
				self.state.record_feed_skip(&feed.alias);
				self.bus
					.publish(RelayerEvent::Scheduler(SchedulerEvent::FeedIneligible {
						alias: feed.alias.clone(),
						reason: reason.clone(),
					}))
					.ok();
				debug!(alias = %feed.alias, %reason, "Feed not eligible");
			}
			Err(e) => {
				self.state.record_failure(&feed.alias);
				error!(alias = %feed.alias, "Eligibility check failed: {}", e);
				self.sink
					.error(&feed.alias, format!("eligibility: {}", e.message));
			}
		}
	}

	/// Manual "update now". Shares the scheduler's single-flight permit;
	/// returns `Busy` instead of interleaving with a scheduled flow. The
	/// eligibility gate is bypassed; the protocol guard in the submitter
	/// still protects against invariant violations.
	pub async fn trigger(&self, alias: &str) -> Result<FlowOutcome, TriggerError> {
		let _permit = self.flight.try_lock().map_err(|_| TriggerError::Busy)?;

		let feed = self.feeds.find_by_alias(alias).await.map_err(|e| match e {
			FeedStoreError::NotFound(alias) => TriggerError::UnknownFeed(alias),
			other => TriggerError::Feeds(other),
		})?;

		info!(alias = %feed.alias, "Manual trigger");
		self.state.record_attempt(&feed.alias);
		match self.flows.run(&feed).await {
			Ok(outcome) => {
				self.state.record_success(&feed.alias);
				Ok(outcome)
			}
			Err(e) => {
				self.state.record_failure(&feed.alias);
				Err(e.into())
			}
		}
	}
}

/// Builder for the engine. The feed store and flow implementation are
/// required; everything else has defaults.
pub struct EngineBuilder {
	tick_interval: Duration,
	feeds: Option<Arc<FeedStoreService>>,
	flows: Option<Arc<dyn FeedFlow>>,
	bus: Option<EventBus>,
	sink: Option<Arc<LogSink>>,
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl EngineBuilder {
	pub fn new() -> Self {
		Self {
			tick_interval: Duration::from_secs(60),
			feeds: None,
			flows: None,
			bus: None,
			sink: None,
		}
	}

	pub fn with_tick_interval(mut self, interval: Duration) -> Self {
		self.tick_interval = interval;
		self
	}

	pub fn with_feeds(mut self, feeds: Arc<FeedStoreService>) -> Self {
		self.feeds = Some(feeds);
		self
	}

	pub fn with_flows(mut self, flows: Arc<dyn FeedFlow>) -> Self {
		self.flows = Some(flows);
		self
	}

	pub fn with_event_bus(mut self, bus: EventBus) -> Self {
		self.bus = Some(bus);
		self
	}

	pub fn with_sink(mut self, sink: Arc<LogSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn build(self) -> Result<RelayerEngine, EngineError> {
		let feeds = self
			.feeds
			.ok_or_else(|| EngineError::Config("Feed store not provided".into()))?;
		let flows = self
			.flows
			.ok_or_else(|| EngineError::Config("Flow runner not provided".into()))?;

		let state = Arc::new(BotState::new());
		state.set_status(BotStatus::Starting);

		let (shutdown_tx, _) = watch::channel(false);

		Ok(RelayerEngine {
			tick_interval: self.tick_interval,
			feeds,
			flows,
			state,
			bus: self.bus.unwrap_or_else(|| EventBus::new(1024)),
			sink: self
				.sink
				.unwrap_or_else(|| Arc::new(LogSink::new(512, Arc::new(SystemClock)))),
			flight: Mutex::new(()),
			shutdown_tx,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use relayer_feeds::FeedStoreInterface;
	use relayer_types::{Address, ChainId, Feed, TokenDescriptor, Topology};
	use std::sync::Mutex as StdMutex;

	fn feed(alias: &str) -> Feed {
		Feed {
			id: format!("feed-{}", alias),
			alias: alias.to_string(),
			source_chain_id: ChainId(114),
			topology: Topology::Native,
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
			created_at: 0,
			updated_at: 0,
		}
	}

	struct MemFeedStore {
		feeds: Vec<Feed>,
	}

	#[async_trait]
	impl FeedStoreInterface for MemFeedStore {
		async fn load_active(&self) -> Result<Vec<Feed>, FeedStoreError> {
			Ok(self.feeds.clone())
		}
	}

	/// Flow stub recording run order, optionally holding the flight open
	/// to simulate slow network calls.
	struct StubFlow {
		runs: StdMutex<Vec<String>>,
		delay: Duration,
		ineligible: Option<String>,
	}

	impl StubFlow {
		fn new(delay: Duration) -> Self {
			Self {
				runs: StdMutex::new(Vec::new()),
				delay,
				ineligible: None,
			}
		}

		fn runs(&self) -> Vec<String> {
			self.runs.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl FeedFlow for StubFlow {
		async fn check_eligibility(&self, feed: &Feed) -> Result<Eligibility, FlowError> {
			if self.ineligible.as_deref() == Some(feed.alias.as_str()) {
				return Ok(Eligibility::Ineligible("gate closed".into()));
			}
			Ok(Eligibility::Eligible)
		}

		async fn run(&self, feed: &Feed) -> Result<FlowOutcome, FlowError> {
			self.runs.lock().unwrap().push(feed.alias.clone());
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			Ok(FlowOutcome {
				price_e6: 1_000_000,
				receipt: None,
			})
		}
	}

	fn engine_with(flow: Arc<StubFlow>, aliases: &[&str]) -> RelayerEngine {
		let feeds = aliases.iter().map(|a| feed(a)).collect();
		EngineBuilder::new()
			.with_tick_interval(Duration::from_secs(60))
			.with_feeds(Arc::new(FeedStoreService::new(Box::new(MemFeedStore {
				feeds,
			}))))
			.with_flows(flow)
			.build()
			.unwrap()
	}

	#[tokio::test]
	async fn test_round_robin_fairness() {
		let flow = Arc::new(StubFlow::new(Duration::ZERO));
		let engine = engine_with(flow.clone(), &["a", "b", "c"]);

		for _ in 0..6 {
			engine.tick().await;
		}

		// Every feed selected exactly once, in list order, before repeats.
		assert_eq!(flow.runs(), vec!["a", "b", "c", "a", "b", "c"]);
	}

	#[tokio::test]
	async fn test_single_flight_under_slow_flow() {
		let flow = Arc::new(StubFlow::new(Duration::from_millis(100)));
		let engine = Arc::new(engine_with(flow.clone(), &["a", "b"]));

		// Two ticks racing: the second fires while the first flow's slow
		// network call is still in flight.
		let e1 = engine.clone();
		let e2 = engine.clone();
		tokio::join!(e1.tick(), async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			e2.tick().await;
		});

		assert_eq!(flow.runs().len(), 1);
		let snapshot = engine.snapshot();
		assert_eq!(snapshot.ticks_skipped, 1);
		assert_eq!(snapshot.aggregate.attempts, 1);
		assert_eq!(snapshot.aggregate.successes, 1);
	}

	#[tokio::test]
	async fn test_trigger_shares_single_flight_permit() {
		let flow = Arc::new(StubFlow::new(Duration::from_millis(100)));
		let engine = Arc::new(engine_with(flow.clone(), &["a"]));

		let e1 = engine.clone();
		let e2 = engine.clone();
		let (_, trigger_result) = tokio::join!(e1.tick(), async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			e2.trigger("a").await
		});

		assert!(matches!(trigger_result, Err(TriggerError::Busy)));
		assert_eq!(flow.runs().len(), 1);
	}

	#[tokio::test]
	async fn test_trigger_runs_flow() {
		let flow = Arc::new(StubFlow::new(Duration::ZERO));
		let engine = engine_with(flow.clone(), &["a", "b"]);

		let outcome = engine.trigger("b").await.unwrap();
		assert_eq!(outcome.price_e6, 1_000_000);
		assert_eq!(flow.runs(), vec!["b"]);

		let snapshot = engine.snapshot();
		assert_eq!(snapshot.per_feed["b"].successes, 1);
	}

	#[tokio::test]
	async fn test_trigger_unknown_feed() {
		let flow = Arc::new(StubFlow::new(Duration::ZERO));
		let engine = engine_with(flow, &["a"]);

		assert!(matches!(
			engine.trigger("missing").await,
			Err(TriggerError::UnknownFeed(_))
		));
	}

	#[tokio::test]
	async fn test_cursor_advances_past_ineligible_feed() {
		let flow = Arc::new(StubFlow {
			runs: StdMutex::new(Vec::new()),
			delay: Duration::ZERO,
			ineligible: Some("a".to_string()),
		});
		let engine = engine_with(flow.clone(), &["a", "b"]);

		engine.tick().await;
		engine.tick().await;
		engine.tick().await;

		// "a" is skipped but still consumes its slot; "b" runs on its
		// turn.
		assert_eq!(flow.runs(), vec!["b"]);
		let snapshot = engine.snapshot();
		assert_eq!(snapshot.per_feed["a"].skips, 2);
		assert_eq!(snapshot.per_feed["b"].successes, 1);
	}
}
