//! Process-wide relayer state.
//!
//! `BotState` is owned by the engine and passed by handle to any control
//! surface; there is deliberately no ambient global. Reset on stop, never
//! persisted.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
	Stopped,
	Starting,
	Running,
	Stopping,
	Error,
}

/// Per-feed outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedCounters {
	pub attempts: u64,
	pub successes: u64,
	pub failures: u64,
	pub skips: u64,
}

/// Snapshot handed to the API and the log sink subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
	pub status: BotStatus,
	pub ticks: u64,
	pub ticks_skipped: u64,
	pub aggregate: FeedCounters,
	pub per_feed: HashMap<String, FeedCounters>,
}

pub struct BotState {
	status: RwLock<BotStatus>,
	/// Round-robin tick counter; the selected index is `ticks % len`.
	cursor: AtomicUsize,
	ticks_skipped: AtomicU64,
	counters: RwLock<HashMap<String, FeedCounters>>,
	aggregate: RwLock<FeedCounters>,
}

impl Default for BotState {
	fn default() -> Self {
		Self::new()
	}
}

impl BotState {
	pub fn new() -> Self {
		Self {
			status: RwLock::new(BotStatus::Stopped),
			cursor: AtomicUsize::new(0),
			ticks_skipped: AtomicU64::new(0),
			counters: RwLock::new(HashMap::new()),
			aggregate: RwLock::new(FeedCounters::default()),
		}
	}

	pub fn status(&self) -> BotStatus {
		*self.status.read().unwrap()
	}

	pub fn set_status(&self, status: BotStatus) {
		*self.status.write().unwrap() = status;
	}

	/// Advances the round-robin cursor and returns the index to drive this
	/// tick. The cursor advances regardless of the flow's outcome.
	pub fn advance_cursor(&self, feed_count: usize) -> usize {
		let tick = self.cursor.fetch_add(1, Ordering::SeqCst);
		tick % feed_count
	}

	pub fn record_tick_skipped(&self) {
		self.ticks_skipped.fetch_add(1, Ordering::SeqCst);
	}

	fn with_feed<F: Fn(&mut FeedCounters)>(&self, alias: &str, f: F) {
		let mut counters = self.counters.write().unwrap();
		f(counters.entry(alias.to_string()).or_default());
		f(&mut self.aggregate.write().unwrap());
	}

	pub fn record_attempt(&self, alias: &str) {
		self.with_feed(alias, |c| c.attempts += 1);
	}

	pub fn record_success(&self, alias: &str) {
		self.with_feed(alias, |c| c.successes += 1);
	}

	pub fn record_failure(&self, alias: &str) {
		self.with_feed(alias, |c| c.failures += 1);
	}

	pub fn record_feed_skip(&self, alias: &str) {
		self.with_feed(alias, |c| c.skips += 1);
	}

	pub fn snapshot(&self) -> StateSnapshot {
		StateSnapshot {
			status: self.status(),
			ticks: self.cursor.load(Ordering::SeqCst) as u64,
			ticks_skipped: self.ticks_skipped.load(Ordering::SeqCst),
			aggregate: *self.aggregate.read().unwrap(),
			per_feed: self.counters.read().unwrap().clone(),
		}
	}

	/// Clears counters and cursor. Called when the process stops.
	pub fn reset(&self) {
		self.cursor.store(0, Ordering::SeqCst);
		self.ticks_skipped.store(0, Ordering::SeqCst);
		self.counters.write().unwrap().clear();
		*self.aggregate.write().unwrap() = FeedCounters::default();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cursor_wraps() {
		let state = BotState::new();
		assert_eq!(state.advance_cursor(3), 0);
		assert_eq!(state.advance_cursor(3), 1);
		assert_eq!(state.advance_cursor(3), 2);
		assert_eq!(state.advance_cursor(3), 0);
	}

	#[test]
	fn test_counters_aggregate() {
		let state = BotState::new();
		state.record_attempt("a");
		state.record_success("a");
		state.record_attempt("b");
		state.record_failure("b");

		let snapshot = state.snapshot();
		assert_eq!(snapshot.aggregate.attempts, 2);
		assert_eq!(snapshot.aggregate.successes, 1);
		assert_eq!(snapshot.aggregate.failures, 1);
		assert_eq!(snapshot.per_feed["a"].successes, 1);
		assert_eq!(snapshot.per_feed["b"].failures, 1);
	}

	#[test]
	fn test_reset_clears_everything() {
		let state = BotState::new();
		state.advance_cursor(3);
		state.record_attempt("a");
		state.record_tick_skipped();

		state.reset();
		let snapshot = state.snapshot();
		assert_eq!(snapshot.ticks, 0);
		assert_eq!(snapshot.ticks_skipped, 0);
		assert_eq!(snapshot.aggregate, FeedCounters::default());
		assert!(snapshot.per_feed.is_empty());
	}
}
