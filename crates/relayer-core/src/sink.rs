//! Structured log sink.
//!
//! An append-only stream of structured records feeding a bounded ring
//! buffer, with a broadcast channel for external presentation layers. Log
//! lines also go through `tracing`; the sink exists so the API can serve
//! recent history without scraping process output.

use relayer_types::Clock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Debug,
	Info,
	Warn,
	Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
	pub timestamp: u64,
	pub level: LogLevel,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alias: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tx_hash: Option<String>,
}

pub struct LogSink {
	capacity: usize,
	ring: Mutex<VecDeque<LogRecord>>,
	sender: broadcast::Sender<LogRecord>,
	clock: Arc<dyn Clock>,
}

impl LogSink {
	pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(16));
		Self {
			capacity,
			ring: Mutex::new(VecDeque::with_capacity(capacity)),
			sender,
			clock,
		}
	}

	pub fn record(&self, level: LogLevel, message: impl Into<String>, alias: Option<&str>, tx_hash: Option<String>) {
		let record = LogRecord {
			timestamp: self.clock.now_unix(),
			level,
			message: message.into(),
			alias: alias.map(|a| a.to_string()),
			tx_hash,
		};

		{
			let mut ring = self.ring.lock().unwrap();
			if ring.len() == self.capacity {
				ring.pop_front();
			}
			ring.push_back(record.clone());
		}

		// No subscribers is fine.
		let _ = self.sender.send(record);
	}

	pub fn info(&self, alias: &str, message: impl Into<String>) {
		self.record(LogLevel::Info, message, Some(alias), None);
	}

	pub fn error(&self, alias: &str, message: impl Into<String>) {
		self.record(LogLevel::Error, message, Some(alias), None);
	}

	/// Most recent records, oldest first.
	pub fn recent(&self, limit: usize) -> Vec<LogRecord> {
		let ring = self.ring.lock().unwrap();
		let skip = ring.len().saturating_sub(limit);
		ring.iter().skip(skip).cloned().collect()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::SystemClock;

	#[test]
	fn test_ring_buffer_bounds() {
		let sink = LogSink::new(3, Arc::new(SystemClock));
		for i in 0..5 {
			sink.record(LogLevel::Info, format!("message {}", i), None, None);
		}

		let recent = sink.recent(10);
		assert_eq!(recent.len(), 3);
		assert_eq!(recent[0].message, "message 2");
		assert_eq!(recent[2].message, "message 4");
	}

	#[tokio::test]
	async fn test_subscribers_receive_records() {
		let sink = LogSink::new(8, Arc::new(SystemClock));
		let mut receiver = sink.subscribe();

		sink.info("wflr-usdc", "flow started");

		let record = receiver.recv().await.unwrap();
		assert_eq!(record.alias.as_deref(), Some("wflr-usdc"));
		assert_eq!(record.level, LogLevel::Info);
	}
}
