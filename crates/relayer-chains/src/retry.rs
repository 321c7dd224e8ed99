//! Bounded retry for read operations.
//!
//! Transient RPC failures on reads are retried with exponential backoff up
//! to a wall-clock cap. Writes are never routed through here: retrying a
//! send after an ambiguous failure risks a duplicate transaction.

use crate::ChainError;
use backoff::{backoff::Backoff, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for read calls. Maximum elapsed time 30 seconds.
pub fn read_backoff() -> ExponentialBackoff {
	ExponentialBackoff {
		max_elapsed_time: Some(Duration::from_secs(30)),
		..Default::default()
	}
}

/// Runs a read operation, retrying transient network errors.
///
/// Reverts are returned immediately: the node evaluated the call and the
/// result is deterministic.
pub async fn with_read_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, ChainError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, ChainError>>,
{
	let mut backoff = read_backoff();
	let mut attempts = 0u32;

	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err @ ChainError::Revert(_)) => return Err(err),
			Err(err) => {
				attempts += 1;
				match backoff.next_backoff() {
					Some(delay) => {
						warn!(
							"{} failed (attempt {}), retrying in {:?}: {}",
							label, attempts, delay, err
						);
						tokio::time::sleep(delay).await;
					}
					None => {
						warn!(
							"{} failed, backoff exhausted after {} attempts: {}",
							label, attempts, err
						);
						return Err(err);
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[tokio::test]
	async fn test_retry_succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);

		let result = with_read_retry("test-read", || {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			async move {
				if n < 2 {
					Err(ChainError::Network("connection reset".into()))
				} else {
					Ok(42u64)
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_revert_is_not_retried() {
		let calls = AtomicU32::new(0);

		let result: Result<u64, _> = with_read_retry("test-read", || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Err(ChainError::Revert("stale block".into())) }
		})
		.await;

		assert!(matches!(result, Err(ChainError::Revert(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
