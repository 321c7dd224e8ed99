//! The relay-protocol rule set, restated as a local pre-submission guard.
//!
//! The destination relay program enforces these rules on-chain; checking
//! them here first keeps the relayer from paying fees for transactions that
//! are certain to revert. A violation is deterministic for the same inputs,
//! so none of these errors is retryable.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
	#[error("Relay interval not elapsed: {elapsed}s of {min}s")]
	IntervalNotElapsed { elapsed: u64, min: u64 },

	#[error("Source block {new} is not newer than last relayed block {last}")]
	StaleBlock { new: u64, last: u64 },

	#[error("Price deviation {deviation_bps} bps exceeds bound {max_bps} bps")]
	DeviationExceeded { deviation_bps: u64, max_bps: u64 },
}

/// Rules the destination relay program enforces per (source chain, pool).
#[derive(Debug, Clone, Copy)]
pub struct ProtocolRules {
	pub min_relay_interval_secs: u64,
	pub max_future_skew_secs: u64,
	pub max_deviation_bps: u64,
}

impl Default for ProtocolRules {
	fn default() -> Self {
		Self {
			min_relay_interval_secs: 60,
			max_future_skew_secs: 600,
			max_deviation_bps: 5_000,
		}
	}
}

impl ProtocolRules {
	/// Elapsed time since the last relay must reach the minimum interval.
	/// A pool that has never been relayed (`last_relayed_at == 0`) passes.
	pub fn check_interval(&self, now: u64, last_relayed_at: u64) -> Result<(), InvariantError> {
		if last_relayed_at == 0 {
			return Ok(());
		}
		let elapsed = now.saturating_sub(last_relayed_at);
		if elapsed < self.min_relay_interval_secs {
			return Err(InvariantError::IntervalNotElapsed {
				elapsed,
				min: self.min_relay_interval_secs,
			});
		}
		Ok(())
	}

	/// The new source block number must be strictly greater than the last
	/// one recorded for the pool.
	pub fn check_monotonic(&self, new_block: u64, last_block: u64) -> Result<(), InvariantError> {
		if last_block > 0 && new_block <= last_block {
			return Err(InvariantError::StaleBlock {
				new: new_block,
				last: last_block,
			});
		}
		Ok(())
	}

	/// Clamps a candidate source timestamp so cross-chain clock drift alone
	/// cannot push it past the program's future-skew bound.
	pub fn clamp_future_skew(&self, candidate: u64, destination_now: u64) -> u64 {
		let limit = destination_now + self.max_future_skew_secs;
		candidate.min(limit)
	}

	/// If a prior price exists, the implied move must stay under the
	/// deviation bound. Exceeding it fails deterministically on-chain, so
	/// the error is surfaced rather than retried.
	pub fn check_deviation(&self, prior_e6: u128, new_e6: u128) -> Result<(), InvariantError> {
		if prior_e6 == 0 {
			return Ok(());
		}
		let delta = prior_e6.abs_diff(new_e6);
		let deviation_bps = (delta.saturating_mul(10_000) / prior_e6) as u64;
		if deviation_bps > self.max_deviation_bps {
			return Err(InvariantError::DeviationExceeded {
				deviation_bps,
				max_bps: self.max_deviation_bps,
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_interval_scenario() {
		// minInterval = 60s: two checks within 60s of a relay fail, a
		// check after 61s passes.
		let rules = ProtocolRules::default();
		let relayed_at = 1_700_000_000;

		assert_eq!(
			rules.check_interval(relayed_at + 20, relayed_at),
			Err(InvariantError::IntervalNotElapsed {
				elapsed: 20,
				min: 60
			})
		);
		assert_eq!(
			rules.check_interval(relayed_at + 59, relayed_at),
			Err(InvariantError::IntervalNotElapsed {
				elapsed: 59,
				min: 60
			})
		);
		assert!(rules.check_interval(relayed_at + 61, relayed_at).is_ok());
	}

	#[test]
	fn test_interval_first_relay_passes() {
		let rules = ProtocolRules::default();
		assert!(rules.check_interval(1_700_000_000, 0).is_ok());
	}

	#[test]
	fn test_monotonic_rejects_same_block() {
		let rules = ProtocolRules::default();
		assert!(rules.check_monotonic(101, 100).is_ok());
		assert_eq!(
			rules.check_monotonic(100, 100),
			Err(InvariantError::StaleBlock {
				new: 100,
				last: 100
			})
		);
		assert_eq!(
			rules.check_monotonic(99, 100),
			Err(InvariantError::StaleBlock { new: 99, last: 100 })
		);
	}

	#[test]
	fn test_skew_clamp_is_exact() {
		let rules = ProtocolRules::default();
		let now = 1_700_000_000;

		// Beyond the bound: clamped to exactly now + skew.
		assert_eq!(rules.clamp_future_skew(now + 700, now), now + 600);
		// Within the bound: untouched.
		assert_eq!(rules.clamp_future_skew(now + 599, now), now + 599);
		assert_eq!(rules.clamp_future_skew(now - 50, now), now - 50);
	}

	#[test]
	fn test_deviation_accepts_21_percent() {
		let rules = ProtocolRules::default();
		assert!(rules.check_deviation(1_000_000, 1_210_000).is_ok());
		assert!(rules.check_deviation(1_000_000, 790_000).is_ok());
	}

	#[test]
	fn test_deviation_rejects_300_percent() {
		let rules = ProtocolRules::default();
		assert_eq!(
			rules.check_deviation(1_000_000, 4_000_000),
			Err(InvariantError::DeviationExceeded {
				deviation_bps: 30_000,
				max_bps: 5_000
			})
		);
	}

	#[test]
	fn test_deviation_no_prior_price_passes() {
		let rules = ProtocolRules::default();
		assert!(rules.check_deviation(0, 1_000_000).is_ok());
	}
}
