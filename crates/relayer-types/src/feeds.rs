//! Feed definitions and price samples.
//!
//! A feed is the logical oracle the relayer maintains: where the price is
//! observed, how it travels to the destination chain, and which on-chain
//! programs take part. Feeds are created by an external deployment flow and
//! are read-only to the core.

use crate::common::{Address, ChainId};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The path a price observation takes to the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
	/// Destination-chain pool read directly, no attestation.
	Native,
	/// Capture transaction on the source chain, then attested.
	Direct,
	/// Off-chain read relayed onto the destination chain, then attested.
	Relay,
}

impl std::fmt::Display for Topology {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Topology::Native => write!(f, "native"),
			Topology::Direct => write!(f, "direct"),
			Topology::Relay => write!(f, "relay"),
		}
	}
}

/// One side of the pool's pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
}

/// A logical price oracle maintained by the relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
	/// Unique identifier assigned by the deployment flow.
	pub id: String,
	/// Human-readable name used in logs and the API.
	pub alias: String,
	/// Chain the price is observed on.
	pub source_chain_id: ChainId,
	/// Path the observation takes to the destination program.
	pub topology: Topology,
	/// Pool the price is read from.
	pub source_pool: Address,
	/// Destination feed program consuming the verified value.
	pub destination_program: Address,
	/// Capture program on the source chain (direct topology only).
	pub capture_program: Option<Address>,
	/// Relay program on the destination chain (relay topology only).
	pub relay_program: Option<Address>,
	pub token0: TokenDescriptor,
	pub token1: TokenDescriptor,
	/// Quote the reciprocal of the pool price.
	pub invert: bool,
	/// Unix seconds when the feed was created.
	pub created_at: u64,
	/// Unix seconds of the last metadata change.
	pub updated_at: u64,
}

/// Violations of the feed shape invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedShapeError {
	#[error("feed {0}: native topology must not name a capture or relay program")]
	NativeWithProgram(String),
	#[error("feed {0}: direct topology requires a capture program and no relay program")]
	DirectShape(String),
	#[error("feed {0}: relay topology requires a relay program and no capture program")]
	RelayShape(String),
}

impl Feed {
	/// Checks the topology/program invariant: exactly one of
	/// {capture program, relay program} is set unless the topology is native.
	pub fn check_shape(&self) -> Result<(), FeedShapeError> {
		match self.topology {
			Topology::Native => {
				if self.capture_program.is_some() || self.relay_program.is_some() {
					return Err(FeedShapeError::NativeWithProgram(self.alias.clone()));
				}
			}
			Topology::Direct => {
				if self.capture_program.is_none() || self.relay_program.is_some() {
					return Err(FeedShapeError::DirectShape(self.alias.clone()));
				}
			}
			Topology::Relay => {
				if self.relay_program.is_none() || self.capture_program.is_some() {
					return Err(FeedShapeError::RelayShape(self.alias.clone()));
				}
			}
		}
		Ok(())
	}
}

/// A normalized price observation produced by a source reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSample {
	/// Fixed-point square-root price at 2^96 scale.
	pub sqrt_price_x96: U256,
	pub tick: i32,
	pub liquidity: u128,
	pub token0: Address,
	pub token1: Address,
	/// Block timestamp of the observation on the source chain.
	pub source_timestamp: u64,
	/// Block number of the observation on the source chain.
	pub source_block: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn token(symbol: &str) -> TokenDescriptor {
		TokenDescriptor {
			address: Address(vec![0x11; 20]),
			symbol: symbol.to_string(),
			decimals: 18,
		}
	}

	fn feed(topology: Topology) -> Feed {
		Feed {
			id: "feed-1".into(),
			alias: "wflr-usdc".into(),
			source_chain_id: ChainId(114),
			topology,
			source_pool: Address(vec![0x22; 20]),
			destination_program: Address(vec![0x33; 20]),
			capture_program: None,
			relay_program: None,
			token0: token("WFLR"),
			token1: token("USDC"),
			invert: false,
			created_at: 0,
			updated_at: 0,
		}
	}

	#[test]
	fn test_native_shape() {
		assert!(feed(Topology::Native).check_shape().is_ok());

		let mut bad = feed(Topology::Native);
		bad.relay_program = Some(Address(vec![0x44; 20]));
		assert_eq!(
			bad.check_shape(),
			Err(FeedShapeError::NativeWithProgram("wflr-usdc".into()))
		);
	}

	#[test]
	fn test_direct_requires_capture_program() {
		let mut direct = feed(Topology::Direct);
		assert!(direct.check_shape().is_err());

		direct.capture_program = Some(Address(vec![0x44; 20]));
		assert!(direct.check_shape().is_ok());

		direct.relay_program = Some(Address(vec![0x55; 20]));
		assert!(direct.check_shape().is_err());
	}

	#[test]
	fn test_relay_requires_relay_program() {
		let mut relay = feed(Topology::Relay);
		assert!(relay.check_shape().is_err());

		relay.relay_program = Some(Address(vec![0x44; 20]));
		assert!(relay.check_shape().is_ok());
	}
}
