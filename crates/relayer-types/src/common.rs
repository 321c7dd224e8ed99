//! Common types used throughout the relayer system.
//!
//! This module defines chain identifiers, addresses, transactions and
//! receipts that are shared by every other crate in the workspace.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ChainId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(ChainId(s.parse()?))
	}
}

/// Blockchain address representation.
///
/// Stores addresses as raw bytes to keep the wire format independent of any
/// particular provider library. Serialized as a 0x-prefixed hex string,
/// which is what the feed store document and the API carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(pub Vec<u8>);

impl Address {
	/// Parses a 0x-prefixed hex address.
	pub fn parse(s: &str) -> Result<Self, hex::FromHexError> {
		let stripped = s.strip_prefix("0x").unwrap_or(s);
		Ok(Address(hex::decode(stripped)?))
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

impl Serialize for Address {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Address::parse(&s).map_err(serde::de::Error::custom)
	}
}

/// Blockchain transaction hash representation.
///
/// Serialized as a 0x-prefixed hex string, like [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHash(pub Vec<u8>);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

impl Serialize for TransactionHash {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for TransactionHash {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		let stripped = s.strip_prefix("0x").unwrap_or(&s);
		hex::decode(stripped)
			.map(TransactionHash)
			.map_err(serde::de::Error::custom)
	}
}

/// Blockchain transaction representation.
///
/// Contains the fields necessary for constructing and submitting transactions;
/// gas fields left as `None` are filled by the provider.
#[derive(Debug, Clone)]
pub struct Transaction {
	/// Recipient address.
	pub to: Address,
	/// Transaction data/calldata.
	pub data: Vec<u8>,
	/// Value to transfer in native currency.
	pub value: U256,
	/// Chain ID for replay protection.
	pub chain_id: u64,
	/// Gas limit for transaction execution.
	pub gas_limit: Option<u64>,
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// Block header fields the relayer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
	pub number: u64,
	pub timestamp: u64,
}

/// Time source abstraction.
///
/// Every deadline and wait in the relayer goes through a `Clock` handle so
/// that tests can drive polling loops without real sleeps.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
	/// Current Unix time in seconds.
	fn now_unix(&self) -> u64;

	/// Suspend the current task for the given duration.
	async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by the system time and tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
	fn now_unix(&self) -> u64 {
		std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs()
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Truncates a transaction hash for display in log lines.
pub fn truncate_hash(hash: &TransactionHash) -> String {
	let hash_str = hex::encode(&hash.0);
	if hash_str.len() <= 8 {
		hash_str
	} else {
		format!("{}..", &hash_str[..8])
	}
}
