//! Configuration types.

use relayer_types::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
	pub relayer: RelayerSection,
	/// Chain configurations keyed by numeric chain id.
	pub chains: HashMap<String, ChainConfig>,
	pub attestation: AttestationConfig,
	pub feeds: FeedStoreConfig,
	#[serde(default)]
	pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerSection {
	pub name: String,
	/// Signing key used for every transaction the relayer sends.
	pub private_key: String,
	#[serde(default = "default_tick_interval")]
	pub tick_interval_secs: u64,
	#[serde(default = "default_native_interval")]
	pub native_update_interval_secs: u64,
	#[serde(default = "default_http_port")]
	pub http_port: u16,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
	pub name: String,
	pub rpc_url: String,
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	#[serde(default = "default_block_time")]
	pub block_time_secs: u64,
	/// Chains whose finality is slow enough to warrant the long
	/// attestation polling budget (30 minutes instead of 5).
	#[serde(default)]
	pub slow_finality: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
	/// Data-availability layer base URL for the destination network.
	pub da_base_url: String,
	/// Voting-round registry contract on the destination chain.
	pub round_registry: String,
	/// Chain the destination programs live on.
	pub destination_chain_id: u64,
	/// Deadline for the wait between on-chain submission and proof
	/// retrieval.
	#[serde(default = "default_finalize_wait")]
	pub finalize_wait_secs: u64,
	/// Verifier endpoints keyed by numeric source chain id.
	pub verifiers: HashMap<String, VerifierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
	pub base_url: String,
	/// Verifier-network identifier for the source chain, e.g. "testETH".
	pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedStoreConfig {
	/// Path of the feed set document, re-read every tick.
	pub path: String,
}

/// Destination relay-program rule set the submitter must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
	#[serde(default = "default_max_skew")]
	pub max_future_skew_secs: u64,
	#[serde(default = "default_max_deviation")]
	pub max_deviation_bps: u64,
	#[serde(default = "default_min_relay_interval")]
	pub min_relay_interval_secs: u64,
}

impl Default for ProtocolConfig {
	fn default() -> Self {
		Self {
			max_future_skew_secs: default_max_skew(),
			max_deviation_bps: default_max_deviation(),
			min_relay_interval_secs: default_min_relay_interval(),
		}
	}
}

impl RelayerConfig {
	/// Looks up a chain configuration by id.
	pub fn chain(&self, id: ChainId) -> Option<&ChainConfig> {
		self.chains.get(&id.0.to_string())
	}

	/// Chain ids in the configuration, in no particular order.
	pub fn chain_ids(&self) -> Vec<ChainId> {
		self.chains
			.keys()
			.filter_map(|k| k.parse::<u64>().ok().map(ChainId))
			.collect()
	}
}

fn default_tick_interval() -> u64 {
	60
}

fn default_native_interval() -> u64 {
	300
}

fn default_http_port() -> u16 {
	8080
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_confirmations() -> u64 {
	1
}

fn default_block_time() -> u64 {
	12
}

fn default_finalize_wait() -> u64 {
	180
}

fn default_max_skew() -> u64 {
	600
}

fn default_max_deviation() -> u64 {
	5_000
}

fn default_min_relay_interval() -> u64 {
	60
}
