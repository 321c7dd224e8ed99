//! Engine wiring from configuration.

use anyhow::{Context, Result};
use relayer_attestation::{
	AttestationClient, HttpDataAvailabilityApi, HttpVerifierApi, RoundRegistry, VerifierEndpoint,
};
use relayer_chains::{AlloyAdapter, ChainRegistry};
use relayer_config::RelayerConfig;
use relayer_core::{EngineBuilder, FlowRunner, LogSink, RelayerEngine};
use relayer_delivery::{ProtocolRules, UpdateSubmitter};
use relayer_feeds::{implementations::file::FileFeedStore, FeedStoreService};
use relayer_source::readers::{NativeReader, RecordReader, RelayFetchReader};
use relayer_source::{PriceSourceService, SourceReader};
use relayer_types::{Address, ChainId, Clock, EventBus, SystemClock, Topology};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything the API surface needs a handle to.
pub struct ServiceContext {
	pub engine: Arc<RelayerEngine>,
	pub feeds: Arc<FeedStoreService>,
}

/// Builds the engine and its subsystems from a validated configuration.
pub fn build_service(config: &RelayerConfig) -> Result<ServiceContext> {
	let signer: alloy_signer_local::PrivateKeySigner = config
		.relayer
		.private_key
		.parse()
		.context("Invalid signing key")?;

	// One adapter per configured chain, all sharing the single signing key.
	let mut registry = ChainRegistry::new();
	for (id_str, chain_config) in &config.chains {
		let chain_id = ChainId(id_str.parse().context("Invalid chain id")?);
		let adapter = AlloyAdapter::new(
			&chain_config.rpc_url,
			chain_id,
			chain_config.confirmations,
			chain_config.block_time_secs,
			signer.clone(),
		)
		.with_context(|| format!("Failed to connect chain {}", chain_id))?;
		registry.register(Arc::new(adapter));
	}
	let chains = Arc::new(registry);
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);

	let feeds = Arc::new(FeedStoreService::new(Box::new(FileFeedStore::new(
		&config.feeds.path,
	))));

	let destination_chain = ChainId(config.attestation.destination_chain_id);

	let mut readers: HashMap<Topology, Box<dyn SourceReader>> = HashMap::new();
	readers.insert(
		Topology::Native,
		Box::new(NativeReader::new(
			chains.clone(),
			clock.clone(),
			config.relayer.native_update_interval_secs,
		)),
	);
	readers.insert(Topology::Direct, Box::new(RecordReader::new(chains.clone())));
	readers.insert(
		Topology::Relay,
		Box::new(RelayFetchReader::new(chains.clone(), destination_chain)),
	);
	let source = Arc::new(PriceSourceService::new(readers));

	let http = reqwest::Client::new();
	let mut verifiers = HashMap::new();
	for (id_str, verifier) in &config.attestation.verifiers {
		let chain_id = ChainId(id_str.parse().context("Invalid verifier chain id")?);
		let slow_finality = config
			.chains
			.get(id_str)
			.map(|c| c.slow_finality)
			.unwrap_or(false);
		verifiers.insert(
			chain_id,
			VerifierEndpoint {
				base_url: verifier.base_url.clone(),
				source_id: verifier.source_id.clone(),
				slow_finality,
			},
		);
	}
	let attestation = Arc::new(AttestationClient::new(
		Arc::new(HttpVerifierApi::new(http.clone())),
		Arc::new(HttpDataAvailabilityApi::new(
			http,
			config.attestation.da_base_url.clone(),
		)),
		verifiers,
		Duration::from_secs(config.attestation.finalize_wait_secs),
		clock.clone(),
	));

	let rounds = Arc::new(RoundRegistry::new(
		chains
			.get(destination_chain)
			.context("Destination chain missing from registry")?,
		Address::parse(&config.attestation.round_registry)
			.context("Invalid round registry address")?,
	));

	let rules = ProtocolRules {
		min_relay_interval_secs: config.protocol.min_relay_interval_secs,
		max_future_skew_secs: config.protocol.max_future_skew_secs,
		max_deviation_bps: config.protocol.max_deviation_bps,
	};
	let submitter = Arc::new(UpdateSubmitter::new(
		chains.clone(),
		destination_chain,
		rules,
		clock.clone(),
	));

	let bus = EventBus::new(1024);
	let sink = Arc::new(LogSink::new(512, clock));

	let flows = Arc::new(FlowRunner::new(
		chains,
		source,
		attestation,
		rounds,
		submitter,
		destination_chain,
		bus.clone(),
		sink.clone(),
	));

	let engine = EngineBuilder::new()
		.with_tick_interval(Duration::from_secs(config.relayer.tick_interval_secs))
		.with_feeds(feeds.clone())
		.with_flows(flows)
		.with_event_bus(bus)
		.with_sink(sink)
		.build()
		.context("Failed to build engine")?;

	Ok(ServiceContext {
		engine: Arc::new(engine),
		feeds,
	})
}
