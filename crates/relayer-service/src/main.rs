use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relayer_config::ConfigLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod service;

#[derive(Parser)]
#[command(name = "feed-relayer")]
#[command(about = "Cross-chain price feed relayer", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/relayer.toml")]
	config: PathBuf,

	#[arg(long, env = "RELAYER_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the relayer
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting feed relayer");
	info!("Loading configuration from: {:?}", cli.config);

	// A broken configuration is fatal here: the process never enters the
	// running state.
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.context("Failed to load configuration")?;

	let context = Arc::new(service::build_service(&config).context("Failed to build service")?);
	let engine = context.engine.clone();

	// HTTP surface for the external presentation layer.
	let http_port = config.relayer.http_port;
	let api_context = context.clone();
	let api_handle = tokio::spawn(async move { api::serve(api_context, http_port).await });

	// Scheduler loop.
	let run_engine = engine.clone();
	let run_handle = tokio::spawn(async move { run_engine.run().await });

	info!("Feed relayer started");

	shutdown_signal().await;
	info!("Shutdown signal received, stopping...");

	// Halt the timer; any in-flight flow reaches natural completion.
	engine.shutdown();
	run_handle
		.await
		.context("Scheduler task panicked")?
		.context("Scheduler failed")?;

	api_handle.abort();

	info!("Feed relayer stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Relayer name: {}", config.relayer.name);
	info!("Configured chains:");
	for (id, chain) in &config.chains {
		info!(
			"  {} ({}), confirmations {}, slow_finality {}",
			id, chain.name, chain.confirmations, chain.slow_finality
		);
	}
	info!(
		"Destination chain: {}",
		config.attestation.destination_chain_id
	);
	for (id, verifier) in &config.attestation.verifiers {
		info!("  Verifier for chain {}: {}", id, verifier.source_id);
	}

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
