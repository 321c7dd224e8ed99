//! Configuration loading with environment variable substitution.

use crate::types::RelayerConfig;
use crate::ConfigError;
use std::env;
use std::path::Path;
use tracing::info;

/// Configuration loader with environment variable substitution
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "RELAYER_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub fn load(&self) -> Result<RelayerConfig, ConfigError> {
		let file_path = self
			.file_path
			.as_ref()
			.ok_or_else(|| ConfigError::FileNotFound("No configuration file specified".into()))?;

		info!("Loading configuration from {}", file_path);

		let content = std::fs::read_to_string(file_path)?;
		let mut config = self.parse(&content)?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	/// Parses a TOML document after `${VAR}` substitution.
	pub fn parse(&self, content: &str) -> Result<RelayerConfig, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;
		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value =
				env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut RelayerConfig) -> Result<(), ConfigError> {
		if let Ok(key) = env::var(format!("{}PRIVATE_KEY", self.env_prefix)) {
			config.relayer.private_key = key;
		}

		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.relayer.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.relayer.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		Ok(())
	}
}

/// Start-time validation. Any error here is fatal: the process never
/// enters the running state with a broken configuration.
pub fn validate_config(config: &RelayerConfig) -> Result<(), ConfigError> {
	let key = &config.relayer.private_key;
	let stripped = key.strip_prefix("0x").ok_or_else(|| {
		ConfigError::ValidationError("Private key must start with 0x".to_string())
	})?;

	if stripped.len() != 64 || !is_hex(stripped) {
		return Err(ConfigError::ValidationError(
			"Private key must be 64 hex characters (32 bytes)".to_string(),
		));
	}

	if config.chains.is_empty() {
		return Err(ConfigError::ValidationError(
			"At least one chain must be configured".to_string(),
		));
	}

	for (id, chain) in &config.chains {
		if id.parse::<u64>().is_err() {
			return Err(ConfigError::ValidationError(format!(
				"Chain key '{}' is not a numeric chain id",
				id
			)));
		}
		if !chain.rpc_url.starts_with("http://") && !chain.rpc_url.starts_with("https://") {
			return Err(ConfigError::ValidationError(format!(
				"RPC URL for chain {} must start with http:// or https://",
				id
			)));
		}
	}

	let dest = config.attestation.destination_chain_id.to_string();
	if !config.chains.contains_key(&dest) {
		return Err(ConfigError::ValidationError(format!(
			"Destination chain {} is not configured under [chains]",
			dest
		)));
	}

	let registry = &config.attestation.round_registry;
	let registry_hex = registry.strip_prefix("0x").unwrap_or(registry);
	if registry_hex.len() != 40 || !is_hex(registry_hex) {
		return Err(ConfigError::ValidationError(
			"round_registry must be a valid address".to_string(),
		));
	}

	for (id, verifier) in &config.attestation.verifiers {
		if !config.chains.contains_key(id) {
			return Err(ConfigError::ValidationError(format!(
				"Verifier configured for unknown chain {}",
				id
			)));
		}
		if verifier.source_id.is_empty() {
			return Err(ConfigError::ValidationError(format!(
				"Verifier for chain {} has an empty source_id",
				id
			)));
		}
	}

	Ok(())
}

fn is_hex(s: &str) -> bool {
	s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_TOML: &str = r#"
[relayer]
name = "test-relayer"
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[chains.114]
name = "Coston2"
rpc_url = "https://coston2.example.com"
confirmations = 1
block_time_secs = 2

[chains.11155111]
name = "Sepolia"
rpc_url = "https://sepolia.example.com"
confirmations = 2
block_time_secs = 12
slow_finality = true

[attestation]
da_base_url = "https://da.example.com"
round_registry = "0x1111111111111111111111111111111111111111"
destination_chain_id = 114

[attestation.verifiers.11155111]
base_url = "https://verifier.example.com"
source_id = "testETH"

[feeds]
path = "./feeds.json"
"#;

	#[test]
	fn test_parse_and_defaults() {
		let config = ConfigLoader::new().parse(BASE_TOML).unwrap();
		assert_eq!(config.relayer.name, "test-relayer");
		assert_eq!(config.relayer.tick_interval_secs, 60);
		assert_eq!(config.relayer.native_update_interval_secs, 300);
		assert_eq!(config.protocol.max_future_skew_secs, 600);
		assert_eq!(config.protocol.max_deviation_bps, 5_000);
		assert_eq!(config.protocol.min_relay_interval_secs, 60);
		assert_eq!(config.attestation.finalize_wait_secs, 180);

		let sepolia = config.chains.get("11155111").unwrap();
		assert!(sepolia.slow_finality);
		assert!(!config.chains.get("114").unwrap().slow_finality);
	}

	#[test]
	fn test_validation_accepts_base() {
		let config = ConfigLoader::new().parse(BASE_TOML).unwrap();
		assert!(validate_config(&config).is_ok());
	}

	#[test]
	fn test_validation_rejects_bad_private_key() {
		let mut config = ConfigLoader::new().parse(BASE_TOML).unwrap();
		config.relayer.private_key = "not-a-key".to_string();

		let err = validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("Private key"));
	}

	#[test]
	fn test_validation_rejects_unknown_destination_chain() {
		let mut config = ConfigLoader::new().parse(BASE_TOML).unwrap();
		config.attestation.destination_chain_id = 999;

		let err = validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("Destination chain"));
	}

	#[test]
	fn test_validation_rejects_verifier_for_unknown_chain() {
		let mut config = ConfigLoader::new().parse(BASE_TOML).unwrap();
		let verifier = config
			.attestation
			.verifiers
			.get("11155111")
			.cloned()
			.unwrap();
		config.attestation.verifiers.insert("42".into(), verifier);

		let err = validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("unknown chain"));
	}

	#[test]
	fn test_env_substitution_missing_var() {
		let toml = r#"
[relayer]
name = "x"
private_key = "${RELAYER_TEST_MISSING_VAR}"
"#;
		let err = ConfigLoader::new().parse(toml).unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
	}

	#[test]
	fn test_load_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, BASE_TOML).unwrap();

		let config = ConfigLoader::new().with_file(&path).load().unwrap();
		assert_eq!(config.relayer.name, "test-relayer");
	}
}
