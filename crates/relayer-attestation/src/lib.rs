//! Attestation client.
//!
//! Drives the per-request state machine: submit the prepare request, poll
//! until the verifier reports the transaction attestable, wait out the
//! voting-round finalization, then fetch the proof from the
//! data-availability layer and assemble it into the typed structure the
//! destination verifier expects.
//!
//! The verifier and DA layer sit behind small traits so the polling logic
//! can be exercised with stubs and a manual clock.

pub mod policy;
pub mod proof;
pub mod rounds;

pub use policy::PollPolicy;
pub use proof::{assemble, ProofDecodeError};
pub use rounds::RoundRegistry;

use async_trait::async_trait;
use relayer_types::{
	AttestationRequest, AttestationStatus, ChainId, Clock, Proof, TransactionHash,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AttestationError {
	#[error("HTTP error: {0}")]
	Http(String),

	/// The verifier judged the request invalid or expired. Deterministic
	/// for the same inputs, so never retried.
	#[error("Verifier rejected the request: {0}")]
	Rejected(String),

	#[error(
		"Attestation polling budget exhausted after {attempts} attempts ({waited_secs}s), last status: {last_status}"
	)]
	BudgetExhausted {
		attempts: u32,
		waited_secs: u64,
		last_status: String,
	},

	#[error("No verifier configured for chain {0}")]
	UnknownChain(ChainId),

	#[error("Decode error: {0}")]
	Decode(String),

	#[error(transparent)]
	Proof(#[from] ProofDecodeError),

	#[error("Chain error: {0}")]
	Chain(#[from] relayer_chains::ChainError),
}

/// Verifier endpoint for one source chain.
#[derive(Debug, Clone)]
pub struct VerifierEndpoint {
	pub base_url: String,
	/// Verifier-network identifier of the source chain, e.g. "testETH".
	pub source_id: String,
	/// Selects the long polling budget.
	pub slow_finality: bool,
}

/// One prepare-poll answer from the verifier.
#[derive(Debug, Clone)]
pub enum PrepareOutcome {
	/// The request is attestable; the encoded request keys the proof later.
	Ready { encoded_request: Vec<u8> },
	/// The verifier has not finalized the transaction yet.
	NotReady { status: String },
	/// Deterministic rejection.
	Rejected { status: String },
}

/// Prepare endpoint of the attestation service.
#[async_trait]
pub trait VerifierApi: Send + Sync {
	async fn prepare(
		&self,
		endpoint: &VerifierEndpoint,
		tx_hash: &TransactionHash,
		required_confirmations: u64,
	) -> Result<PrepareOutcome, AttestationError>;
}

/// Proof endpoint of the data-availability layer.
#[async_trait]
pub trait DataAvailabilityApi: Send + Sync {
	async fn proof_by_round(
		&self,
		voting_round: u64,
		encoded_request: &[u8],
	) -> Result<serde_json::Value, AttestationError>;
}

/// HTTP implementation of the verifier's prepare endpoint.
pub struct HttpVerifierApi {
	http: reqwest::Client,
}

impl HttpVerifierApi {
	pub fn new(http: reqwest::Client) -> Self {
		Self { http }
	}
}

#[async_trait]
impl VerifierApi for HttpVerifierApi {
	async fn prepare(
		&self,
		endpoint: &VerifierEndpoint,
		tx_hash: &TransactionHash,
		required_confirmations: u64,
	) -> Result<PrepareOutcome, AttestationError> {
		let url = format!(
			"{}/EVMTransaction/prepareRequest",
			endpoint.base_url.trim_end_matches('/')
		);

		let body = json!({
			"attestationType": "EVMTransaction",
			"sourceId": endpoint.source_id,
			"requestBody": {
				"transactionHash": tx_hash.to_string(),
				"requiredConfirmations": required_confirmations.to_string(),
			},
		});

		let response = self
			.http
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| AttestationError::Http(format!("prepareRequest: {}", e)))?;

		let payload: serde_json::Value = response
			.json()
			.await
			.map_err(|e| AttestationError::Http(format!("prepareRequest body: {}", e)))?;

		let status = payload
			.get("status")
			.and_then(|s| s.as_str())
			.unwrap_or("unknown")
			.to_string();

		match status.as_str() {
			"VALID" => {
				let encoded = payload
					.get("abiEncodedRequest")
					.and_then(|v| v.as_str())
					.ok_or_else(|| {
						AttestationError::Decode("VALID response without abiEncodedRequest".into())
					})?;
				let stripped = encoded.strip_prefix("0x").unwrap_or(encoded);
				let encoded_request = hex::decode(stripped)
					.map_err(|e| AttestationError::Decode(format!("abiEncodedRequest: {}", e)))?;
				Ok(PrepareOutcome::Ready { encoded_request })
			}
			"INVALID" => Ok(PrepareOutcome::Rejected { status }),
			_ => Ok(PrepareOutcome::NotReady { status }),
		}
	}
}

/// HTTP implementation of the DA layer's proof endpoint.
pub struct HttpDataAvailabilityApi {
	http: reqwest::Client,
	base_url: String,
}

impl HttpDataAvailabilityApi {
	pub fn new(http: reqwest::Client, base_url: String) -> Self {
		Self { http, base_url }
	}
}

#[async_trait]
impl DataAvailabilityApi for HttpDataAvailabilityApi {
	async fn proof_by_round(
		&self,
		voting_round: u64,
		encoded_request: &[u8],
	) -> Result<serde_json::Value, AttestationError> {
		let url = format!(
			"{}/api/v1/proof-by-request-round",
			self.base_url.trim_end_matches('/')
		);

		let body = json!({
			"votingRoundId": voting_round,
			"requestBytes": format!("0x{}", hex::encode(encoded_request)),
		});

		let response = self
			.http
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| AttestationError::Http(format!("proof-by-request-round: {}", e)))?;

		response
			.json()
			.await
			.map_err(|e| AttestationError::Http(format!("proof-by-request-round body: {}", e)))
	}
}

/// The attestation retrieval/retry subsystem.
pub struct AttestationClient {
	verifier_api: Arc<dyn VerifierApi>,
	da_api: Arc<dyn DataAvailabilityApi>,
	verifiers: HashMap<ChainId, VerifierEndpoint>,
	finalize_wait: Duration,
	clock: Arc<dyn Clock>,
}

impl AttestationClient {
	pub fn new(
		verifier_api: Arc<dyn VerifierApi>,
		da_api: Arc<dyn DataAvailabilityApi>,
		verifiers: HashMap<ChainId, VerifierEndpoint>,
		finalize_wait: Duration,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			verifier_api,
			da_api,
			verifiers,
			finalize_wait,
			clock,
		}
	}

	fn endpoint(&self, chain_id: ChainId) -> Result<&VerifierEndpoint, AttestationError> {
		self.verifiers
			.get(&chain_id)
			.ok_or(AttestationError::UnknownChain(chain_id))
	}

	/// Polling policy for the chain: the long budget for slow-finalizing
	/// chains, the short one otherwise.
	pub fn policy_for(&self, chain_id: ChainId) -> Result<PollPolicy, AttestationError> {
		Ok(if self.endpoint(chain_id)?.slow_finality {
			PollPolicy::slow()
		} else {
			PollPolicy::fast()
		})
	}

	/// Submits the prepare request and polls until the verifier reports it
	/// attestable, honoring the chain's polling budget.
	pub async fn prepare(
		&self,
		chain_id: ChainId,
		tx_hash: &TransactionHash,
		required_confirmations: u64,
	) -> Result<AttestationRequest, AttestationError> {
		let endpoint = self.endpoint(chain_id)?.clone();
		let policy = self.policy_for(chain_id)?;

		let started = self.clock.now_unix();
		let mut attempts = 0u32;
		let mut last_status = "none".to_string();

		loop {
			attempts += 1;
			match self
				.verifier_api
				.prepare(&endpoint, tx_hash, required_confirmations)
				.await
			{
				Ok(PrepareOutcome::Ready { encoded_request }) => {
					info!(
						chain = %chain_id,
						attempts,
						"Attestation request prepared"
					);
					return Ok(AttestationRequest {
						source_chain_id: chain_id,
						transaction_hash: tx_hash.clone(),
						required_confirmations,
						encoded_request,
						status: AttestationStatus::Ready,
					});
				}
				Ok(PrepareOutcome::NotReady { status }) => {
					debug!(chain = %chain_id, %status, attempts, "Verifier not ready");
					last_status = status;
				}
				Ok(PrepareOutcome::Rejected { status }) => {
					return Err(AttestationError::Rejected(status));
				}
				// Transient transport failures count against the same
				// wall-clock budget as not-ready answers.
				Err(AttestationError::Http(e)) => {
					warn!(chain = %chain_id, attempts, "Verifier request failed: {}", e);
					last_status = format!("http error: {}", e);
				}
				Err(other) => return Err(other),
			}

			let waited = Duration::from_secs(self.clock.now_unix().saturating_sub(started));
			if !policy.allows_retry(waited) {
				return Err(AttestationError::BudgetExhausted {
					attempts,
					waited_secs: waited.as_secs(),
					last_status,
				});
			}
			self.clock.sleep(policy.retry_delay).await;
		}
	}

	/// Waits out the voting-round finalization before the proof request.
	/// Deadlined against the clock rather than a single opaque sleep.
	pub async fn await_finalization(&self) {
		let deadline = self.clock.now_unix() + self.finalize_wait.as_secs();
		loop {
			let now = self.clock.now_unix();
			if now >= deadline {
				return;
			}
			let remaining = deadline - now;
			self.clock
				.sleep(Duration::from_secs(remaining.min(15)))
				.await;
		}
	}

	/// Fetches and assembles the proof for a prepared request.
	pub async fn retrieve_proof(
		&self,
		request: &AttestationRequest,
		voting_round: u64,
	) -> Result<Proof, AttestationError> {
		let document = self
			.da_api
			.proof_by_round(voting_round, &request.encoded_request)
			.await?;

		let proof = proof::assemble(&document)?;
		info!(
			voting_round,
			events = proof.response_body.events.len(),
			"Attestation proof retrieved"
		);
		Ok(proof)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

	/// Clock that advances only when slept on.
	struct ManualClock {
		now: AtomicU64,
	}

	impl ManualClock {
		fn new(start: u64) -> Self {
			Self {
				now: AtomicU64::new(start),
			}
		}
	}

	#[async_trait]
	impl Clock for ManualClock {
		fn now_unix(&self) -> u64 {
			self.now.load(Ordering::SeqCst)
		}

		async fn sleep(&self, duration: Duration) {
			self.now.fetch_add(duration.as_secs(), Ordering::SeqCst);
		}
	}

	struct StubVerifier {
		ready_after: u32,
		calls: AtomicU32,
	}

	#[async_trait]
	impl VerifierApi for StubVerifier {
		async fn prepare(
			&self,
			_endpoint: &VerifierEndpoint,
			_tx_hash: &TransactionHash,
			_required_confirmations: u64,
		) -> Result<PrepareOutcome, AttestationError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			if self.ready_after > 0 && call >= self.ready_after {
				Ok(PrepareOutcome::Ready {
					encoded_request: vec![0xaa; 8],
				})
			} else {
				Ok(PrepareOutcome::NotReady {
					status: "INDETERMINATE".to_string(),
				})
			}
		}
	}

	struct StubDa;

	#[async_trait]
	impl DataAvailabilityApi for StubDa {
		async fn proof_by_round(
			&self,
			_voting_round: u64,
			_encoded_request: &[u8],
		) -> Result<serde_json::Value, AttestationError> {
			Ok(serde_json::json!({}))
		}
	}

	fn client(ready_after: u32, slow: bool) -> AttestationClient {
		let mut verifiers = HashMap::new();
		verifiers.insert(
			ChainId(11155111),
			VerifierEndpoint {
				base_url: "http://verifier.test".into(),
				source_id: "testETH".into(),
				slow_finality: slow,
			},
		);

		AttestationClient::new(
			Arc::new(StubVerifier {
				ready_after,
				calls: AtomicU32::new(0),
			}),
			Arc::new(StubDa),
			verifiers,
			Duration::from_secs(180),
			Arc::new(ManualClock::new(1_700_000_000)),
		)
	}

	#[tokio::test]
	async fn test_prepare_succeeds_after_not_ready() {
		let client = client(3, false);
		let request = client
			.prepare(ChainId(11155111), &TransactionHash(vec![0xab; 32]), 2)
			.await
			.unwrap();

		assert_eq!(request.status, AttestationStatus::Ready);
		assert_eq!(request.encoded_request, vec![0xaa; 8]);
	}

	#[tokio::test]
	async fn test_prepare_gives_up_with_attempts_and_status() {
		// Verifier never becomes ready; the fast budget is 300s with a
		// 10s delay, so attempts run at t = 0, 10, ..., 290.
		let client = client(0, false);
		let err = client
			.prepare(ChainId(11155111), &TransactionHash(vec![0xab; 32]), 2)
			.await
			.unwrap_err();

		match err {
			AttestationError::BudgetExhausted {
				attempts,
				waited_secs,
				last_status,
			} => {
				assert_eq!(attempts, 30);
				assert_eq!(waited_secs, 290);
				assert_eq!(last_status, "INDETERMINATE");
			}
			other => panic!("expected BudgetExhausted, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_slow_chain_uses_long_budget() {
		let client = client(0, true);
		let err = client
			.prepare(ChainId(11155111), &TransactionHash(vec![0xab; 32]), 2)
			.await
			.unwrap_err();

		match err {
			AttestationError::BudgetExhausted {
				attempts,
				waited_secs,
				..
			} => {
				// 30s delay against a 1800s budget: t = 0, 30, ..., 1770.
				assert_eq!(attempts, 60);
				assert_eq!(waited_secs, 1770);
			}
			other => panic!("expected BudgetExhausted, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_unknown_chain() {
		let client = client(1, false);
		let err = client
			.prepare(ChainId(1), &TransactionHash(vec![0xab; 32]), 2)
			.await
			.unwrap_err();
		assert!(matches!(err, AttestationError::UnknownChain(ChainId(1))));
	}

	#[tokio::test]
	async fn test_await_finalization_advances_to_deadline() {
		let clock = Arc::new(ManualClock::new(1_700_000_000));
		let client = AttestationClient::new(
			Arc::new(StubVerifier {
				ready_after: 1,
				calls: AtomicU32::new(0),
			}),
			Arc::new(StubDa),
			HashMap::new(),
			Duration::from_secs(180),
			clock.clone(),
		);

		client.await_finalization().await;
		assert_eq!(clock.now_unix(), 1_700_000_180);
	}
}
