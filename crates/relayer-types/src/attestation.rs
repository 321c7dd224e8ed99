//! Attestation request and proof types.
//!
//! The proof structs mirror, field by field, the structure the destination
//! program's verifier expects. Any omission here causes on-chain rejection,
//! so the decoder in `relayer-attestation` validates every field by name.

use crate::common::{Address, ChainId, TransactionHash};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Verifier-side status of an attestation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationStatus {
	Pending,
	Ready,
	Invalid,
	Expired,
}

impl std::fmt::Display for AttestationStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AttestationStatus::Pending => write!(f, "pending"),
			AttestationStatus::Ready => write!(f, "ready"),
			AttestationStatus::Invalid => write!(f, "invalid"),
			AttestationStatus::Expired => write!(f, "expired"),
		}
	}
}

/// An in-flight attestation request.
///
/// Ephemeral: discarded after proof submission or final failure. The
/// capture/relay transaction hash is reusable, so the attestation phase
/// alone can be retried against the same hash.
#[derive(Debug, Clone)]
pub struct AttestationRequest {
	/// Chain the attested transaction ran on.
	pub source_chain_id: ChainId,
	/// The transaction being attested.
	pub transaction_hash: TransactionHash,
	/// Confirmations the verifier requires before answering.
	pub required_confirmations: u64,
	/// ABI-encoded request payload returned by the verifier's prepare step.
	pub encoded_request: Vec<u8>,
	pub status: AttestationStatus,
}

/// One event emitted by the attested transaction, in log order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEvent {
	pub log_index: u32,
	pub emitter: Address,
	pub topics: Vec<[u8; 32]>,
	pub data: Vec<u8>,
	pub removed: bool,
}

/// Request body echoed back inside the attestation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequestBody {
	pub transaction_hash: TransactionHash,
	pub required_confirmations: u64,
}

/// Response body describing the attested transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResponseBody {
	pub block_number: u64,
	pub timestamp: u64,
	pub source_address: Address,
	pub receiving_address: Address,
	pub value: U256,
	/// 1 on success, 0 on revert of the attested transaction.
	pub status: u8,
	/// Ordered event list, as emitted.
	pub events: Vec<ProofEvent>,
}

/// Decoded attestation response plus the merkle proof for the voting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
	/// Attestation type tag, e.g. "EVMTransaction".
	pub attestation_type: String,
	/// Verifier-network identifier of the source chain.
	pub source_id: String,
	/// Finalization epoch the attestation was sealed in.
	pub voting_round: u64,
	pub lowest_used_timestamp: u64,
	pub request_body: ProofRequestBody,
	pub response_body: ProofResponseBody,
	/// Merkle proof against the round's confirmed root.
	pub merkle_proof: Vec<[u8; 32]>,
}
