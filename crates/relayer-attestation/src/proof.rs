//! Proof assembly.
//!
//! Decodes the data-availability layer's attestation response into the typed
//! `Proof` the destination verifier expects. Every field is pulled by name;
//! a missing or malformed field is reported as such and fails the attempt.

use alloy_primitives::U256;
use relayer_types::{
	Address, Proof, ProofEvent, ProofRequestBody, ProofResponseBody, TransactionHash,
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofDecodeError {
	#[error("Proof field missing: {0}")]
	MissingField(&'static str),

	#[error("Proof field malformed: {field}: {reason}")]
	MalformedField { field: &'static str, reason: String },
}

fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value, ProofDecodeError> {
	value.get(name).ok_or(ProofDecodeError::MissingField(name))
}

fn get_str(value: &Value, name: &'static str) -> Result<String, ProofDecodeError> {
	field(value, name)?
		.as_str()
		.map(|s| s.to_string())
		.ok_or(ProofDecodeError::MalformedField {
			field: name,
			reason: "expected a string".into(),
		})
}

/// Accepts either a JSON number or a decimal string; the DA layer emits
/// both depending on magnitude.
fn get_u64(value: &Value, name: &'static str) -> Result<u64, ProofDecodeError> {
	let raw = field(value, name)?;
	if let Some(n) = raw.as_u64() {
		return Ok(n);
	}
	raw.as_str()
		.and_then(|s| s.parse::<u64>().ok())
		.ok_or(ProofDecodeError::MalformedField {
			field: name,
			reason: "expected an unsigned integer".into(),
		})
}

fn get_u256(value: &Value, name: &'static str) -> Result<U256, ProofDecodeError> {
	let raw = field(value, name)?;
	if let Some(n) = raw.as_u64() {
		return Ok(U256::from(n));
	}
	raw.as_str()
		.and_then(|s| {
			if let Some(hex_str) = s.strip_prefix("0x") {
				U256::from_str_radix(hex_str, 16).ok()
			} else {
				U256::from_str_radix(s, 10).ok()
			}
		})
		.ok_or(ProofDecodeError::MalformedField {
			field: name,
			reason: "expected an unsigned integer".into(),
		})
}

fn get_bool(value: &Value, name: &'static str) -> Result<bool, ProofDecodeError> {
	field(value, name)?
		.as_bool()
		.ok_or(ProofDecodeError::MalformedField {
			field: name,
			reason: "expected a boolean".into(),
		})
}

fn decode_hex(name: &'static str, s: &str) -> Result<Vec<u8>, ProofDecodeError> {
	let stripped = s.strip_prefix("0x").unwrap_or(s);
	hex::decode(stripped).map_err(|e| ProofDecodeError::MalformedField {
		field: name,
		reason: format!("invalid hex: {}", e),
	})
}

fn get_hex_bytes(value: &Value, name: &'static str) -> Result<Vec<u8>, ProofDecodeError> {
	let s = get_str(value, name)?;
	decode_hex(name, &s)
}

fn get_word(value: &Value, name: &'static str) -> Result<[u8; 32], ProofDecodeError> {
	let bytes = get_hex_bytes(value, name)?;
	bytes
		.try_into()
		.map_err(|_| ProofDecodeError::MalformedField {
			field: name,
			reason: "expected 32 bytes".into(),
		})
}

fn get_address(value: &Value, name: &'static str) -> Result<Address, ProofDecodeError> {
	let bytes = get_hex_bytes(value, name)?;
	if bytes.len() != 20 {
		return Err(ProofDecodeError::MalformedField {
			field: name,
			reason: "expected a 20-byte address".into(),
		});
	}
	Ok(Address(bytes))
}

fn decode_event(value: &Value) -> Result<ProofEvent, ProofDecodeError> {
	let topics_raw = field(value, "topics")?
		.as_array()
		.ok_or(ProofDecodeError::MalformedField {
			field: "topics",
			reason: "expected an array".into(),
		})?;

	let mut topics = Vec::with_capacity(topics_raw.len());
	for topic in topics_raw {
		let s = topic.as_str().ok_or(ProofDecodeError::MalformedField {
			field: "topics",
			reason: "expected hex strings".into(),
		})?;
		let bytes = decode_hex("topics", s)?;
		topics.push(
			bytes
				.try_into()
				.map_err(|_| ProofDecodeError::MalformedField {
					field: "topics",
					reason: "expected 32-byte topics".into(),
				})?,
		);
	}

	Ok(ProofEvent {
		log_index: get_u64(value, "logIndex")? as u32,
		emitter: get_address(value, "emitterAddress")?,
		topics,
		data: get_hex_bytes(value, "data")?,
		removed: get_bool(value, "removed")?,
	})
}

/// Assembles a typed proof from the DA layer's JSON document.
pub fn assemble(document: &Value) -> Result<Proof, ProofDecodeError> {
	let response = field(document, "response")?;

	let request_body_raw = field(response, "requestBody")?;
	let request_body = ProofRequestBody {
		transaction_hash: TransactionHash(get_hex_bytes(request_body_raw, "transactionHash")?),
		required_confirmations: get_u64(request_body_raw, "requiredConfirmations")?,
	};

	let response_body_raw = field(response, "responseBody")?;
	let events_raw =
		field(response_body_raw, "events")?
			.as_array()
			.ok_or(ProofDecodeError::MalformedField {
				field: "events",
				reason: "expected an array".into(),
			})?;
	let events = events_raw
		.iter()
		.map(decode_event)
		.collect::<Result<Vec<_>, _>>()?;

	let response_body = ProofResponseBody {
		block_number: get_u64(response_body_raw, "blockNumber")?,
		timestamp: get_u64(response_body_raw, "timestamp")?,
		source_address: get_address(response_body_raw, "sourceAddress")?,
		receiving_address: get_address(response_body_raw, "receivingAddress")?,
		value: get_u256(response_body_raw, "value")?,
		status: get_u64(response_body_raw, "status")? as u8,
		events,
	};

	let merkle_raw = field(document, "proof")?
		.as_array()
		.ok_or(ProofDecodeError::MalformedField {
			field: "proof",
			reason: "expected an array".into(),
		})?;
	let mut merkle_proof = Vec::with_capacity(merkle_raw.len());
	for node in merkle_raw {
		let s = node.as_str().ok_or(ProofDecodeError::MalformedField {
			field: "proof",
			reason: "expected hex strings".into(),
		})?;
		let bytes = decode_hex("proof", s)?;
		merkle_proof.push(
			bytes
				.try_into()
				.map_err(|_| ProofDecodeError::MalformedField {
					field: "proof",
					reason: "expected 32-byte nodes".into(),
				})?,
		);
	}

	Ok(Proof {
		attestation_type: get_str(response, "attestationType")?,
		source_id: get_str(response, "sourceId")?,
		voting_round: get_u64(response, "votingRound")?,
		lowest_used_timestamp: get_u64(response, "lowestUsedTimestamp")?,
		request_body,
		response_body,
		merkle_proof,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn full_document() -> Value {
		json!({
			"response": {
				"attestationType": "EVMTransaction",
				"sourceId": "testETH",
				"votingRound": 841_223,
				"lowestUsedTimestamp": 1_700_000_000u64,
				"requestBody": {
					"transactionHash": format!("0x{}", "ab".repeat(32)),
					"requiredConfirmations": "2"
				},
				"responseBody": {
					"blockNumber": "19000000",
					"timestamp": 1_700_000_123u64,
					"sourceAddress": format!("0x{}", "11".repeat(20)),
					"receivingAddress": format!("0x{}", "22".repeat(20)),
					"value": "0",
					"status": 1,
					"events": [{
						"logIndex": 3,
						"emitterAddress": format!("0x{}", "33".repeat(20)),
						"topics": [format!("0x{}", "44".repeat(32))],
						"data": "0xdeadbeef",
						"removed": false
					}]
				}
			},
			"proof": [format!("0x{}", "55".repeat(32))]
		})
	}

	#[test]
	fn test_assemble_full_document() {
		let proof = assemble(&full_document()).unwrap();
		assert_eq!(proof.attestation_type, "EVMTransaction");
		assert_eq!(proof.source_id, "testETH");
		assert_eq!(proof.voting_round, 841_223);
		assert_eq!(proof.request_body.required_confirmations, 2);
		assert_eq!(proof.response_body.block_number, 19_000_000);
		assert_eq!(proof.response_body.status, 1);
		assert_eq!(proof.response_body.events.len(), 1);
		assert_eq!(proof.response_body.events[0].log_index, 3);
		assert_eq!(proof.merkle_proof.len(), 1);
	}

	#[test]
	fn test_missing_field_is_named() {
		let mut doc = full_document();
		doc["response"]
			.as_object_mut()
			.unwrap()
			.remove("votingRound");

		assert_eq!(
			assemble(&doc),
			Err(ProofDecodeError::MissingField("votingRound"))
		);
	}

	#[test]
	fn test_missing_response_body_field_is_named() {
		let mut doc = full_document();
		doc["response"]["responseBody"]
			.as_object_mut()
			.unwrap()
			.remove("receivingAddress");

		assert_eq!(
			assemble(&doc),
			Err(ProofDecodeError::MissingField("receivingAddress"))
		);
	}

	#[test]
	fn test_malformed_address_is_named() {
		let mut doc = full_document();
		doc["response"]["responseBody"]["sourceAddress"] = json!("0x1234");

		match assemble(&doc) {
			Err(ProofDecodeError::MalformedField { field, .. }) => {
				assert_eq!(field, "sourceAddress")
			}
			other => panic!("expected malformed sourceAddress, got {:?}", other),
		}
	}

	#[test]
	fn test_string_and_number_integers_both_accepted() {
		let proof = assemble(&full_document()).unwrap();
		// votingRound arrived as a number, blockNumber as a string.
		assert_eq!(proof.voting_round, 841_223);
		assert_eq!(proof.response_body.block_number, 19_000_000);
	}
}
