//! Solidity bindings for the programs the relayer talks to.
//!
//! The capture program, relay program, destination feed and round registry
//! are our own deployments, so their ABIs are authoritative here. The source
//! pool follows the canonical concentrated-liquidity pool interface.

use alloy_sol_types::sol;

sol! {
	/// Concentrated-liquidity pool on the source chain.
	interface ISourcePool {
		function slot0() external view returns (
			uint160 sqrtPriceX96,
			int24 tick,
			uint16 observationIndex,
			uint16 observationCardinality,
			uint16 observationCardinalityNext,
			uint8 feeProtocol,
			bool unlocked
		);
		function liquidity() external view returns (uint128);
		function token0() external view returns (address);
		function token1() external view returns (address);
	}

	/// Snapshot program on the source chain (direct topology).
	interface ICaptureProgram {
		function recordPrice(address pool) external;
		function canUpdate(address pool) external view returns (bool);
	}

	/// Relay program on the destination chain (relay topology).
	interface IRelayProgram {
		function relayPrice(
			uint64 sourceChainId,
			address pool,
			uint256 sqrtPriceX96,
			int256 tick,
			uint128 liquidity,
			address token0,
			address token1,
			uint64 sourceTimestamp,
			uint64 sourceBlockNumber
		) external;
		function canRelay(uint64 sourceChainId, address pool) external view returns (bool);
		function lastRelay(uint64 sourceChainId, address pool) external view returns (
			uint256 priceE6,
			uint64 sourceBlockNumber,
			uint64 relayedAt
		);
	}

	struct AttestedEvent {
		uint32 logIndex;
		address emitterAddress;
		bytes32[] topics;
		bytes data;
		bool removed;
	}

	struct AttestedRequestBody {
		bytes32 transactionHash;
		uint16 requiredConfirmations;
	}

	struct AttestedResponseBody {
		uint64 blockNumber;
		uint64 timestamp;
		address sourceAddress;
		address receivingAddress;
		uint256 value;
		uint8 status;
		AttestedEvent[] events;
	}

	struct AttestedResponse {
		bytes32 attestationType;
		bytes32 sourceId;
		uint64 votingRound;
		uint64 lowestUsedTimestamp;
		AttestedRequestBody requestBody;
		AttestedResponseBody responseBody;
	}

	/// The exact structure the destination verifier checks against the
	/// round's confirmed merkle root.
	struct TransactionProof {
		bytes32[] merkleProof;
		AttestedResponse data;
	}

	/// Destination feed program consuming verified values.
	interface IDestinationFeed {
		function updateFromProof(TransactionProof proof) external;
		function updateFromNativePool() external;
		function latestValue() external view returns (uint256);
		function lastUpdateTimestamp() external view returns (uint64);
		function updateCount() external view returns (uint64);
	}

	/// Voting-round registry on the destination chain.
	interface IRoundRegistry {
		function roundIdForTimestamp(uint64 timestamp) external view returns (uint32);
	}
}
