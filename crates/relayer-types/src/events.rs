use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{TransactionHash, TransactionReceipt};

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayerEvent {
	Scheduler(SchedulerEvent),
	Flow(FlowEvent),
	Delivery(DeliveryEvent),
	Attestation(AttestationEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerEvent {
	/// A tick fired while a flow was already in flight.
	TickSkipped { reason: String },
	/// The round-robin cursor landed on this feed.
	FeedSelected { alias: String },
	/// The selected feed failed its eligibility check.
	FeedIneligible { alias: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlowEvent {
	Started {
		alias: String,
		topology: String,
	},
	Completed {
		alias: String,
		/// Final price written, scaled to 6 decimals.
		price_e6: u128,
	},
	Failed {
		alias: String,
		step: String,
		error: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
	TransactionPending {
		alias: String,
		tx_hash: TransactionHash,
		kind: TransactionKind,
	},
	TransactionConfirmed {
		alias: String,
		receipt: TransactionReceipt,
		kind: TransactionKind,
	},
	TransactionFailed {
		alias: String,
		tx_hash: TransactionHash,
		error: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttestationEvent {
	RequestPrepared {
		alias: String,
		attempts: u32,
	},
	ProofRetrieved {
		alias: String,
		voting_round: u64,
	},
	/// The polling budget ran out before the verifier reported ready.
	BudgetExhausted {
		alias: String,
		attempts: u32,
		last_status: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
	Capture,
	Relay,
	ProofUpdate,
	NativeUpdate,
}

/// Event bus for broadcasting relayer events to multiple subscribers.
///
/// Uses tokio's broadcast channel so the scheduler, the log sink and any
/// external presentation layer can observe the same stream without coupling.
pub struct EventBus {
	sender: broadcast::Sender<RelayerEvent>,
}

impl EventBus {
	/// Creates a new EventBus with the specified channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Creates a new subscriber receiving events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<RelayerEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error when there are no active subscribers; callers
	/// generally ignore it.
	pub fn publish(
		&self,
		event: RelayerEvent,
	) -> Result<(), broadcast::error::SendError<RelayerEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
