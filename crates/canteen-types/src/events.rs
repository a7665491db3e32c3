//! Event types published on the session event bus.
//!
//! Every order mutation emits an event. External collaborators (the
//! status-history recorder, notification delivery) subscribe to the bus;
//! this core only guarantees the events are published in order of
//! application.

use crate::{OrderStatus, Party};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Events emitted by the order services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was placed and all of its lines were persisted.
	Placed {
		order_id: String,
		order_number: String,
		customer_id: String,
		vendor_id: String,
		total_amount: Decimal,
		at: DateTime<Utc>,
	},
	/// An order insert was undone after its line insert failed.
	SubmissionRolledBack {
		order_id: String,
		reason: String,
		at: DateTime<Utc>,
	},
	/// The compensating delete itself failed; the order row is orphaned and
	/// needs out-of-band reconciliation.
	OrphanDetected {
		order_id: String,
		reason: String,
		at: DateTime<Utc>,
	},
	/// A status transition was applied. One event per applied transition,
	/// in order; the append-only status history is built from these.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
		changed_by: Party,
		#[serde(skip_serializing_if = "Option::is_none")]
		reason: Option<String>,
		at: DateTime<Utc>,
	},
}
