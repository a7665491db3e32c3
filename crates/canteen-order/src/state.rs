//! Order status state machine.
//!
//! Orders move one step at a time along a fixed forward sequence; the next
//! status is looked up from the current one, never chosen by the caller, so
//! states cannot be skipped. Customers may cancel only while the order is
//! still `pending` or `confirmed`; once the vendor starts preparing,
//! cancellation needs vendor coordination and is rejected here.
//!
//! Every write is a compare-and-swap on the status and updated-at token the
//! order was read with, so a customer cancel and a vendor advance racing on
//! the same order cannot silently overwrite each other: the loser gets
//! [`TransitionError::Conflict`] and must reload.

use canteen_datastore::{DataStoreService, StoreError};
use canteen_types::{Order, OrderEvent, OrderStatus, Party};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during status transitions.
#[derive(Debug, Error)]
pub enum TransitionError {
	/// The order does not exist (or is invisible to the caller).
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The caller is not the party this operation belongs to.
	#[error("Not authorized: {action} requires the order's {required}")]
	Unauthorized {
		action: &'static str,
		required: &'static str,
	},
	/// The order has no further vendor-advance step from its current status.
	#[error("Order is {status} and cannot be advanced")]
	CannotAdvance { status: OrderStatus },
	/// The cancellation window has closed (or the order is already
	/// cancelled).
	#[error("Order is {status} and can no longer be cancelled")]
	CannotCancel { status: OrderStatus },
	/// A concurrent writer changed the order first. Reload and retry.
	#[error("Order changed concurrently; reload and retry")]
	Conflict,
	/// The store failed the operation.
	#[error("Store error: {0}")]
	Store(StoreError),
}

/// Static transition table - each status maps to its legal successors.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Confirmed, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Confirmed,
		HashSet::from([OrderStatus::Preparing, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Preparing,
		HashSet::from([OrderStatus::Ready]),
	);
	m.insert(
		OrderStatus::Ready,
		HashSet::from([OrderStatus::OutForDelivery]),
	);
	m.insert(
		OrderStatus::OutForDelivery,
		HashSet::from([OrderStatus::Delivered]),
	);
	m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

/// Checks if a transition between two statuses is legal.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|successors| successors.contains(&to))
}

/// Applies status transitions with authorization and conflict detection.
pub struct OrderStateMachine {
	store: Arc<DataStoreService>,
	events: broadcast::Sender<OrderEvent>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<DataStoreService>, events: broadcast::Sender<OrderEvent>) -> Self {
		Self { store, events }
	}

	/// Advances an order exactly one step along the forward sequence.
	///
	/// Only the order's vendor may advance it; the target status comes from
	/// the transition table, not the caller.
	pub async fn advance(&self, order_id: &str, caller: &Party) -> Result<Order, TransitionError> {
		let order = self.fetch(order_id).await?;

		match caller {
			Party::Vendor(id) if *id == order.vendor_id => {},
			_ => {
				return Err(TransitionError::Unauthorized {
					action: "advance",
					required: "vendor",
				})
			},
		}

		let next = order
			.status
			.next()
			.ok_or(TransitionError::CannotAdvance {
				status: order.status,
			})?;

		self.apply(order, next, caller, None).await
	}

	/// Cancels an order on behalf of its customer.
	///
	/// Legal only while the order is `pending` or `confirmed`; cancelling an
	/// already-cancelled order is rejected, not silently accepted.
	pub async fn cancel(
		&self,
		order_id: &str,
		caller: &Party,
		reason: Option<String>,
	) -> Result<Order, TransitionError> {
		let order = self.fetch(order_id).await?;

		match caller {
			Party::Customer(id) if *id == order.customer_id => {},
			_ => {
				return Err(TransitionError::Unauthorized {
					action: "cancel",
					required: "customer",
				})
			},
		}

		self.apply(order, OrderStatus::Cancelled, caller, reason)
			.await
	}

	async fn fetch(&self, order_id: &str) -> Result<Order, TransitionError> {
		self.store.fetch_order(order_id).await.map_err(|e| match e {
			StoreError::NotFound => TransitionError::OrderNotFound(order_id.to_string()),
			other => TransitionError::Store(other),
		})
	}

	/// Validates the transition against the table, applies it with a
	/// compare-and-swap on the status/token pair the order was read with,
	/// and publishes the status-change event the history log is built from.
	async fn apply(
		&self,
		order: Order,
		to: OrderStatus,
		by: &Party,
		reason: Option<String>,
	) -> Result<Order, TransitionError> {
		if !is_valid_transition(order.status, to) {
			return Err(if to == OrderStatus::Cancelled {
				TransitionError::CannotCancel {
					status: order.status,
				}
			} else {
				TransitionError::CannotAdvance {
					status: order.status,
				}
			});
		}

		let updated = self
			.store
			.update_order_status(
				&order.id,
				order.status,
				order.updated_at,
				to,
				reason.as_deref(),
			)
			.await
			.map_err(|e| match e {
				StoreError::Conflict => TransitionError::Conflict,
				StoreError::NotFound => TransitionError::OrderNotFound(order.id.clone()),
				other => TransitionError::Store(other),
			})?;

		tracing::info!(
			order_id = %updated.id,
			from = %order.status,
			to = %to,
			by = %by,
			"Order status changed"
		);
		let _ = self.events.send(OrderEvent::StatusChanged {
			order_id: updated.id.clone(),
			from: order.status,
			to,
			changed_by: by.clone(),
			reason,
			at: Utc::now(),
		});

		Ok(updated)
	}
}
