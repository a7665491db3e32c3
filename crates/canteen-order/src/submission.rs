//! Order submission flow.
//!
//! The hosted store offers no multi-statement transactions from the client,
//! so checkout is a strict sequence: insert the order row, then insert its
//! lines against the generated order id, and if the line insert fails, undo
//! the order with a compensating delete. The delete is best-effort; when it
//! fails too the order row is orphaned, which is logged at error severity
//! and surfaced distinctly so an out-of-band job can reconcile it.
//!
//! The subtotal is always computed here from the submitted lines. A
//! caller-supplied aggregate is never trusted.

use crate::query::{OrderQueryService, QueryError};
use canteen_datastore::{DataStoreService, StoreError};
use canteen_types::{
	money, CartSnapshot, NewOrder, NewOrderLine, OrderEvent, OrderStatus, OrderTotals, OrderView,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during order submission.
#[derive(Debug, Error)]
pub enum SubmitError {
	/// Malformed input caught before any network call.
	#[error("Validation failed: {0}")]
	Validation(String),
	/// The store failed the operation. If the order row had already landed,
	/// the compensating delete succeeded and nothing is left behind.
	#[error("Store rejected the order: {0}")]
	Persistence(StoreError),
	/// The line insert failed and the compensating delete failed too: an
	/// empty order row is stranded in the store until reconciliation.
	#[error("Order {order_id} orphaned after failed line insert: {source}")]
	Orphaned {
		order_id: String,
		source: StoreError,
	},
}

/// One submitted line, priced at the moment of checkout.
#[derive(Debug, Clone)]
pub struct LineInput {
	pub menu_item_id: String,
	pub item_name: String,
	pub unit_price: Decimal,
	pub quantity: u32,
	pub special_instructions: Option<String>,
}

/// Everything needed to place one order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
	pub customer_id: String,
	pub vendor_id: String,
	pub lines: Vec<LineInput>,
	pub delivery_fee: Decimal,
	pub tax_amount: Decimal,
	pub payment_method: String,
	pub special_instructions: Option<String>,
}

impl CheckoutRequest {
	/// Builds a request from the current cart snapshot. Fails fast when the
	/// cart is empty rather than producing a request that cannot validate.
	pub fn from_cart(
		customer_id: impl Into<String>,
		snapshot: &CartSnapshot,
		delivery_fee: Decimal,
		tax_amount: Decimal,
		payment_method: impl Into<String>,
		special_instructions: Option<String>,
	) -> Result<Self, SubmitError> {
		let vendor = snapshot
			.vendor
			.as_ref()
			.filter(|_| !snapshot.is_empty())
			.ok_or_else(|| SubmitError::Validation("cart is empty".into()))?;

		Ok(Self {
			customer_id: customer_id.into(),
			vendor_id: vendor.id.clone(),
			lines: snapshot
				.lines
				.iter()
				.map(|line| LineInput {
					menu_item_id: line.menu_item_id.clone(),
					item_name: line.name.clone(),
					unit_price: line.unit_price,
					quantity: line.quantity,
					special_instructions: None,
				})
				.collect(),
			delivery_fee,
			tax_amount,
			payment_method: payment_method.into(),
			special_instructions,
		})
	}

	fn validate(&self) -> Result<(), SubmitError> {
		if self.lines.is_empty() {
			return Err(SubmitError::Validation("order has no lines".into()));
		}
		for line in &self.lines {
			if line.quantity == 0 {
				return Err(SubmitError::Validation(format!(
					"line {} has zero quantity",
					line.menu_item_id
				)));
			}
			if line.unit_price < Decimal::ZERO {
				return Err(SubmitError::Validation(format!(
					"line {} has a negative unit price",
					line.menu_item_id
				)));
			}
		}
		if self.delivery_fee < Decimal::ZERO || self.tax_amount < Decimal::ZERO {
			return Err(SubmitError::Validation(
				"fees must not be negative".into(),
			));
		}
		Ok(())
	}
}

/// Materializes checkout requests into persisted orders.
pub struct SubmissionService {
	store: Arc<DataStoreService>,
	queries: Arc<OrderQueryService>,
	events: broadcast::Sender<OrderEvent>,
}

impl SubmissionService {
	pub fn new(
		store: Arc<DataStoreService>,
		queries: Arc<OrderQueryService>,
		events: broadcast::Sender<OrderEvent>,
	) -> Self {
		Self {
			store,
			queries,
			events,
		}
	}

	/// Places an order.
	///
	/// On success the returned view (order, counter-party summaries, lines)
	/// is re-fetched from the store rather than assembled from the insert
	/// responses. The guarantee on failure is: either the order row no
	/// longer exists, or the error names it as orphaned.
	pub async fn submit(&self, request: CheckoutRequest) -> Result<OrderView, SubmitError> {
		request.validate()?;

		let totals = OrderTotals::compute(
			request
				.lines
				.iter()
				.map(|line| (line.unit_price, line.quantity)),
			request.delivery_fee,
			request.tax_amount,
		);

		let order = self
			.store
			.insert_order(&NewOrder {
				customer_id: request.customer_id.clone(),
				vendor_id: request.vendor_id.clone(),
				status: OrderStatus::Pending,
				subtotal: totals.subtotal,
				delivery_fee: totals.delivery_fee,
				tax_amount: totals.tax_amount,
				total_amount: totals.total_amount,
				payment_method: request.payment_method.clone(),
				special_instructions: request.special_instructions.clone(),
			})
			.await
			.map_err(SubmitError::Persistence)?;

		tracing::debug!(order_id = %order.id, order_number = %order.order_number, "Order row created");

		let line_rows: Vec<NewOrderLine> = request
			.lines
			.iter()
			.map(|line| NewOrderLine {
				order_id: order.id.clone(),
				menu_item_id: line.menu_item_id.clone(),
				item_name: line.item_name.clone(),
				quantity: line.quantity,
				unit_price: line.unit_price,
				total_price: money::line_total(line.unit_price, line.quantity),
				special_instructions: line.special_instructions.clone(),
			})
			.collect();

		if let Err(line_err) = self.store.insert_order_lines(&line_rows).await {
			return Err(self.compensate(order.id, line_err).await);
		}

		tracing::info!(
			order_id = %order.id,
			order_number = %order.order_number,
			total = %money::format_price(order.total_amount),
			"Order placed"
		);
		let _ = self.events.send(OrderEvent::Placed {
			order_id: order.id.clone(),
			order_number: order.order_number.clone(),
			customer_id: order.customer_id.clone(),
			vendor_id: order.vendor_id.clone(),
			total_amount: order.total_amount,
			at: Utc::now(),
		});

		match self.queries.order_detail(&order.id).await {
			Ok(view) => Ok(view),
			// The order exists; a failed display fetch must not fail the
			// submission. Return the row we hold, unenriched.
			Err(QueryError::OrderNotFound(_)) | Err(QueryError::Store(_)) => Ok(OrderView {
				order,
				vendor: None,
				customer: None,
				lines: Vec::new(),
			}),
		}
	}

	/// Undoes an order whose line insert failed. Distinguishes the
	/// compensated case from the orphan case in both logs and the error.
	async fn compensate(&self, order_id: String, line_err: StoreError) -> SubmitError {
		match self.store.delete_order(&order_id).await {
			Ok(()) => {
				tracing::warn!(
					order_id = %order_id,
					error = %line_err,
					"Order line insert failed; compensating delete removed the order"
				);
				let _ = self.events.send(OrderEvent::SubmissionRolledBack {
					order_id,
					reason: line_err.to_string(),
					at: Utc::now(),
				});
				SubmitError::Persistence(line_err)
			},
			Err(delete_err) => {
				tracing::error!(
					order_id = %order_id,
					line_error = %line_err,
					delete_error = %delete_err,
					"Compensating delete failed; order row orphaned, needs reconciliation"
				);
				let _ = self.events.send(OrderEvent::OrphanDetected {
					order_id: order_id.clone(),
					reason: delete_err.to_string(),
					at: Utc::now(),
				});
				SubmitError::Orphaned {
					order_id,
					source: line_err,
				}
			},
		}
	}
}
