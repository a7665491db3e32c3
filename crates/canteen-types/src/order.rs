//! Order types: statuses, rows, insert payloads, and enriched views.
//!
//! An order owns its line items (deleting the order deletes the lines) and
//! references exactly one vendor and one customer. Line unit prices are
//! point-in-time snapshots captured at order time and never re-read from the
//! live menu.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Party;

/// Status of an order in its lifecycle.
///
/// Vendors advance an order one step at a time along the forward sequence
/// `pending → confirmed → preparing → ready → out_for_delivery → delivered`;
/// customers may cancel only while the order is `pending` or `confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order placed, awaiting vendor confirmation.
	Pending,
	/// Vendor has accepted the order.
	Confirmed,
	/// Vendor is preparing the order.
	Preparing,
	/// Order is ready for pickup or dispatch.
	Ready,
	/// Order has left the vendor.
	OutForDelivery,
	/// Order delivered; terminal.
	Delivered,
	/// Order cancelled by the customer; terminal.
	Cancelled,
}

impl OrderStatus {
	/// The next status in the forward sequence, or `None` from a state with
	/// no vendor-advance successor.
	pub fn next(&self) -> Option<OrderStatus> {
		match self {
			OrderStatus::Pending => Some(OrderStatus::Confirmed),
			OrderStatus::Confirmed => Some(OrderStatus::Preparing),
			OrderStatus::Preparing => Some(OrderStatus::Ready),
			OrderStatus::Ready => Some(OrderStatus::OutForDelivery),
			OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
			OrderStatus::Delivered | OrderStatus::Cancelled => None,
		}
	}

	/// True for states no operation may transition out of.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}

	/// True while a customer cancellation is still legal.
	pub fn cancellable(&self) -> bool {
		matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
	}

	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Preparing => "preparing",
			OrderStatus::Ready => "ready",
			OrderStatus::OutForDelivery => "out_for_delivery",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Returns an iterator over all status variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Confirmed,
			Self::Preparing,
			Self::Ready,
			Self::OutForDelivery,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|status| status.as_str() == s).ok_or(())
	}
}

/// A persisted order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier, assigned by the store.
	pub id: String,
	/// Human-readable order number, assigned by the store.
	pub order_number: String,
	/// Customer who placed the order.
	pub customer_id: String,
	/// Vendor fulfilling the order.
	pub vendor_id: String,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Sum of line totals, computed at submission time.
	pub subtotal: Decimal,
	pub delivery_fee: Decimal,
	pub tax_amount: Decimal,
	/// Always `subtotal + delivery_fee + tax_amount`.
	pub total_amount: Decimal,
	pub payment_method: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
	/// Populated only when `status` is `cancelled`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cancellation_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	/// Doubles as the optimistic-concurrency token for status writes.
	pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new order. Identifier, order number, and timestamps
/// are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
	pub customer_id: String,
	pub vendor_id: String,
	pub status: OrderStatus,
	pub subtotal: Decimal,
	pub delivery_fee: Decimal,
	pub tax_amount: Decimal,
	pub total_amount: Decimal,
	pub payment_method: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
}

/// A persisted order line row.
///
/// `unit_price` and `item_name` are snapshots captured when the order was
/// placed; menu edits after that point must not affect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
	pub id: String,
	pub order_id: String,
	pub menu_item_id: String,
	pub item_name: String,
	pub quantity: u32,
	pub unit_price: Decimal,
	/// Always `unit_price * quantity`.
	pub total_price: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
}

/// Insert payload for one order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
	pub order_id: String,
	pub menu_item_id: String,
	pub item_name: String,
	pub quantity: u32,
	pub unit_price: Decimal,
	pub total_price: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
}

/// Vendor fields exposed to customers on order listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorSummary {
	pub id: String,
	pub business_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logo_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub business_phone: Option<String>,
}

/// Customer fields exposed to vendors on order listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
	pub id: String,
	pub full_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
}

/// An order enriched with its related rows for display.
///
/// Counter-party and line data degrade independently: a denied sub-query
/// yields `None` / an empty list here rather than failing the whole fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
	pub order: Order,
	pub vendor: Option<VendorSummary>,
	pub customer: Option<CustomerSummary>,
	pub lines: Vec<OrderLine>,
}

/// Filter for order list queries.
#[derive(Debug, Clone)]
pub struct OrderFilter {
	/// Whose orders to fetch: a customer's or a vendor's.
	pub party: Party,
	/// Restrict to one status, if set.
	pub status: Option<OrderStatus>,
	/// Restrict to orders created at or after this instant, if set.
	pub since: Option<DateTime<Utc>>,
	/// Maximum rows per page.
	pub limit: usize,
	/// 1-based page for range pagination.
	pub page: usize,
}

impl OrderFilter {
	/// Filter for one party's orders with the default page size.
	pub fn for_party(party: Party) -> Self {
		Self {
			party,
			status: None,
			since: None,
			limit: 20,
			page: 1,
		}
	}

	pub fn with_status(mut self, status: OrderStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
		self.since = Some(since);
		self
	}

	pub fn with_page(mut self, page: usize, limit: usize) -> Self {
		self.page = page.max(1);
		self.limit = limit;
		self
	}

	/// Zero-based row offset for this page.
	pub fn offset(&self) -> usize {
		(self.page - 1) * self.limit
	}
}
