//! Cart types: line items and the persisted cart snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A vendor reference held by the cart while it is locked to one vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRef {
	/// Vendor identifier.
	pub id: String,
	/// Display name, carried for the UI only.
	pub name: String,
}

/// One item line inside the cart.
///
/// A line with quantity zero must not exist; removal is modeled as deletion,
/// not zero-quantity retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
	/// Menu item identifier.
	pub menu_item_id: String,
	/// Vendor this item belongs to.
	pub vendor_id: String,
	/// Display name snapshot.
	pub name: String,
	/// Unit price at the time the item was added.
	pub unit_price: Decimal,
	/// Quantity, always greater than zero.
	pub quantity: u32,
	/// Optional image reference.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image_url: Option<String>,
}

/// The full cart state as persisted to local storage.
///
/// All lines in a non-empty snapshot share the same vendor identifier as
/// `vendor`. The single-vendor invariant is enforced by the cart service,
/// never by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
	/// Current line items, in insertion order.
	pub lines: Vec<CartLine>,
	/// The vendor the cart is locked to, if non-empty.
	pub vendor: Option<VendorRef>,
}

impl CartSnapshot {
	/// Sum of `unit_price * quantity` over all lines.
	pub fn total_price(&self) -> Decimal {
		self.lines
			.iter()
			.map(|line| crate::money::line_total(line.unit_price, line.quantity))
			.sum::<Decimal>()
			.round_dp(2)
	}

	/// Sum of quantities over all lines.
	pub fn total_items(&self) -> u32 {
		self.lines.iter().map(|line| line.quantity).sum()
	}

	/// True when the cart holds no lines.
	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}
}
