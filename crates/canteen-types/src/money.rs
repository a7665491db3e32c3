//! Money utilities for the ordering core.
//!
//! All currency amounts are `rust_decimal::Decimal` values held to two
//! decimal places. Totals are always recomputed here from unit prices and
//! quantities; caller-supplied aggregates are never trusted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency symbol used for display formatting.
pub const CURRENCY_SYMBOL: &str = "₵";

/// Computes the total for one line: unit price times quantity, at 2dp.
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
	(unit_price * Decimal::from(quantity)).round_dp(2)
}

/// Formats an amount for display, e.g. `₵12.50`.
pub fn format_price(amount: Decimal) -> String {
	format!("{}{:.2}", CURRENCY_SYMBOL, amount.round_dp(2))
}

/// Monetary breakdown of an order.
///
/// The invariant `total_amount = subtotal + delivery_fee + tax_amount` holds
/// by construction: the only way to build one is [`OrderTotals::compute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
	pub subtotal: Decimal,
	pub delivery_fee: Decimal,
	pub tax_amount: Decimal,
	pub total_amount: Decimal,
}

impl OrderTotals {
	/// Computes order totals from `(unit_price, quantity)` pairs and fees.
	pub fn compute(
		lines: impl IntoIterator<Item = (Decimal, u32)>,
		delivery_fee: Decimal,
		tax_amount: Decimal,
	) -> Self {
		let subtotal: Decimal = lines
			.into_iter()
			.map(|(price, qty)| line_total(price, qty))
			.sum();
		let subtotal = subtotal.round_dp(2);
		let delivery_fee = delivery_fee.round_dp(2);
		let tax_amount = tax_amount.round_dp(2);
		Self {
			subtotal,
			delivery_fee,
			tax_amount,
			total_amount: (subtotal + delivery_fee + tax_amount).round_dp(2),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	fn dec(s: &str) -> Decimal {
		Decimal::from_str(s).unwrap()
	}

	#[test]
	fn test_line_total() {
		assert_eq!(line_total(dec("10.00"), 2), dec("20.00"));
		assert_eq!(line_total(dec("3.33"), 3), dec("9.99"));
	}

	#[test]
	fn test_totals_invariant() {
		let totals = OrderTotals::compute(
			vec![(dec("10.00"), 2), (dec("5.00"), 1)],
			dec("2.00"),
			Decimal::ZERO,
		);
		assert_eq!(totals.subtotal, dec("25.00"));
		assert_eq!(totals.total_amount, dec("27.00"));
		assert_eq!(
			totals.total_amount,
			totals.subtotal + totals.delivery_fee + totals.tax_amount
		);
	}

	#[test]
	fn test_format_price() {
		assert_eq!(format_price(dec("12.5")), "₵12.50");
		assert_eq!(format_price(Decimal::ZERO), "₵0.00");
	}
}
