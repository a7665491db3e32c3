//! Caller identity for order mutations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The party attempting an order operation.
///
/// Status advances are a vendor operation; cancellation is a customer
/// operation. An operation attempted by the wrong party fails with an
/// authorization error, not a state error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Party {
	Customer(String),
	Vendor(String),
}

impl Party {
	/// The underlying principal identifier.
	pub fn id(&self) -> &str {
		match self {
			Party::Customer(id) | Party::Vendor(id) => id,
		}
	}
}

impl fmt::Display for Party {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Party::Customer(id) => write!(f, "customer:{}", id),
			Party::Vendor(id) => write!(f, "vendor:{}", id),
		}
	}
}
