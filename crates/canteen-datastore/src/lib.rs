//! Typed client interface for the hosted relational data store.
//!
//! The hosted store owns durability, querying, and row-level authorization;
//! this crate only defines the operations the ordering core needs and maps
//! store failures into a stable error taxonomy. Backends are pluggable: an
//! in-memory implementation for tests and a REST implementation speaking the
//! store's generated HTTP API.

use async_trait::async_trait;
use canteen_types::{
	ConfigSchema, CustomerSummary, NewOrder, NewOrderLine, Order, OrderFilter, OrderLine,
	OrderStatus, VendorSummary,
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod rest;
}

/// Errors that can occur against the hosted data store.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The requested row does not exist (or is invisible to the caller).
	#[error("Not found")]
	NotFound,
	/// A compare-and-swap update found the row already changed.
	#[error("Concurrent update lost: row changed since it was read")]
	Conflict,
	/// The store's authorization layer denied the operation.
	#[error("Policy denied: {0}")]
	PolicyDenied(String),
	/// The store rejected the write (constraint or schema violation).
	#[error("Constraint violation: {0}")]
	Constraint(String),
	/// The store was unreachable or the transport failed.
	#[error("Network error: {0}")]
	Network(String),
	/// The call exceeded the configured deadline. Retryable.
	#[error("Timed out after {0:?}")]
	Timeout(Duration),
	/// A row could not be encoded or decoded.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Backend configuration was invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl StoreError {
	/// True for failures worth retrying as-is (transient transport issues).
	pub fn is_retryable(&self) -> bool {
		matches!(self, StoreError::Network(_) | StoreError::Timeout(_))
	}
}

/// Operations the ordering core performs against the hosted store.
///
/// Inserts return the stored row so store-assigned fields (id, order number,
/// timestamps) are available without a second fetch. The status update is a
/// compare-and-swap keyed on the status and `updated_at` the caller read.
#[async_trait]
pub trait DataStoreInterface: Send + Sync {
	/// Inserts one order row and returns it with assigned fields.
	async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError>;

	/// Inserts a batch of order lines in one call.
	async fn insert_order_lines(
		&self,
		lines: &[NewOrderLine],
	) -> Result<Vec<OrderLine>, StoreError>;

	/// Deletes an order and, by composition, its lines. Used only as the
	/// compensating action for a failed line insert.
	async fn delete_order(&self, order_id: &str) -> Result<(), StoreError>;

	/// Fetches one order row by id.
	async fn fetch_order(&self, order_id: &str) -> Result<Order, StoreError>;

	/// Fetches flat order rows for one party, newest first, paginated.
	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

	/// Fetches all lines for the given order ids in one batched call.
	async fn fetch_order_lines(&self, order_ids: &[String]) -> Result<Vec<OrderLine>, StoreError>;

	/// Fetches vendor summary rows for the given ids in one batched call.
	async fn fetch_vendor_summaries(
		&self,
		vendor_ids: &[String],
	) -> Result<Vec<VendorSummary>, StoreError>;

	/// Fetches customer summary rows for the given ids in one batched call.
	async fn fetch_customer_summaries(
		&self,
		customer_ids: &[String],
	) -> Result<Vec<CustomerSummary>, StoreError>;

	/// Applies a status change only if the row still carries `expected`
	/// status and the `expected_updated_at` token; otherwise fails with
	/// [`StoreError::Conflict`].
	async fn update_order_status(
		&self,
		order_id: &str,
		expected: OrderStatus,
		expected_updated_at: DateTime<Utc>,
		next: OrderStatus,
		cancellation_reason: Option<&str>,
	) -> Result<Order, StoreError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Factory signature all data store implementations provide.
pub type DataStoreFactory = fn(&toml::Value) -> Result<Box<dyn DataStoreInterface>, StoreError>;

/// Get all registered data store implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, DataStoreFactory)> {
	use implementations::{memory, rest};

	vec![
		("memory", memory::create_store),
		("rest", rest::create_store),
	]
}

/// Data store service applying a bounded deadline to every call.
///
/// Every operation is an await point against the network; the service wraps
/// each one in a timeout so a stalled store surfaces as a retryable
/// [`StoreError::Timeout`] instead of hanging the caller.
pub struct DataStoreService {
	backend: Box<dyn DataStoreInterface>,
	deadline: Duration,
}

impl DataStoreService {
	/// Creates a service over the given backend with a per-call deadline.
	pub fn new(backend: Box<dyn DataStoreInterface>, deadline: Duration) -> Self {
		Self { backend, deadline }
	}

	async fn bounded<T>(
		&self,
		fut: impl std::future::Future<Output = Result<T, StoreError>>,
	) -> Result<T, StoreError> {
		tokio::time::timeout(self.deadline, fut)
			.await
			.map_err(|_| StoreError::Timeout(self.deadline))?
	}

	pub async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
		self.bounded(self.backend.insert_order(new)).await
	}

	pub async fn insert_order_lines(
		&self,
		lines: &[NewOrderLine],
	) -> Result<Vec<OrderLine>, StoreError> {
		self.bounded(self.backend.insert_order_lines(lines)).await
	}

	pub async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
		self.bounded(self.backend.delete_order(order_id)).await
	}

	pub async fn fetch_order(&self, order_id: &str) -> Result<Order, StoreError> {
		self.bounded(self.backend.fetch_order(order_id)).await
	}

	pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
		self.bounded(self.backend.list_orders(filter)).await
	}

	pub async fn fetch_order_lines(
		&self,
		order_ids: &[String],
	) -> Result<Vec<OrderLine>, StoreError> {
		self.bounded(self.backend.fetch_order_lines(order_ids)).await
	}

	pub async fn fetch_vendor_summaries(
		&self,
		vendor_ids: &[String],
	) -> Result<Vec<VendorSummary>, StoreError> {
		self.bounded(self.backend.fetch_vendor_summaries(vendor_ids))
			.await
	}

	pub async fn fetch_customer_summaries(
		&self,
		customer_ids: &[String],
	) -> Result<Vec<CustomerSummary>, StoreError> {
		self.bounded(self.backend.fetch_customer_summaries(customer_ids))
			.await
	}

	pub async fn update_order_status(
		&self,
		order_id: &str,
		expected: OrderStatus,
		expected_updated_at: DateTime<Utc>,
		next: OrderStatus,
		cancellation_reason: Option<&str>,
	) -> Result<Order, StoreError> {
		self.bounded(self.backend.update_order_status(
			order_id,
			expected,
			expected_updated_at,
			next,
			cancellation_reason,
		))
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStore;

	/// Wraps a backend and stalls one operation past any deadline.
	struct StalledStore(MemoryStore);

	#[async_trait]
	impl DataStoreInterface for StalledStore {
		async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
			self.0.insert_order(new).await
		}
		async fn insert_order_lines(
			&self,
			lines: &[NewOrderLine],
		) -> Result<Vec<OrderLine>, StoreError> {
			self.0.insert_order_lines(lines).await
		}
		async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
			self.0.delete_order(order_id).await
		}
		async fn fetch_order(&self, order_id: &str) -> Result<Order, StoreError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			self.0.fetch_order(order_id).await
		}
		async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
			self.0.list_orders(filter).await
		}
		async fn fetch_order_lines(
			&self,
			order_ids: &[String],
		) -> Result<Vec<OrderLine>, StoreError> {
			self.0.fetch_order_lines(order_ids).await
		}
		async fn fetch_vendor_summaries(
			&self,
			vendor_ids: &[String],
		) -> Result<Vec<VendorSummary>, StoreError> {
			self.0.fetch_vendor_summaries(vendor_ids).await
		}
		async fn fetch_customer_summaries(
			&self,
			customer_ids: &[String],
		) -> Result<Vec<CustomerSummary>, StoreError> {
			self.0.fetch_customer_summaries(customer_ids).await
		}
		async fn update_order_status(
			&self,
			order_id: &str,
			expected: OrderStatus,
			expected_updated_at: DateTime<Utc>,
			next: OrderStatus,
			cancellation_reason: Option<&str>,
		) -> Result<Order, StoreError> {
			self.0
				.update_order_status(
					order_id,
					expected,
					expected_updated_at,
					next,
					cancellation_reason,
				)
				.await
		}
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.0.config_schema()
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_stalled_call_surfaces_retryable_timeout() {
		let service = DataStoreService::new(
			Box::new(StalledStore(MemoryStore::new())),
			Duration::from_secs(2),
		);

		let result = service.fetch_order("o1").await;
		match result {
			Err(err @ StoreError::Timeout(_)) => assert!(err.is_retryable()),
			other => panic!("expected timeout, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_fast_call_passes_through() {
		let service = DataStoreService::new(
			Box::new(StalledStore(MemoryStore::new())),
			Duration::from_secs(2),
		);

		// Only fetch_order stalls; other calls complete inside the deadline
		let listed = service
			.list_orders(&OrderFilter::for_party(canteen_types::Party::Customer(
				"c1".to_string(),
			)))
			.await
			.unwrap();
		assert!(listed.is_empty());
	}
}
