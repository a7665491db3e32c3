//! In-memory data store backend.
//!
//! Holds all tables in process memory, useful for tests and development.
//! Besides the plain table operations it offers seeding helpers and fault
//! switches so callers can exercise partial-failure paths (a line insert
//! rejected after the order landed, a policy denial on a summary fetch)
//! that the real store only produces under contention or misconfiguration.

use crate::{DataStoreInterface, StoreError};
use async_trait::async_trait;
use canteen_types::{
	ConfigSchema, CustomerSummary, NewOrder, NewOrderLine, Order, OrderFilter, OrderLine,
	OrderStatus, Party, Schema, ValidationError, VendorSummary,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
	orders: HashMap<String, Order>,
	order_lines: Vec<OrderLine>,
	vendors: HashMap<String, VendorSummary>,
	customers: HashMap<String, CustomerSummary>,
	order_seq: u64,
}

/// Fault switches for exercising failure paths in tests.
#[derive(Debug, Default, Clone)]
pub struct Faults {
	/// Reject the next order insert with a constraint violation.
	pub reject_order_insert: bool,
	/// Fail order line inserts with a network error.
	pub fail_line_inserts: bool,
	/// Fail order deletes with a network error.
	pub fail_order_deletes: bool,
	/// Deny order line fetches as if row-level policy hid the rows.
	pub deny_order_lines: bool,
	/// Deny vendor summary fetches.
	pub deny_vendor_summaries: bool,
	/// Deny customer summary fetches.
	pub deny_customer_summaries: bool,
}

/// In-memory data store implementation.
///
/// Clones share the same tables, so a test can keep one handle for seeding
/// and fault injection while another is boxed into the service under test.
#[derive(Clone)]
pub struct MemoryStore {
	tables: Arc<RwLock<Tables>>,
	faults: Arc<RwLock<Faults>>,
}

impl MemoryStore {
	/// Creates an empty MemoryStore.
	pub fn new() -> Self {
		Self {
			tables: Arc::new(RwLock::new(Tables::default())),
			faults: Arc::new(RwLock::new(Faults::default())),
		}
	}

	/// Replaces the active fault switches.
	pub async fn set_faults(&self, faults: Faults) {
		*self.faults.write().await = faults;
	}

	/// Seeds a vendor summary row.
	pub async fn seed_vendor(&self, vendor: VendorSummary) {
		let mut tables = self.tables.write().await;
		tables.vendors.insert(vendor.id.clone(), vendor);
	}

	/// Seeds a customer summary row.
	pub async fn seed_customer(&self, customer: CustomerSummary) {
		let mut tables = self.tables.write().await;
		tables.customers.insert(customer.id.clone(), customer);
	}

	/// Number of order rows currently stored.
	pub async fn order_count(&self) -> usize {
		self.tables.read().await.orders.len()
	}

	/// Number of line rows currently stored.
	pub async fn line_count(&self) -> usize {
		self.tables.read().await.order_lines.len()
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl DataStoreInterface for MemoryStore {
	async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
		if self.faults.read().await.reject_order_insert {
			return Err(StoreError::Constraint("order insert rejected".into()));
		}

		let mut tables = self.tables.write().await;
		tables.order_seq += 1;
		let now = Utc::now();
		let order = Order {
			id: Uuid::new_v4().to_string(),
			order_number: format!("ORD-{:06}", tables.order_seq),
			customer_id: new.customer_id.clone(),
			vendor_id: new.vendor_id.clone(),
			status: new.status,
			subtotal: new.subtotal,
			delivery_fee: new.delivery_fee,
			tax_amount: new.tax_amount,
			total_amount: new.total_amount,
			payment_method: new.payment_method.clone(),
			special_instructions: new.special_instructions.clone(),
			cancellation_reason: None,
			created_at: now,
			updated_at: now,
		};
		tables.orders.insert(order.id.clone(), order.clone());
		Ok(order)
	}

	async fn insert_order_lines(
		&self,
		lines: &[NewOrderLine],
	) -> Result<Vec<OrderLine>, StoreError> {
		if self.faults.read().await.fail_line_inserts {
			return Err(StoreError::Network("line insert failed".into()));
		}

		let mut tables = self.tables.write().await;
		for line in lines {
			if !tables.orders.contains_key(&line.order_id) {
				return Err(StoreError::Constraint(format!(
					"order {} does not exist",
					line.order_id
				)));
			}
		}
		let mut inserted = Vec::with_capacity(lines.len());
		for line in lines {
			let row = OrderLine {
				id: Uuid::new_v4().to_string(),
				order_id: line.order_id.clone(),
				menu_item_id: line.menu_item_id.clone(),
				item_name: line.item_name.clone(),
				quantity: line.quantity,
				unit_price: line.unit_price,
				total_price: line.total_price,
				special_instructions: line.special_instructions.clone(),
			};
			tables.order_lines.push(row.clone());
			inserted.push(row);
		}
		Ok(inserted)
	}

	async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
		if self.faults.read().await.fail_order_deletes {
			return Err(StoreError::Network("order delete failed".into()));
		}

		let mut tables = self.tables.write().await;
		tables.orders.remove(order_id);
		// Lines are owned by the order; deleting it deletes them
		tables.order_lines.retain(|line| line.order_id != order_id);
		Ok(())
	}

	async fn fetch_order(&self, order_id: &str) -> Result<Order, StoreError> {
		let tables = self.tables.read().await;
		tables
			.orders
			.get(order_id)
			.cloned()
			.ok_or(StoreError::NotFound)
	}

	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
		let tables = self.tables.read().await;
		let mut orders: Vec<Order> = tables
			.orders
			.values()
			.filter(|order| match &filter.party {
				Party::Customer(id) => order.customer_id == *id,
				Party::Vendor(id) => order.vendor_id == *id,
			})
			.filter(|order| filter.status.map_or(true, |s| order.status == s))
			.filter(|order| filter.since.map_or(true, |since| order.created_at >= since))
			.cloned()
			.collect();
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders
			.into_iter()
			.skip(filter.offset())
			.take(filter.limit)
			.collect())
	}

	async fn fetch_order_lines(&self, order_ids: &[String]) -> Result<Vec<OrderLine>, StoreError> {
		if self.faults.read().await.deny_order_lines {
			return Err(StoreError::PolicyDenied("order_lines".into()));
		}

		let tables = self.tables.read().await;
		Ok(tables
			.order_lines
			.iter()
			.filter(|line| order_ids.contains(&line.order_id))
			.cloned()
			.collect())
	}

	async fn fetch_vendor_summaries(
		&self,
		vendor_ids: &[String],
	) -> Result<Vec<VendorSummary>, StoreError> {
		if self.faults.read().await.deny_vendor_summaries {
			return Err(StoreError::PolicyDenied("vendor_profiles".into()));
		}

		let tables = self.tables.read().await;
		Ok(vendor_ids
			.iter()
			.filter_map(|id| tables.vendors.get(id).cloned())
			.collect())
	}

	async fn fetch_customer_summaries(
		&self,
		customer_ids: &[String],
	) -> Result<Vec<CustomerSummary>, StoreError> {
		if self.faults.read().await.deny_customer_summaries {
			return Err(StoreError::PolicyDenied("users".into()));
		}

		let tables = self.tables.read().await;
		Ok(customer_ids
			.iter()
			.filter_map(|id| tables.customers.get(id).cloned())
			.collect())
	}

	async fn update_order_status(
		&self,
		order_id: &str,
		expected: OrderStatus,
		expected_updated_at: DateTime<Utc>,
		next: OrderStatus,
		cancellation_reason: Option<&str>,
	) -> Result<Order, StoreError> {
		let mut tables = self.tables.write().await;
		let order = tables.orders.get_mut(order_id).ok_or(StoreError::NotFound)?;

		if order.status != expected || order.updated_at != expected_updated_at {
			return Err(StoreError::Conflict);
		}

		order.status = next;
		order.updated_at = Utc::now();
		if let Some(reason) = cancellation_reason {
			order.cancellation_reason = Some(reason.to_string());
		}
		Ok(order.clone())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStoreSchema)
	}
}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory store has no required configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory data store from configuration.
pub fn create_store(_config: &toml::Value) -> Result<Box<dyn DataStoreInterface>, StoreError> {
	Ok(Box::new(MemoryStore::new()))
}
