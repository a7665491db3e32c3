//! Order query and enrichment layer.
//!
//! The hosted store's nested-relationship selects interact unpredictably
//! with its row-level policies, so orders are fetched flat and stitched
//! together in-process: one batched call per related table instead of a
//! joined query or an N+1 loop.
//!
//! Enrichment degrades gracefully. If a summary or line sub-query is denied
//! or fails, the affected orders come back with no counter-party or an
//! empty line list and a warning is logged; one denied sub-query must not
//! take down the whole listing.

use canteen_datastore::{DataStoreService, StoreError};
use canteen_types::{
	CustomerSummary, Order, OrderFilter, OrderLine, OrderStatus, OrderView, Party, VendorSummary,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order queries.
#[derive(Debug, Error)]
pub enum QueryError {
	/// The requested order does not exist (or is invisible to the caller).
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The flat order fetch itself failed; nothing to degrade to.
	#[error("Store error: {0}")]
	Store(StoreError),
}

/// Options for order list queries.
#[derive(Debug, Clone)]
pub struct ListOptions {
	pub status: Option<OrderStatus>,
	/// 1-based page.
	pub page: usize,
	pub limit: usize,
}

impl Default for ListOptions {
	fn default() -> Self {
		Self {
			status: None,
			page: 1,
			limit: 20,
		}
	}
}

/// Aggregates computed over a vendor's recent orders.
#[derive(Debug, Clone)]
pub struct VendorAnalytics {
	pub total_orders: usize,
	pub total_revenue: Decimal,
	pub avg_order_value: Decimal,
	pub unique_customers: usize,
	pub status_breakdown: HashMap<OrderStatus, usize>,
	/// The most recent orders, newest first.
	pub recent_orders: Vec<Order>,
}

/// How many orders the analytics fold reads at most.
const ANALYTICS_FETCH_LIMIT: usize = 500;
/// How many recent orders the analytics summary carries.
const ANALYTICS_RECENT: usize = 5;

/// Which related summary rows an enrichment pass should attach.
enum CounterParty {
	Vendor,
	Customer,
	Both,
}

/// Staged order fetching and in-process enrichment.
pub struct OrderQueryService {
	store: Arc<DataStoreService>,
}

impl OrderQueryService {
	pub fn new(store: Arc<DataStoreService>) -> Self {
		Self { store }
	}

	/// A customer's orders, newest first, enriched with vendor summaries
	/// and line items.
	pub async fn orders_for_customer(
		&self,
		customer_id: &str,
		opts: ListOptions,
	) -> Result<Vec<OrderView>, QueryError> {
		let filter = self.filter(Party::Customer(customer_id.to_string()), &opts);
		let orders = self
			.store
			.list_orders(&filter)
			.await
			.map_err(QueryError::Store)?;
		Ok(self.enrich(orders, CounterParty::Vendor).await)
	}

	/// A vendor's incoming orders, newest first, enriched with customer
	/// summaries and line items.
	pub async fn orders_for_vendor(
		&self,
		vendor_id: &str,
		opts: ListOptions,
	) -> Result<Vec<OrderView>, QueryError> {
		let filter = self.filter(Party::Vendor(vendor_id.to_string()), &opts);
		let orders = self
			.store
			.list_orders(&filter)
			.await
			.map_err(QueryError::Store)?;
		Ok(self.enrich(orders, CounterParty::Customer).await)
	}

	/// One order with both counter-party summaries and its lines.
	pub async fn order_detail(&self, order_id: &str) -> Result<OrderView, QueryError> {
		let order = self.store.fetch_order(order_id).await.map_err(|e| match e {
			StoreError::NotFound => QueryError::OrderNotFound(order_id.to_string()),
			other => QueryError::Store(other),
		})?;

		// enrich yields one view per input order
		self.enrich(vec![order], CounterParty::Both)
			.await
			.pop()
			.ok_or_else(|| QueryError::OrderNotFound(order_id.to_string()))
	}

	/// Dashboard aggregates over a vendor's orders created at or after
	/// `since`. Pure folds over one fetched list; no extra round trips.
	pub async fn vendor_analytics(
		&self,
		vendor_id: &str,
		since: DateTime<Utc>,
	) -> Result<VendorAnalytics, QueryError> {
		let filter = OrderFilter::for_party(Party::Vendor(vendor_id.to_string()))
			.with_since(since)
			.with_page(1, ANALYTICS_FETCH_LIMIT);
		let orders = self
			.store
			.list_orders(&filter)
			.await
			.map_err(QueryError::Store)?;

		let total_orders = orders.len();
		let total_revenue: Decimal = orders.iter().map(|o| o.total_amount).sum();
		let avg_order_value = if total_orders > 0 {
			(total_revenue / Decimal::from(total_orders as u64)).round_dp(2)
		} else {
			Decimal::ZERO
		};
		let unique_customers = orders
			.iter()
			.map(|o| o.customer_id.as_str())
			.collect::<HashSet<_>>()
			.len();
		let mut status_breakdown: HashMap<OrderStatus, usize> = HashMap::new();
		for order in &orders {
			*status_breakdown.entry(order.status).or_default() += 1;
		}

		Ok(VendorAnalytics {
			total_orders,
			total_revenue: total_revenue.round_dp(2),
			avg_order_value,
			unique_customers,
			status_breakdown,
			recent_orders: orders.into_iter().take(ANALYTICS_RECENT).collect(),
		})
	}

	fn filter(&self, party: Party, opts: &ListOptions) -> OrderFilter {
		let mut filter = OrderFilter::for_party(party).with_page(opts.page, opts.limit);
		if let Some(status) = opts.status {
			filter = filter.with_status(status);
		}
		filter
	}

	/// Stages 2-5: collect related ids, fetch each related table in one
	/// batched call, and merge by primary key. Sub-query failures degrade
	/// to missing summaries / empty lines for the affected orders.
	async fn enrich(&self, orders: Vec<Order>, counter_party: CounterParty) -> Vec<OrderView> {
		if orders.is_empty() {
			return Vec::new();
		}

		let vendors = match counter_party {
			CounterParty::Vendor | CounterParty::Both => {
				let ids = distinct(orders.iter().map(|o| o.vendor_id.clone()));
				self.vendor_map(&ids).await
			},
			CounterParty::Customer => HashMap::new(),
		};
		let customers = match counter_party {
			CounterParty::Customer | CounterParty::Both => {
				let ids = distinct(orders.iter().map(|o| o.customer_id.clone()));
				self.customer_map(&ids).await
			},
			CounterParty::Vendor => HashMap::new(),
		};

		let order_ids: Vec<String> = orders.iter().map(|o| o.id.clone()).collect();
		let mut lines_by_order = self.lines_map(&order_ids).await;

		orders
			.into_iter()
			.map(|order| {
				let vendor = vendors.get(&order.vendor_id).cloned();
				let customer = customers.get(&order.customer_id).cloned();
				let lines = lines_by_order.remove(&order.id).unwrap_or_default();
				OrderView {
					order,
					vendor,
					customer,
					lines,
				}
			})
			.collect()
	}

	async fn vendor_map(&self, ids: &[String]) -> HashMap<String, VendorSummary> {
		match self.store.fetch_vendor_summaries(ids).await {
			Ok(rows) => rows.into_iter().map(|v| (v.id.clone(), v)).collect(),
			Err(e) => {
				tracing::warn!(error = %e, "Vendor summary fetch failed; orders returned without vendor info");
				HashMap::new()
			},
		}
	}

	async fn customer_map(&self, ids: &[String]) -> HashMap<String, CustomerSummary> {
		match self.store.fetch_customer_summaries(ids).await {
			Ok(rows) => rows.into_iter().map(|c| (c.id.clone(), c)).collect(),
			Err(e) => {
				tracing::warn!(error = %e, "Customer summary fetch failed; orders returned without customer info");
				HashMap::new()
			},
		}
	}

	async fn lines_map(&self, order_ids: &[String]) -> HashMap<String, Vec<OrderLine>> {
		match self.store.fetch_order_lines(order_ids).await {
			Ok(rows) => {
				let mut by_order: HashMap<String, Vec<OrderLine>> = HashMap::new();
				for line in rows {
					by_order.entry(line.order_id.clone()).or_default().push(line);
				}
				by_order
			},
			Err(e) => {
				tracing::warn!(error = %e, "Order line fetch failed; orders returned with empty line lists");
				HashMap::new()
			},
		}
	}
}

fn distinct(ids: impl Iterator<Item = String>) -> Vec<String> {
	let mut seen = HashSet::new();
	ids.filter(|id| seen.insert(id.clone())).collect()
}
