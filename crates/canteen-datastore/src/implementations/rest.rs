//! REST data store backend.
//!
//! Speaks the hosted store's generated HTTP API: one endpoint per table,
//! filter predicates as query parameters, `Prefer: return=representation`
//! to get inserted/updated rows back in the response. Row-level security is
//! enforced server-side from the bearer token; a denial surfaces here as
//! [`StoreError::PolicyDenied`].

use crate::{DataStoreInterface, StoreError};
use async_trait::async_trait;
use canteen_types::{
	ConfigSchema, CustomerSummary, Field, FieldType, NewOrder, NewOrderLine, Order, OrderFilter,
	OrderLine, OrderStatus, Party, Schema, ValidationError, VendorSummary,
};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

/// REST data store implementation.
pub struct RestStore {
	client: reqwest::Client,
	base_url: String,
	api_key: String,
}

impl RestStore {
	/// Creates a new RestStore against the given API root.
	pub fn new(base_url: String, api_key: String) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.trim_end_matches('/').to_string(),
			api_key,
		}
	}

	fn table_url(&self, table: &str) -> String {
		format!("{}/rest/v1/{}", self.base_url, table)
	}

	fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
		self.client
			.request(method, self.table_url(table))
			.header("apikey", &self.api_key)
			.header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
			.header("Prefer", "return=representation")
	}

	async fn decode_rows<T: serde::de::DeserializeOwned>(
		response: Response,
	) -> Result<Vec<T>, StoreError> {
		let response = check_status(response).await?;
		response
			.json::<Vec<T>>()
			.await
			.map_err(|e| StoreError::Serialization(e.to_string()))
	}
}

/// Maps an error-status response to the store error taxonomy.
async fn check_status(response: Response) -> Result<Response, StoreError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();
	Err(map_status(status, body))
}

fn map_status(status: StatusCode, body: String) -> StoreError {
	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PolicyDenied(body),
		StatusCode::NOT_FOUND => StoreError::NotFound,
		StatusCode::CONFLICT => StoreError::Constraint(body),
		s if s.is_client_error() => StoreError::Constraint(body),
		s => StoreError::Network(format!("HTTP {}: {}", s, body)),
	}
}

/// Builds an `in.(a,b,c)` filter value from a list of ids.
fn in_filter(ids: &[String]) -> String {
	format!("in.({})", ids.join(","))
}

fn timestamp_filter(at: DateTime<Utc>) -> String {
	format!("eq.{}", at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Order row as the store returns it.
///
/// Rows written before the schema was consolidated may carry the total under
/// a legacy column name; the alias absorbs that here, at the decode
/// boundary, so the rest of the system only ever sees `total_amount`.
#[derive(Debug, Deserialize)]
struct OrderRow {
	id: String,
	order_number: String,
	customer_id: String,
	vendor_id: String,
	status: OrderStatus,
	subtotal: Decimal,
	#[serde(default)]
	delivery_fee: Decimal,
	#[serde(default)]
	tax_amount: Decimal,
	#[serde(alias = "total")]
	total_amount: Decimal,
	payment_method: String,
	special_instructions: Option<String>,
	cancellation_reason: Option<String>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
	fn from(row: OrderRow) -> Self {
		Order {
			id: row.id,
			order_number: row.order_number,
			customer_id: row.customer_id,
			vendor_id: row.vendor_id,
			status: row.status,
			subtotal: row.subtotal,
			delivery_fee: row.delivery_fee,
			tax_amount: row.tax_amount,
			total_amount: row.total_amount,
			payment_method: row.payment_method,
			special_instructions: row.special_instructions,
			cancellation_reason: row.cancellation_reason,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

#[async_trait]
impl DataStoreInterface for RestStore {
	async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
		let response = self
			.request(reqwest::Method::POST, "orders")
			.json(&[new])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		let mut rows: Vec<OrderRow> = Self::decode_rows(response).await?;
		match rows.pop() {
			Some(row) => Ok(row.into()),
			None => Err(StoreError::Serialization(
				"insert returned no representation".into(),
			)),
		}
	}

	async fn insert_order_lines(
		&self,
		lines: &[NewOrderLine],
	) -> Result<Vec<OrderLine>, StoreError> {
		let response = self
			.request(reqwest::Method::POST, "order_items")
			.json(&lines)
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		Self::decode_rows(response).await
	}

	async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
		let response = self
			.request(reqwest::Method::DELETE, "orders")
			.query(&[("id", format!("eq.{}", order_id))])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		check_status(response).await.map(|_| ())
	}

	async fn fetch_order(&self, order_id: &str) -> Result<Order, StoreError> {
		let response = self
			.request(reqwest::Method::GET, "orders")
			.query(&[("id", format!("eq.{}", order_id)), ("limit", "1".into())])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		let mut rows: Vec<OrderRow> = Self::decode_rows(response).await?;
		rows.pop().map(Order::from).ok_or(StoreError::NotFound)
	}

	async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
		let party_column = match &filter.party {
			Party::Customer(_) => "customer_id",
			Party::Vendor(_) => "vendor_id",
		};
		let mut query = vec![
			(party_column, format!("eq.{}", filter.party.id())),
			("order", "created_at.desc".to_string()),
			("limit", filter.limit.to_string()),
			("offset", filter.offset().to_string()),
		];
		if let Some(status) = filter.status {
			query.push(("status", format!("eq.{}", status)));
		}
		if let Some(since) = filter.since {
			query.push((
				"created_at",
				format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Micros, true)),
			));
		}

		let response = self
			.request(reqwest::Method::GET, "orders")
			.query(&query)
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		let rows: Vec<OrderRow> = Self::decode_rows(response).await?;
		Ok(rows.into_iter().map(Order::from).collect())
	}

	async fn fetch_order_lines(&self, order_ids: &[String]) -> Result<Vec<OrderLine>, StoreError> {
		if order_ids.is_empty() {
			return Ok(Vec::new());
		}
		let response = self
			.request(reqwest::Method::GET, "order_items")
			.query(&[("order_id", in_filter(order_ids))])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		Self::decode_rows(response).await
	}

	async fn fetch_vendor_summaries(
		&self,
		vendor_ids: &[String],
	) -> Result<Vec<VendorSummary>, StoreError> {
		if vendor_ids.is_empty() {
			return Ok(Vec::new());
		}
		let response = self
			.request(reqwest::Method::GET, "vendor_profiles")
			.query(&[
				("id", in_filter(vendor_ids)),
				(
					"select",
					"id,business_name,logo_url,business_phone".to_string(),
				),
			])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		Self::decode_rows(response).await
	}

	async fn fetch_customer_summaries(
		&self,
		customer_ids: &[String],
	) -> Result<Vec<CustomerSummary>, StoreError> {
		if customer_ids.is_empty() {
			return Ok(Vec::new());
		}
		let response = self
			.request(reqwest::Method::GET, "users")
			.query(&[
				("id", in_filter(customer_ids)),
				("select", "id,full_name,phone".to_string()),
			])
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		Self::decode_rows(response).await
	}

	async fn update_order_status(
		&self,
		order_id: &str,
		expected: OrderStatus,
		expected_updated_at: DateTime<Utc>,
		next: OrderStatus,
		cancellation_reason: Option<&str>,
	) -> Result<Order, StoreError> {
		let mut patch = serde_json::json!({
			"status": next,
			"updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
		});
		if let Some(reason) = cancellation_reason {
			patch["cancellation_reason"] = serde_json::Value::String(reason.to_string());
		}

		// The eq filters on status and updated_at make this a compare-and-
		// swap: a row already changed by a concurrent writer matches zero
		// rows and comes back as an empty representation.
		let response = self
			.request(reqwest::Method::PATCH, "orders")
			.query(&[
				("id", format!("eq.{}", order_id)),
				("status", format!("eq.{}", expected)),
				("updated_at", timestamp_filter(expected_updated_at)),
			])
			.json(&patch)
			.send()
			.await
			.map_err(|e| StoreError::Network(e.to_string()))?;

		let mut rows: Vec<OrderRow> = Self::decode_rows(response).await?;
		match rows.pop() {
			Some(row) => Ok(row.into()),
			// Zero rows matched: distinguish a vanished order from a lost race
			None => match self.fetch_order(order_id).await {
				Ok(_) => {
					tracing::debug!(order_id, expected = %expected, "Status update matched no rows; row changed concurrently");
					Err(StoreError::Conflict)
				},
				Err(StoreError::NotFound) => Err(StoreError::NotFound),
				Err(other) => Err(other),
			},
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RestStoreSchema)
	}
}

/// Configuration schema for RestStore.
pub struct RestStoreSchema;

impl ConfigSchema for RestStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("base_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("base_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new("api_key", FieldType::String),
			],
			vec![],
		)
		.validate(config)
	}
}

/// Factory function to create a REST data store from configuration.
///
/// Configuration parameters:
/// - `base_url`: API root of the hosted store
/// - `api_key`: bearer token the store's authorization layer keys on
pub fn create_store(config: &toml::Value) -> Result<Box<dyn DataStoreInterface>, StoreError> {
	RestStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StoreError::Configuration("base_url is required".into()))?;
	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StoreError::Configuration("api_key is required".into()))?;

	Ok(Box::new(RestStore::new(
		base_url.to_string(),
		api_key.to_string(),
	)))
}
