//! Cart store for the ordering core.
//!
//! Sole owner of in-session cart state and the single point enforcing the
//! one-vendor-per-cart rule: adding an item from a different vendor evicts
//! every line of the previous vendor before the new line lands. Whether to
//! ask the user first is the calling layer's decision; the operation here is
//! unconditional and reports what it evicted.
//!
//! All mutations are serialized through one async lock, so the eviction
//! check and the subsequent append are atomic, and a checkout snapshot taken
//! through the same lock cannot interleave with a mutation in flight.
//!
//! Every mutation writes the full snapshot through to local storage.
//! Persistence failures are logged and swallowed: the in-memory state stays
//! authoritative for the life of the process.

use canteen_storage::{StorageError, StorageService};
use canteen_types::{CartLine, CartSnapshot, StorageKey, VendorRef};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors surfaced by cart operations.
///
/// Only input validation fails a cart call; persistence problems are
/// logged, never surfaced.
#[derive(Debug, Error)]
pub enum CartError {
	/// Malformed input caught before the cart is touched.
	#[error("Validation failed: {0}")]
	Validation(String),
}

/// Input for [`CartService::add_item`].
#[derive(Debug, Clone)]
pub struct AddItem {
	pub menu_item_id: String,
	pub vendor_id: String,
	/// Vendor display name, kept on the cart's vendor lock.
	pub vendor_name: String,
	pub name: String,
	pub unit_price: Decimal,
	pub quantity: u32,
	pub image_url: Option<String>,
}

/// What an [`CartService::add_item`] call did.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
	/// The vendor whose lines were evicted to admit this item, if any.
	/// Callers that want a confirmation step check this beforehand.
	pub evicted: Option<VendorRef>,
}

/// Cart store service.
///
/// One instance per signed-in session, owned by the session object; there is
/// no global cart.
pub struct CartService {
	state: Mutex<CartSnapshot>,
	storage: Arc<StorageService>,
	/// Storage id the snapshot is persisted under (the signed-in customer).
	owner_id: String,
}

impl CartService {
	/// Creates an empty cart for the given owner.
	pub fn new(storage: Arc<StorageService>, owner_id: impl Into<String>) -> Self {
		Self {
			state: Mutex::new(CartSnapshot::default()),
			storage,
			owner_id: owner_id.into(),
		}
	}

	/// Rehydrates the cart persisted for this owner, or starts empty when
	/// nothing was stored. A corrupt or unreadable snapshot is discarded
	/// with a warning rather than failing session start.
	pub async fn restore(storage: Arc<StorageService>, owner_id: impl Into<String>) -> Self {
		let owner_id = owner_id.into();
		let snapshot = match storage
			.retrieve::<CartSnapshot>(StorageKey::Cart.as_str(), &owner_id)
			.await
		{
			Ok(snapshot) => snapshot,
			Err(StorageError::NotFound) => CartSnapshot::default(),
			Err(e) => {
				tracing::warn!(owner_id = %owner_id, error = %e, "Discarding unreadable cart snapshot");
				CartSnapshot::default()
			},
		};
		Self {
			state: Mutex::new(snapshot),
			storage,
			owner_id,
		}
	}

	/// Adds an item, enforcing the single-vendor rule.
	///
	/// If the cart holds another vendor's lines they are evicted first and
	/// the outcome reports the displaced vendor. An existing line for the
	/// same item has its quantity incremented instead of a duplicate line
	/// being appended.
	pub async fn add_item(&self, item: AddItem) -> Result<AddOutcome, CartError> {
		if item.quantity == 0 {
			return Err(CartError::Validation("quantity must be positive".into()));
		}
		if item.unit_price < Decimal::ZERO {
			return Err(CartError::Validation("unit price must not be negative".into()));
		}

		let mut cart = self.state.lock().await;

		let evicted = match &cart.vendor {
			Some(vendor) if vendor.id != item.vendor_id && !cart.lines.is_empty() => {
				let displaced = vendor.clone();
				cart.lines.clear();
				Some(displaced)
			},
			_ => None,
		};

		cart.vendor = Some(VendorRef {
			id: item.vendor_id.clone(),
			name: item.vendor_name.clone(),
		});

		let existing = cart
			.lines
			.iter()
			.position(|line| line.menu_item_id == item.menu_item_id && line.vendor_id == item.vendor_id);
		match existing {
			Some(index) => cart.lines[index].quantity += item.quantity,
			None => cart.lines.push(CartLine {
				menu_item_id: item.menu_item_id,
				vendor_id: item.vendor_id,
				name: item.name,
				unit_price: item.unit_price,
				quantity: item.quantity,
				image_url: item.image_url,
			}),
		}

		self.persist(&cart).await;
		Ok(AddOutcome { evicted })
	}

	/// Removes the matching line. When the last line goes, the vendor lock
	/// is released too.
	pub async fn remove_item(&self, menu_item_id: &str, vendor_id: &str) {
		let mut cart = self.state.lock().await;
		cart.lines
			.retain(|line| !(line.menu_item_id == menu_item_id && line.vendor_id == vendor_id));
		if cart.lines.is_empty() {
			cart.vendor = None;
		}
		self.persist(&cart).await;
	}

	/// Sets a line's quantity directly. Zero removes the line.
	pub async fn update_quantity(&self, menu_item_id: &str, vendor_id: &str, quantity: u32) {
		if quantity == 0 {
			self.remove_item(menu_item_id, vendor_id).await;
			return;
		}

		let mut cart = self.state.lock().await;
		if let Some(line) = cart
			.lines
			.iter_mut()
			.find(|line| line.menu_item_id == menu_item_id && line.vendor_id == vendor_id)
		{
			line.quantity = quantity;
		}
		self.persist(&cart).await;
	}

	/// Empties the cart, releases the vendor lock, and deletes the
	/// persisted record.
	pub async fn clear(&self) {
		let mut cart = self.state.lock().await;
		cart.lines.clear();
		cart.vendor = None;

		if let Err(e) = self
			.storage
			.remove(StorageKey::Cart.as_str(), &self.owner_id)
			.await
		{
			tracing::warn!(owner_id = %self.owner_id, error = %e, "Failed to delete persisted cart");
		}
	}

	/// Sum of `unit_price * quantity` over all lines.
	pub async fn total_price(&self) -> Decimal {
		self.state.lock().await.total_price()
	}

	/// Sum of quantities over all lines.
	pub async fn total_items(&self) -> u32 {
		self.state.lock().await.total_items()
	}

	/// The vendor the cart is currently locked to.
	pub async fn vendor(&self) -> Option<VendorRef> {
		self.state.lock().await.vendor.clone()
	}

	/// A copy of the full cart state, taken under the mutation lock.
	pub async fn snapshot(&self) -> CartSnapshot {
		self.state.lock().await.clone()
	}

	/// Write-through of the current snapshot. Failures are logged, not
	/// surfaced; in-memory state remains authoritative.
	async fn persist(&self, cart: &CartSnapshot) {
		if let Err(e) = self
			.storage
			.store(StorageKey::Cart.as_str(), &self.owner_id, cart)
			.await
		{
			tracing::warn!(owner_id = %self.owner_id, error = %e, "Failed to persist cart snapshot");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use canteen_storage::implementations::memory::MemoryStorage;
	use std::str::FromStr;

	fn dec(s: &str) -> Decimal {
		Decimal::from_str(s).unwrap()
	}

	fn service() -> CartService {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		CartService::new(storage, "customer-1")
	}

	fn item(id: &str, vendor: &str, price: &str, quantity: u32) -> AddItem {
		AddItem {
			menu_item_id: id.to_string(),
			vendor_id: vendor.to_string(),
			vendor_name: format!("{} stall", vendor),
			name: format!("item {}", id),
			unit_price: dec(price),
			quantity,
			image_url: None,
		}
	}

	#[tokio::test]
	async fn test_add_and_totals() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 1)).await.unwrap();
		cart.add_item(item("b", "v1", "5.00", 2)).await.unwrap();

		let snapshot = cart.snapshot().await;
		assert_eq!(snapshot.lines.len(), 2);
		assert_eq!(cart.total_price().await, dec("20.00"));
		assert_eq!(cart.total_items().await, 3);
	}

	#[tokio::test]
	async fn test_same_item_increments_quantity() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 1)).await.unwrap();
		cart.add_item(item("a", "v1", "10.00", 2)).await.unwrap();

		let snapshot = cart.snapshot().await;
		assert_eq!(snapshot.lines.len(), 1);
		assert_eq!(snapshot.lines[0].quantity, 3);
	}

	#[tokio::test]
	async fn test_vendor_switch_evicts_previous_lines() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 1)).await.unwrap();
		cart.add_item(item("b", "v1", "5.00", 1)).await.unwrap();

		let outcome = cart.add_item(item("c", "v2", "7.00", 1)).await.unwrap();
		assert_eq!(outcome.evicted.as_ref().map(|v| v.id.as_str()), Some("v1"));

		let snapshot = cart.snapshot().await;
		assert_eq!(snapshot.lines.len(), 1);
		assert_eq!(snapshot.lines[0].menu_item_id, "c");
		assert_eq!(snapshot.vendor.as_ref().map(|v| v.id.as_str()), Some("v2"));
	}

	#[tokio::test]
	async fn test_single_vendor_invariant_holds_after_every_add() {
		let cart = service();
		let sequence = [
			("a", "v1"),
			("b", "v1"),
			("c", "v2"),
			("d", "v2"),
			("e", "v1"),
		];
		for (id, vendor) in sequence {
			cart.add_item(item(id, vendor, "1.00", 1)).await.unwrap();
			let snapshot = cart.snapshot().await;
			let locked = snapshot.vendor.expect("vendor set after add");
			assert!(snapshot
				.lines
				.iter()
				.all(|line| line.vendor_id == locked.id));
		}
	}

	#[tokio::test]
	async fn test_update_quantity_sets_not_adds() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 2)).await.unwrap();
		cart.update_quantity("a", "v1", 5).await;
		assert_eq!(cart.snapshot().await.lines[0].quantity, 5);
	}

	#[tokio::test]
	async fn test_zero_quantity_removes_line() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 2)).await.unwrap();
		cart.update_quantity("a", "v1", 0).await;

		let snapshot = cart.snapshot().await;
		assert!(snapshot.is_empty());
		assert!(snapshot.vendor.is_none());
	}

	#[tokio::test]
	async fn test_removing_last_line_releases_vendor() {
		let cart = service();
		cart.add_item(item("a", "v1", "10.00", 1)).await.unwrap();
		cart.remove_item("a", "v1").await;
		assert!(cart.vendor().await.is_none());
	}

	#[tokio::test]
	async fn test_zero_quantity_add_rejected() {
		let cart = service();
		let result = cart.add_item(item("a", "v1", "10.00", 0)).await;
		assert!(matches!(result, Err(CartError::Validation(_))));
		assert!(cart.snapshot().await.is_empty());
	}

	#[tokio::test]
	async fn test_persists_and_rehydrates() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		{
			let cart = CartService::new(storage.clone(), "customer-1");
			cart.add_item(item("a", "v1", "10.00", 2)).await.unwrap();
		}

		let restored = CartService::restore(storage, "customer-1").await;
		let snapshot = restored.snapshot().await;
		assert_eq!(snapshot.lines.len(), 1);
		assert_eq!(snapshot.lines[0].quantity, 2);
		assert_eq!(snapshot.vendor.as_ref().map(|v| v.id.as_str()), Some("v1"));
	}

	#[tokio::test]
	async fn test_clear_deletes_persisted_record() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let cart = CartService::new(storage.clone(), "customer-1");
		cart.add_item(item("a", "v1", "10.00", 1)).await.unwrap();
		cart.clear().await;

		assert!(!storage
			.exists(StorageKey::Cart.as_str(), "customer-1")
			.await
			.unwrap());
		let restored = CartService::restore(storage, "customer-1").await;
		assert!(restored.snapshot().await.is_empty());
	}
}
