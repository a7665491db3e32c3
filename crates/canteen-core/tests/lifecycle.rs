//! End-to-end lifecycle tests: cart to checkout to status transitions,
//! across a customer session and a vendor session sharing one data store.

use canteen_cart::AddItem;
use canteen_core::{Session, SessionBuilder, SessionFactories};
use canteen_datastore::implementations::memory::MemoryStore;
use canteen_order::{ListOptions, SubmitError, TransitionError};
use canteen_types::{OrderEvent, OrderStatus, Party, VendorSummary};
use rust_decimal::Decimal;
use std::str::FromStr;

const CONFIG: &str = r#"
[app]
id = "canteen-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[datastore]
primary = "memory"
[datastore.implementations.memory]

[checkout]
delivery_fee = "2.00"
tax_amount = "0.00"
payment_method = "cash"
"#;

fn dec(s: &str) -> Decimal {
	Decimal::from_str(s).unwrap()
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter("canteen=debug")
		.try_init();
}

/// Builds a session whose data store is a clone of `shared`, so several
/// sessions observe the same tables the way real clients share the hosted
/// store.
async fn session_over(shared: &MemoryStore, principal: Party) -> Session {
	let config = CONFIG.parse().unwrap();
	let store = shared.clone();
	let factories = SessionFactories {
		storage_factories: canteen_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
		datastore_factories: std::collections::HashMap::from([(
			"memory".to_string(),
			move |_: &toml::Value| -> Result<
				Box<dyn canteen_datastore::DataStoreInterface>,
				canteen_datastore::StoreError,
			> { Ok(Box::new(store.clone())) },
		)]),
	};
	SessionBuilder::new(config, principal)
		.build(factories)
		.await
		.unwrap()
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

async fn shared_store() -> MemoryStore {
	let store = MemoryStore::new();
	store
		.seed_vendor(VendorSummary {
			id: "v1".to_string(),
			business_name: "v1 stall".to_string(),
			logo_url: None,
			business_phone: None,
		})
		.await;
	store
}

#[tokio::test]
async fn test_cart_to_order_happy_path() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let mut events = customer.event_bus().subscribe();

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	customer
		.cart()
		.add_item(item("b", "v1", "5.00", 2))
		.await
		.unwrap();
	assert_eq!(customer.cart().total_price().await, dec("20.00"));
	assert_eq!(customer.cart().total_items().await, 3);

	let view = customer.checkout(None).await.unwrap();
	assert_eq!(view.order.status, OrderStatus::Pending);
	assert_eq!(view.order.subtotal, dec("20.00"));
	assert_eq!(view.order.total_amount, dec("22.00"));
	assert_eq!(view.lines.len(), 2);
	assert_eq!(
		view.vendor.as_ref().map(|v| v.business_name.as_str()),
		Some("v1 stall")
	);

	// Checkout empties the cart
	assert!(customer.cart().snapshot().await.is_empty());

	// And the order shows up in the customer's enriched listing
	let orders = customer.my_orders(ListOptions::default()).await.unwrap();
	assert_eq!(orders.len(), 1);
	assert_eq!(orders[0].order.id, view.order.id);

	match events.recv().await.unwrap() {
		OrderEvent::Placed { order_id, .. } => assert_eq!(order_id, view.order.id),
		other => panic!("unexpected event: {:?}", other),
	}
}

#[tokio::test]
async fn test_vendor_switch_then_checkout_uses_new_vendor() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	let outcome = customer
		.cart()
		.add_item(item("c", "v2", "7.00", 1))
		.await
		.unwrap();
	assert_eq!(outcome.evicted.map(|v| v.id), Some("v1".to_string()));

	let view = customer.checkout(None).await.unwrap();
	assert_eq!(view.order.vendor_id, "v2");
	assert_eq!(view.order.subtotal, dec("7.00"));
	assert_eq!(view.lines.len(), 1);
}

#[tokio::test]
async fn test_empty_cart_checkout_rejected() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;

	let result = customer.checkout(None).await;
	assert!(matches!(result, Err(SubmitError::Validation(_))));
}

#[tokio::test]
async fn test_vendor_advances_and_cancellation_window_closes() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let vendor = session_over(&store, Party::Vendor("v1".to_string())).await;

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	let view = customer.checkout(None).await.unwrap();
	let order_id = view.order.id;

	// Vendor walks the order forward to ready
	for expected in [
		OrderStatus::Confirmed,
		OrderStatus::Preparing,
		OrderStatus::Ready,
	] {
		let updated = vendor.advance_order(&order_id).await.unwrap();
		assert_eq!(updated.status, expected);
	}

	// The cancellation window closed at preparing
	let result = customer.cancel_order(&order_id, None).await;
	assert!(matches!(
		result,
		Err(TransitionError::CannotCancel {
			status: OrderStatus::Ready
		})
	));

	// The vendor's own listing sees the enriched order
	let orders = vendor.my_orders(ListOptions::default()).await.unwrap();
	assert_eq!(orders.len(), 1);
	assert_eq!(orders[0].order.status, OrderStatus::Ready);
}

#[tokio::test]
async fn test_cancelled_order_blocks_vendor_advance() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let vendor = session_over(&store, Party::Vendor("v1".to_string())).await;

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	let view = customer.checkout(None).await.unwrap();

	let cancelled = customer
		.cancel_order(&view.order.id, Some("changed plans".to_string()))
		.await
		.unwrap();
	assert_eq!(cancelled.status, OrderStatus::Cancelled);
	assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed plans"));

	// Cancelling again is rejected, not silently accepted
	let again = customer.cancel_order(&view.order.id, None).await;
	assert!(matches!(again, Err(TransitionError::CannotCancel { .. })));

	// And the vendor cannot advance a cancelled order
	let advance = vendor.advance_order(&view.order.id).await;
	assert!(matches!(advance, Err(TransitionError::CannotAdvance { .. })));
}

#[tokio::test]
async fn test_cross_party_operations_unauthorized() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let other_vendor = session_over(&store, Party::Vendor("v9".to_string())).await;

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	let view = customer.checkout(None).await.unwrap();

	// A vendor session cannot check out
	other_vendor
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	assert!(matches!(
		other_vendor.checkout(None).await,
		Err(SubmitError::Validation(_))
	));

	// A different vendor cannot advance this order
	assert!(matches!(
		other_vendor.advance_order(&view.order.id).await,
		Err(TransitionError::Unauthorized { .. })
	));
}

#[tokio::test]
async fn test_status_history_events_span_sessions() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let vendor = session_over(&store, Party::Vendor("v1".to_string())).await;
	let mut vendor_events = vendor.event_bus().subscribe();

	customer
		.cart()
		.add_item(item("a", "v1", "10.00", 1))
		.await
		.unwrap();
	let view = customer.checkout(None).await.unwrap();

	vendor.advance_order(&view.order.id).await.unwrap();
	vendor.advance_order(&view.order.id).await.unwrap();

	let mut observed = Vec::new();
	for _ in 0..2 {
		if let OrderEvent::StatusChanged { from, to, .. } = vendor_events.recv().await.unwrap() {
			observed.push((from, to));
		}
	}
	assert_eq!(
		observed,
		vec![
			(OrderStatus::Pending, OrderStatus::Confirmed),
			(OrderStatus::Confirmed, OrderStatus::Preparing),
		]
	);
}

#[tokio::test]
async fn test_vendor_analytics_over_live_orders() {
	init_tracing();
	let store = shared_store().await;
	let customer = session_over(&store, Party::Customer("c1".to_string())).await;
	let vendor = session_over(&store, Party::Vendor("v1".to_string())).await;

	for price in ["10.00", "20.00"] {
		customer
			.cart()
			.add_item(item("a", "v1", price, 1))
			.await
			.unwrap();
		customer.checkout(None).await.unwrap();
	}

	let analytics = vendor
		.analytics(chrono_hours_ago(1))
		.await
		.unwrap();
	assert_eq!(analytics.total_orders, 2);
	// Totals include the configured 2.00 delivery fee per order
	assert_eq!(analytics.total_revenue, dec("34.00"));
	assert_eq!(analytics.unique_customers, 1);
}

fn chrono_hours_ago(hours: i64) -> chrono::DateTime<chrono::Utc> {
	chrono::Utc::now() - chrono::Duration::hours(hours)
}

/// Like `session_over`, but local storage is also shared so cart
/// persistence is observable across session lifetimes.
async fn session_over_shared_storage(
	datastore: &MemoryStore,
	local: &canteen_storage::implementations::memory::MemoryStorage,
	principal: Party,
) -> Session {
	let config = CONFIG.parse().unwrap();
	let datastore = datastore.clone();
	let local = local.clone();
	let factories = SessionFactories {
		storage_factories: std::collections::HashMap::from([(
			"memory".to_string(),
			move |_: &toml::Value| -> Result<
				Box<dyn canteen_storage::StorageInterface>,
				canteen_storage::StorageError,
			> { Ok(Box::new(local.clone())) },
		)]),
		datastore_factories: std::collections::HashMap::from([(
			"memory".to_string(),
			move |_: &toml::Value| -> Result<
				Box<dyn canteen_datastore::DataStoreInterface>,
				canteen_datastore::StoreError,
			> { Ok(Box::new(datastore.clone())) },
		)]),
	};
	SessionBuilder::new(config, principal)
		.build(factories)
		.await
		.unwrap()
}

#[tokio::test]
async fn test_cart_survives_restart_until_sign_out() {
	init_tracing();
	let store = shared_store().await;
	let local = canteen_storage::implementations::memory::MemoryStorage::new();

	// First session persists a cart and is dropped without signing out
	{
		let customer =
			session_over_shared_storage(&store, &local, Party::Customer("c1".to_string())).await;
		customer
			.cart()
			.add_item(item("a", "v1", "10.00", 1))
			.await
			.unwrap();
	}

	// The next session for the same principal rehydrates it
	let customer =
		session_over_shared_storage(&store, &local, Party::Customer("c1".to_string())).await;
	assert_eq!(customer.cart().total_items().await, 1);

	// Sign-out deletes the persisted snapshot
	customer.sign_out().await;
	let customer =
		session_over_shared_storage(&store, &local, Party::Customer("c1".to_string())).await;
	assert!(customer.cart().snapshot().await.is_empty());
}
