//! The session object owning the service graph.
//!
//! One `Session` exists per signed-in principal, created at sign-in and torn
//! down at sign-out. All state (the cart, the service handles, the event
//! bus) lives on the session; nothing is a process-global.

use crate::event_bus::EventBus;
use canteen_cart::CartService;
use canteen_order::{
	ListOptions, OrderQueryService, OrderStateMachine, QueryError, SubmissionService, SubmitError,
	TransitionError, VendorAnalytics,
};
use canteen_types::{Order, OrderView, Party};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Checkout amounts applied when the caller does not override them.
#[derive(Debug, Clone)]
pub struct CheckoutDefaults {
	pub delivery_fee: Decimal,
	pub tax_amount: Decimal,
	pub payment_method: String,
}

/// A signed-in session over the ordering core.
pub struct Session {
	principal: Party,
	defaults: CheckoutDefaults,
	cart: Arc<CartService>,
	submission: SubmissionService,
	state_machine: OrderStateMachine,
	queries: Arc<OrderQueryService>,
	event_bus: EventBus,
}

impl Session {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		principal: Party,
		defaults: CheckoutDefaults,
		cart: Arc<CartService>,
		submission: SubmissionService,
		state_machine: OrderStateMachine,
		queries: Arc<OrderQueryService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			principal,
			defaults,
			cart,
			submission,
			state_machine,
			queries,
			event_bus,
		}
	}

	/// The signed-in party.
	pub fn principal(&self) -> &Party {
		&self.principal
	}

	/// The session's cart.
	pub fn cart(&self) -> &CartService {
		&self.cart
	}

	/// The query/enrichment layer.
	pub fn queries(&self) -> &OrderQueryService {
		&self.queries
	}

	/// The session event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Places an order from the current cart and clears the cart on
	/// success. The cart stays intact on any failure so the user can retry.
	pub async fn checkout(
		&self,
		special_instructions: Option<String>,
	) -> Result<OrderView, SubmitError> {
		let customer_id = match &self.principal {
			Party::Customer(id) => id.clone(),
			Party::Vendor(_) => {
				return Err(SubmitError::Validation(
					"only a customer session can check out".into(),
				))
			},
		};

		let snapshot = self.cart.snapshot().await;
		let request = canteen_order::CheckoutRequest::from_cart(
			customer_id,
			&snapshot,
			self.defaults.delivery_fee,
			self.defaults.tax_amount,
			self.defaults.payment_method.clone(),
			special_instructions,
		)?;

		let view = self.submission.submit(request).await?;
		self.cart.clear().await;
		Ok(view)
	}

	/// Advances one of this vendor's orders a single step.
	pub async fn advance_order(&self, order_id: &str) -> Result<Order, TransitionError> {
		self.state_machine.advance(order_id, &self.principal).await
	}

	/// Cancels one of this customer's orders, while still allowed.
	pub async fn cancel_order(
		&self,
		order_id: &str,
		reason: Option<String>,
	) -> Result<Order, TransitionError> {
		self.state_machine
			.cancel(order_id, &self.principal, reason)
			.await
	}

	/// This principal's orders, enriched.
	pub async fn my_orders(&self, opts: ListOptions) -> Result<Vec<OrderView>, QueryError> {
		match &self.principal {
			Party::Customer(id) => self.queries.orders_for_customer(id, opts).await,
			Party::Vendor(id) => self.queries.orders_for_vendor(id, opts).await,
		}
	}

	/// Dashboard aggregates for a vendor session.
	pub async fn analytics(&self, since: DateTime<Utc>) -> Result<VendorAnalytics, QueryError> {
		self.queries.vendor_analytics(self.principal.id(), since).await
	}

	/// Tears the session down: empties the cart and deletes its persisted
	/// snapshot so nothing of this principal survives sign-out.
	pub async fn sign_out(self) {
		self.cart.clear().await;
		tracing::info!(principal = %self.principal, "Session signed out");
	}
}
