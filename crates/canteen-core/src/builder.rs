//! Builder for constructing sessions.
//!
//! Composes a [`Session`](crate::Session) from configuration plus factory
//! functions for the pluggable backends. Factories take the implementation's
//! raw TOML section and return the boxed backend; which one runs is chosen
//! by the `primary` key in each config section.

use crate::event_bus::EventBus;
use crate::session::{CheckoutDefaults, Session};
use canteen_cart::CartService;
use canteen_config::Config;
use canteen_datastore::{DataStoreInterface, DataStoreService, StoreError};
use canteen_order::{OrderQueryService, OrderStateMachine, SubmissionService};
use canteen_storage::{StorageError, StorageInterface, StorageService};
use canteen_types::Party;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during session construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
	#[error("Factory failed for '{name}': {message}")]
	Factory { name: String, message: String },
}

/// Container for the factory functions needed to build a session.
pub struct SessionFactories<SF, DF> {
	pub storage_factories: HashMap<String, SF>,
	pub datastore_factories: HashMap<String, DF>,
}

/// The built-in factories: every storage and data store implementation
/// this workspace ships.
pub fn default_factories() -> SessionFactories<
	canteen_storage::StorageFactory,
	canteen_datastore::DataStoreFactory,
> {
	SessionFactories {
		storage_factories: canteen_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
		datastore_factories: canteen_datastore::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
	}
}

/// Builder for a signed-in session.
pub struct SessionBuilder {
	config: Config,
	principal: Party,
}

impl SessionBuilder {
	/// Creates a builder for the given configuration and signed-in party.
	pub fn new(config: Config, principal: Party) -> Self {
		Self { config, principal }
	}

	/// Builds the session using factories for each backend type.
	pub async fn build<SF, DF>(
		self,
		factories: SessionFactories<SF, DF>,
	) -> Result<Session, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		DF: Fn(&toml::Value) -> Result<Box<dyn DataStoreInterface>, StoreError>,
	{
		let storage_backend = Self::make(
			&factories.storage_factories,
			&self.config.storage.primary,
			&self.config.storage.implementations,
		)?;
		let datastore_backend = Self::make(
			&factories.datastore_factories,
			&self.config.datastore.primary,
			&self.config.datastore.implementations,
		)?;
		tracing::info!(
			app = %self.config.app.id,
			storage = %self.config.storage.primary,
			datastore = %self.config.datastore.primary,
			principal = %self.principal,
			"Session backends loaded"
		);

		let storage = Arc::new(StorageService::new(storage_backend));
		let store = Arc::new(DataStoreService::new(
			datastore_backend,
			Duration::from_secs(self.config.datastore.request_timeout_secs),
		));

		let defaults = CheckoutDefaults {
			delivery_fee: parse_amount("checkout.delivery_fee", &self.config.checkout.delivery_fee)?,
			tax_amount: parse_amount("checkout.tax_amount", &self.config.checkout.tax_amount)?,
			payment_method: self.config.checkout.payment_method.clone(),
		};

		let event_bus = EventBus::new(self.config.app.event_capacity);
		let cart = Arc::new(CartService::restore(storage, self.principal.id().to_string()).await);
		let queries = Arc::new(OrderQueryService::new(store.clone()));
		let submission =
			SubmissionService::new(store.clone(), queries.clone(), event_bus.sender());
		let state_machine = OrderStateMachine::new(store, event_bus.sender());

		Ok(Session::new(
			self.principal,
			defaults,
			cart,
			submission,
			state_machine,
			queries,
			event_bus,
		))
	}

	fn make<T, E: std::fmt::Display, F: Fn(&toml::Value) -> Result<T, E>>(
		factories: &HashMap<String, F>,
		primary: &str,
		implementations: &HashMap<String, toml::Value>,
	) -> Result<T, BuilderError> {
		let section = implementations
			.get(primary)
			.ok_or_else(|| BuilderError::Config(format!("no config section for '{}'", primary)))?;
		let factory = factories
			.get(primary)
			.ok_or_else(|| BuilderError::MissingComponent(primary.to_string()))?;
		factory(section).map_err(|e| BuilderError::Factory {
			name: primary.to_string(),
			message: e.to_string(),
		})
	}
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, BuilderError> {
	Decimal::from_str(value)
		.map_err(|e| BuilderError::Config(format!("{} '{}': {}", field, value, e)))
}
