//! Configuration module for the canteen ordering core.
//!
//! Configuration is loaded from TOML. Backend sections (local storage, the
//! hosted data store) are raw values validated by the selected
//! implementation's own schema; this crate validates the overall shape and
//! that the `primary` selections actually name a configured section.
//!
//! Values may reference environment variables as `${VAR}` or with a default
//! as `${VAR:-fallback}`; resolution happens before parsing so secrets like
//! store API keys stay out of checked-in files.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration for the ordering core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Application-level settings.
	pub app: AppConfig,
	/// Local key-value storage for the cart.
	pub storage: StorageConfig,
	/// Hosted relational data store.
	pub datastore: DatastoreConfig,
	/// Checkout defaults.
	#[serde(default)]
	pub checkout: CheckoutConfig,
}

/// Application-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	/// Instance identifier, used in logs.
	pub id: String,
	/// Capacity of the session event bus.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
	256
}

/// Configuration for the local storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the hosted data store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatastoreConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Map of data store implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Per-call deadline in seconds. Calls past this surface a retryable
	/// timeout instead of hanging the caller.
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
	10
}

/// Checkout defaults applied when the caller does not override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutConfig {
	/// Delivery fee applied to new orders, as a decimal string.
	#[serde(default = "default_zero_amount")]
	pub delivery_fee: String,
	/// Tax applied to new orders, as a decimal string.
	#[serde(default = "default_zero_amount")]
	pub tax_amount: String,
	#[serde(default = "default_payment_method")]
	pub payment_method: String,
}

impl Default for CheckoutConfig {
	fn default() -> Self {
		Self {
			delivery_fee: default_zero_amount(),
			tax_amount: default_zero_amount(),
			payment_method: default_payment_method(),
		}
	}
}

fn default_zero_amount() -> String {
	"0.00".to_string()
}

fn default_payment_method() -> String {
	"cash".to_string()
}

impl Config {
	/// Validates cross-field constraints the type shape cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.app.id.is_empty() {
			return Err(ConfigError::Validation("app.id must not be empty".into()));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no [storage.implementations.{}] section",
				self.storage.primary, self.storage.primary
			)));
		}
		if !self
			.datastore
			.implementations
			.contains_key(&self.datastore.primary)
		{
			return Err(ConfigError::Validation(format!(
				"datastore.primary '{}' has no [datastore.implementations.{}] section",
				self.datastore.primary, self.datastore.primary
			)));
		}
		if self.datastore.request_timeout_secs == 0 {
			return Err(ConfigError::Validation(
				"datastore.request_timeout_secs must be positive".into(),
			));
		}
		Ok(())
	}

	/// Loads and validates configuration from a file path.
	pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
		std::fs::read_to_string(path)?.parse()
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

/// Replaces `${VAR}` / `${VAR:-default}` references with environment values.
///
/// A reference without a default to an unset variable is an error rather
/// than an empty string, so a missing API key fails at load, not at the
/// first denied request.
fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut replacements = Vec::new();
	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).ok_or_else(|| {
			ConfigError::Parse("capture group missing".to_string())
		})?;
		let var_name = &cap[1];
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};
		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	let mut result = input.to_string();
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}
	Ok(result)
}
