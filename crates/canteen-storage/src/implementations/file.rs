//! File-based storage backend.
//!
//! Stores each key as one JSON-bytes file under a base directory, giving the
//! cart durability across process restarts without an external dependency.
//! Writes go to a temp file first and are renamed into place so a crash
//! mid-write never leaves a torn snapshot.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use canteen_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at the given directory.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.file_path(key).exists())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String)],
		)
		.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for stored files (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StorageService;
	use canteen_types::{CartSnapshot, StorageKey};

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.set_bytes("cart:session", b"payload".to_vec())
			.await
			.unwrap();
		assert_eq!(
			storage.get_bytes("cart:session").await.unwrap(),
			b"payload"
		);

		storage.delete("cart:session").await.unwrap();
		assert!(matches!(
			storage.get_bytes("cart:session").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_survives_new_instance() {
		// A fresh FileStorage over the same directory sees prior writes,
		// which is what cart rehydration at process start relies on.
		let dir = tempfile::tempdir().unwrap();

		let service = StorageService::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
		let snapshot = CartSnapshot::default();
		service
			.store(StorageKey::Cart.as_str(), "session", &snapshot)
			.await
			.unwrap();

		let service = StorageService::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
		let restored: CartSnapshot = service
			.retrieve(StorageKey::Cart.as_str(), "session")
			.await
			.unwrap();
		assert_eq!(restored, snapshot);
	}

	#[tokio::test]
	async fn test_key_sanitization() {
		let dir = tempfile::tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.set_bytes("cart:user/123", b"x".to_vec())
			.await
			.unwrap();
		assert!(storage.exists("cart:user/123").await.unwrap());
		assert!(dir.path().join("cart_user_123.json").exists());
	}
}
