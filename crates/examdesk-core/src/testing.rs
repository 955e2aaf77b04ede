//! Shared fixtures for unit tests.

use crate::cache::{StorageError, StorageMedium};

/// A medium that refuses every operation.
pub(crate) struct FailingStorage;

impl StorageMedium for FailingStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("denied".to_string()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("denied".to_string()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("denied".to_string()))
    }
}
