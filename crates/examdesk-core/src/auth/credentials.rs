use std::sync::Arc;

use tracing::{debug, warn};

use super::claims::{decode_claims, Claims};
use crate::cache::{StorageError, StorageMedium};

/// Well-known storage key of the bearer credential.
pub const CREDENTIAL_KEY: &str = "access_token";

/// Bearer credential persisted in the storage medium.
#[derive(Clone)]
pub struct CredentialStore {
    medium: Arc<dyn StorageMedium>,
}

impl CredentialStore {
    pub fn new(medium: Arc<dyn StorageMedium>) -> Self {
        Self { medium }
    }

    /// Persist the token received at login
    pub fn store(&self, token: &str) -> Result<(), StorageError> {
        self.medium.set_item(CREDENTIAL_KEY, token.trim())
    }

    /// Current token, if any. An unreadable medium reads as logged out.
    pub fn token(&self) -> Option<String> {
        match self.medium.get_item(CREDENTIAL_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read credential, treating as absent");
                None
            }
        }
    }

    /// Remove the token (logout, or a credential that failed to decode)
    pub fn clear(&self) {
        match self.medium.remove_item(CREDENTIAL_KEY) {
            Ok(()) => debug!("Credential removed"),
            Err(e) => warn!(error = %e, "Failed to remove credential"),
        }
    }

    /// Claims of the current token, without touching storage on failure.
    pub fn claims(&self) -> Option<Claims> {
        let token = self.token()?;
        match decode_claims(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Stored credential does not decode");
                None
            }
        }
    }

    pub fn has_credential(&self) -> bool {
        self.token().is_some()
    }
}
