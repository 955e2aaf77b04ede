//! Authentication module: credential storage and route admission.
//!
//! This module provides:
//! - `CredentialStore`: the bearer token persisted in the storage medium
//! - `decode_claims`: reads the role and subject name out of the token
//! - `RouteGuard`: the pre-navigation admission decision

pub mod claims;
pub mod credentials;
pub mod guard;

pub use claims::{decode_claims, Claims, DecodeError, Role};
pub use credentials::{CredentialStore, CREDENTIAL_KEY};
pub use guard::{Admission, RouteGuard, RouteParams, LOGIN_PATH, PUBLIC_PATHS};
