//! Data models for the exam API.
//!
//! Dashboard metrics and exam tables are handled as opaque JSON (`Payload`);
//! their shapes belong to the server and the views that chart them. Only the
//! authenticated-user record is typed, since the client routes on it.

use serde::{Deserialize, Serialize};

/// Opaque JSON body returned by metric and table endpoints.
pub type Payload = serde_json::Value;

/// Response of `GET /auth/users/me/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    #[serde(rename = "carrera_id", default)]
    pub career_id: Option<i64>,
}

/// True for `null`, `[]` and `{}`.
///
/// Empty payloads are never written to the cache: an empty result is as
/// likely to be a transient backend hiccup as real "no data".
pub fn is_empty_payload(value: &Payload) -> bool {
    match value {
        Payload::Null => true,
        Payload::Array(items) => items.is_empty(),
        Payload::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
