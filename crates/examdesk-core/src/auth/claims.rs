use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Credential is not a three-part token")]
    Malformed,

    #[error("Credential payload is not valid base64: {0}")]
    Base64(String),

    #[error("Credential payload is not valid JSON: {0}")]
    Json(String),
}

/// Role claim carried by the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Other(String),
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "teacher" => Role::Teacher,
            "student" => Role::Student,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Other(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Other(_))
    }

    /// Leading path segment of the role's section, e.g. `/teacher`.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("/admin"),
            Role::Teacher => Some("/teacher"),
            Role::Student => Some("/student"),
            Role::Other(_) => None,
        }
    }

    /// Landing page for the role. Teacher and student homes are per person.
    pub fn home_path(&self, name: &str) -> Option<String> {
        match self {
            Role::Admin => Some("/admin".to_string()),
            Role::Teacher => Some(format!("/teacher/{}", name)),
            Role::Student => Some(format!("/student/{}", name)),
            Role::Other(_) => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims read from the credential payload. The signature is not checked:
/// the server does that on every request, the client only routes on them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
}

impl Claims {
    /// A missing role claim counts as unrecognized.
    pub fn role(&self) -> Role {
        Role::parse(self.role.as_deref().unwrap_or_default())
    }

    /// Display name, falling back to the username.
    pub fn subject_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.sub.clone())
            .unwrap_or_default()
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let mut parts = token.trim().split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(DecodeError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}
