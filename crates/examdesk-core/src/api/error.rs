use thiserror::Error;

/// Failure of a remote read or write.
///
/// The three variants cover every way a request can go wrong from the
/// client's side: it was never sent, it was sent but nothing came back, or a
/// response came back with an error status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("No response from server: {0}")]
    NetworkUnreachable(String),

    #[error("Server rejected request with status {status}")]
    ServerRejected { status: u16, detail: Option<String> },

    #[error("Failed to prepare request: {0}")]
    RequestSetup(String),
}

/// Maximum length for error response bodies kept in errors and logs
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build a `ServerRejected` from a status and raw body.
    ///
    /// The API reports failures as `{"detail": "..."}`; when the body is not
    /// shaped like that the (truncated) raw body is kept instead.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| Self::truncate_body(trimmed))
            });
        FetchError::ServerRejected { status, detail }
    }

    /// Classify a transport error by the stage at which it failed.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::ServerRejected {
                status: status.as_u16(),
                detail: None,
            };
        }
        if err.is_builder() {
            return FetchError::RequestSetup(err.to_string());
        }
        FetchError::NetworkUnreachable(err.to_string())
    }

    /// Message shown to the user in place of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NetworkUnreachable(_) => {
                "Could not connect to the server. Check your connection".to_string()
            }
            FetchError::ServerRejected {
                detail: Some(detail),
                ..
            } => detail.clone(),
            FetchError::ServerRejected { status, detail: None } => {
                format!("The server rejected the request (status {})", status)
            }
            FetchError::RequestSetup(_) => {
                "An unexpected error occurred while preparing the request".to_string()
            }
        }
    }
}
