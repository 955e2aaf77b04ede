//! API client for the exam management backend.
//!
//! This module provides the `ApiClient` struct used as the loader boundary
//! of every fetch cell: dashboard metrics per career, grouped exam tables and
//! the authenticated user.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::FetchError;
use crate::models::{CurrentUser, Payload};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Bounds how long a fetch cell can stay in the loading state.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the exam backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::RequestSetup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, turning transport failures and error statuses into
    /// a `FetchError`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            let err = FetchError::from_reqwest(&e);
            error!(error = %e, "Request failed before a response arrived");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = FetchError::from_status(status.as_u16(), &body);
        error!(status = status.as_u16(), error = %err, "Server returned an error status");
        Err(err)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(error = %e, "Response body is not valid JSON");
            FetchError::ServerRejected {
                status,
                detail: Some(format!("Invalid response from server: {}", e)),
            }
        })
    }

    async fn get_payload(&self, path: &str) -> Result<Option<Payload>, FetchError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.send(self.client.get(&url)).await?;
        let payload: Payload = Self::read_json(response).await?;
        Ok((!payload.is_null()).then_some(payload))
    }

    // ===== Dashboard Metrics =====

    /// Average grades for a career
    pub async fn fetch_global_performance(&self, career_id: &str) -> Result<Option<Payload>, FetchError> {
        self.get_payload(&format!("carreras/{}/notas_promedio", career_id)).await
    }

    /// Predicted performance for a career
    pub async fn fetch_performance_prediction(&self, career_id: &str) -> Result<Option<Payload>, FetchError> {
        self.get_payload(&format!("carreras/{}/prediccion_rendimiento", career_id)).await
    }

    /// Exam registration percentage for a career
    pub async fn fetch_registration_percentage(&self, career_id: &str) -> Result<Option<Payload>, FetchError> {
        self.get_payload(&format!("carreras/{}/porcentaje_inscripciones", career_id)).await
    }

    // ===== Exam Tables =====

    /// Exam tables grouped by career
    pub async fn fetch_exam_tables_by_career(&self) -> Result<Option<Payload>, FetchError> {
        self.get_payload("mesas/carreras").await
    }

    pub async fn delete_exam_table(&self, table_id: i64) -> Result<Payload, FetchError> {
        let url = self.url(&format!("mesas/{}", table_id));
        debug!(url = %url, "DELETE");
        let response = self.send(self.client.delete(&url)).await?;
        Self::read_json(response).await
    }

    // ===== Users =====

    pub async fn fetch_current_user(&self) -> Result<CurrentUser, FetchError> {
        let response = self.send(self.client.get(self.url("auth/users/me/"))).await?;
        Self::read_json(response).await
    }
}
