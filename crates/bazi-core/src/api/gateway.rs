//! The single chokepoint for every call to the chart service.
//!
//! The gateway attaches the bearer token, classifies the response, and on a
//! 401 from any endpoint tears down the local session before reporting the
//! error. It never retries.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{classify, ApiError};
use super::transport::{HttpRequest, Transport};
use crate::auth::SessionManager;

/// Base URL of the chart service API
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/api";

/// Message used when a failed response carries no `error` field
const DEFAULT_FALLBACK: &str = "Request failed";

/// Per-request policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Endpoint needs a logged-in user
    pub auth_required: bool,
    /// Message for failures the service does not explain
    pub fallback: &'static str,
}

impl RequestOptions {
    pub fn public() -> Self {
        Self {
            auth_required: false,
            fallback: DEFAULT_FALLBACK,
        }
    }

    pub fn authorized() -> Self {
        Self {
            auth_required: true,
            fallback: DEFAULT_FALLBACK,
        }
    }

    pub fn with_fallback(self, fallback: &'static str) -> Self {
        Self { fallback, ..self }
    }
}

pub struct ApiGateway {
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
    base_url: String,
}

impl ApiGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionManager>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            base_url: base_url.into(),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send one request and return the decoded JSON body of a 2xx response
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        // Re-checked per request so an expired credential is never sent
        let bearer = self.session.token();
        if options.auth_required && bearer.is_none() {
            debug!(path, "Sending authorized request without a credential");
        }
        debug!(%method, path, authorized = bearer.is_some(), "Sending request");

        let request = HttpRequest {
            method,
            url: self.url(path),
            bearer,
            body,
        };

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(path, error = %e, "Request failed");
            ApiError::Network(e.to_string())
        })?;

        if let Err(err) = classify(response.status, &response.body, options.fallback) {
            if err.is_unauthorized() {
                warn!(path, "Service rejected credential");
                self.session.invalidate();
            } else {
                debug!(path, status = response.status, error = %err, "Request rejected");
            }
            return Err(err);
        }

        Self::parse_body(path, &response.body)
    }

    /// `request` followed by decoding into `T`
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = self.request(method, path, body, options).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse response from {}: {}", path, e)))
    }

    fn parse_body(path: &str, body: &str) -> Result<Value, ApiError> {
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(body)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse response from {}: {}", path, e)))
    }
}
