//! Client side of the token broker.

use crate::error::SessionError;
use async_trait::async_trait;
use tracing::debug;
use voicewidget_types::{StartSessionReply, StartSessionRequest, START_SESSION_PATH};

/// Hosted broker used when no override is configured.
pub const DEFAULT_BACKEND_URL: &str = "https://retell-call-widget-ai.vercel.app";

/// Resolves the broker base URL: the override when set (without a trailing
/// slash), otherwise [`DEFAULT_BACKEND_URL`].
pub fn backend_base_url(override_url: Option<&str>) -> String {
    match override_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => DEFAULT_BACKEND_URL.to_string(),
    }
}

/// Something that can hand out call tokens.
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Requests a call token for `user_id`.
    ///
    /// Returns whatever reply the broker produced, including error replies;
    /// only transport and decoding failures are errors.
    async fn request_session(&self, user_id: &str) -> Result<StartSessionReply, SessionError>;
}

/// [`SessionBroker`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpBroker {
    pub fn new(base_url_override: Option<&str>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url_override)
    }

    pub fn with_client(http: reqwest::Client, base_url_override: Option<&str>) -> Self {
        let endpoint = format!("{}{}", backend_base_url(base_url_override), START_SESSION_PATH);
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SessionBroker for HttpBroker {
    async fn request_session(&self, user_id: &str) -> Result<StartSessionReply, SessionError> {
        debug!(endpoint = %self.endpoint, user_id, "requesting call session");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&StartSessionRequest::new(user_id))
            .send()
            .await
            .map_err(|e| SessionError::TokenRequestFailed(e.to_string()))?;

        // Error replies arrive with a 500 status but still carry JSON worth
        // reading, so the status is not checked here.
        response
            .json::<StartSessionReply>()
            .await
            .map_err(|e| SessionError::TokenRequestFailed(e.to_string()))
    }
}
