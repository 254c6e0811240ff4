//! Client for the voice provider's create-web-call endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Provider API used when no base URL override is configured.
pub const DEFAULT_API_BASE: &str = "https://api.retellai.com";

/// Current create-web-call endpoint.
pub const CREATE_WEB_CALL_PATH: &str = "/v2/create-web-call";

/// Older endpoint tried once when the current one answers non-2xx.
pub const LEGACY_CREATE_WEB_CALL_PATH: &str = "/v1/create-web-call";

#[derive(Debug, Serialize)]
struct CreateWebCallRequest<'a> {
    agent_id: &'a str,
    // Older API revisions read the camel-case spelling.
    #[serde(rename = "agentId")]
    agent_id_legacy: &'a str,
    metadata: CallMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct CallMetadata<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

/// The two fields of a created web call the broker forwards. Everything else
/// in the provider's response is dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebCall {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Both endpoints answered non-2xx. Carries the last status and the most
    /// informative response body.
    #[error("create-web-call rejected with status {status}")]
    Rejected { status: u16, detail: String },

    #[error("create-web-call request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Voice provider API client. Cheap to clone; clones share the connection
/// pool.
#[derive(Debug, Clone)]
pub struct RetellClient {
    http: reqwest::Client,
    base_url: String,
}

impl RetellClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a web call for `agent_id` on behalf of `user_id`.
    ///
    /// Tries [`CREATE_WEB_CALL_PATH`] first and, if it answers non-2xx,
    /// [`LEGACY_CREATE_WEB_CALL_PATH`] exactly once with the same payload.
    pub async fn create_web_call(
        &self,
        api_key: &str,
        agent_id: &str,
        user_id: &str,
    ) -> Result<WebCall, UpstreamError> {
        let payload = CreateWebCallRequest {
            agent_id,
            agent_id_legacy: agent_id,
            metadata: CallMetadata { user_id },
        };

        let response = self.post(CREATE_WEB_CALL_PATH, api_key, &payload).await?;
        let response = if response.status().is_success() {
            response
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "v2 create-web-call failed, trying v1");

            let fallback = self
                .post(LEGACY_CREATE_WEB_CALL_PATH, api_key, &payload)
                .await?;
            if !fallback.status().is_success() {
                let fallback_status = fallback.status().as_u16();
                let fallback_body = fallback.text().await.unwrap_or_default();
                error!(
                    status = fallback_status,
                    v2_status = status,
                    v2_body = %body,
                    v1_body = %fallback_body,
                    "create-web-call failed on both endpoints"
                );
                let detail = if fallback_body.is_empty() {
                    body
                } else {
                    fallback_body
                };
                return Err(UpstreamError::Rejected {
                    status: fallback_status,
                    detail,
                });
            }
            fallback
        };

        let call = response.json::<WebCall>().await?;
        debug!(call_id = call.call_id.as_deref().unwrap_or("<none>"), "web call created");
        Ok(call)
    }

    async fn post(
        &self,
        path: &str,
        api_key: &str,
        payload: &CreateWebCallRequest<'_>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
    }
}
