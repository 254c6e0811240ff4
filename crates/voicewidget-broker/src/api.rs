//! API handlers for the token broker.

use crate::upstream::UpstreamError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use voicewidget_types::{StartSessionReply, StartSessionRequest};

/// API error type. Every variant renders as HTTP 500 with a JSON `error`
/// field, which is what the widget keys off.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("RETELL_API_KEY or RETELL_AGENT_ID missing")]
    ConfigurationMissing,

    #[error("Retell create-web-call failed")]
    UpstreamFailure { status: u16, detail: String },

    #[error("Failed to start Retell session")]
    Upstream(String),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Rejected { status, detail } => {
                ApiError::UpstreamFailure { status, detail }
            }
            UpstreamError::Transport(e) => {
                error!(error = %e, "server error on start session");
                ApiError::Upstream(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let body = match self {
            ApiError::ConfigurationMissing => StartSessionReply::failure(message, None, None),
            ApiError::UpstreamFailure { status, detail } => {
                StartSessionReply::failure(message, Some(status), Some(detail))
            }
            ApiError::Upstream(detail) => StartSessionReply::failure(message, None, Some(detail)),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Handler for `POST /api/retell/start`.
///
/// The body is parsed leniently: a missing or malformed body is treated as
/// an anonymous request.
pub async fn start_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StartSessionReply>, ApiError> {
    info!("POST /api/retell/start invoked");
    let request: StartSessionRequest = serde_json::from_slice(&body).unwrap_or_default();

    let retell = &state.config.retell;
    if retell.use_mock_token {
        info!("mock mode enabled, returning mock token");
        return Ok(Json(StartSessionReply::mock()));
    }

    let (Some(api_key), Some(agent_id)) = (retell.api_key(), retell.agent_id()) else {
        error!(
            api_key_present = retell.api_key().is_some(),
            agent_id_present = retell.agent_id().is_some(),
            "voice provider credentials missing"
        );
        return Err(ApiError::ConfigurationMissing);
    };

    let call = state
        .upstream
        .create_web_call(api_key, agent_id, request.user_id_or_anonymous())
        .await?;

    Ok(Json(StartSessionReply::token(call.access_token, call.call_id)))
}
