use crate::controls::CallStatus;
use thiserror::Error;

/// Failures of the call start sequence.
///
/// Every variant except [`SessionError::AlreadyActive`] leaves the session
/// back in `Idle` with the start control enabled.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a call is already starting or in progress")]
    AlreadyActive,

    #[error("voice SDK is not loaded")]
    SdkUnavailable,

    #[error("token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("token broker rejected the session: {error}")]
    BrokerRejected {
        error: String,
        detail: Option<String>,
    },

    #[error("token broker returned neither a token nor an error")]
    BrokerUnconfigured,

    #[error("voice SDK failed to start the call: {0}")]
    CallStartFailed(String),

    /// Logged only; the call stays connected.
    #[error("audio playback failed to start: {0}")]
    AudioPlaybackFailed(String),
}

impl SessionError {
    /// Status shown on the widget after this failure, or `None` when the
    /// failure does not change what the widget shows.
    pub fn status(&self) -> Option<CallStatus> {
        match self {
            SessionError::BrokerRejected { .. } => Some(CallStatus::ServerError),
            SessionError::BrokerUnconfigured => Some(CallStatus::ServerNotConfigured),
            SessionError::SdkUnavailable => Some(CallStatus::SdkNotLoaded),
            SessionError::TokenRequestFailed(_) | SessionError::CallStartFailed(_) => {
                Some(CallStatus::FailedToStart)
            }
            SessionError::AlreadyActive | SessionError::AudioPlaybackFailed(_) => None,
        }
    }
}

/// Errors reported by a voice SDK client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("{0}")]
    Rejected(String),

    #[error("capability not supported: {0}")]
    Unsupported(&'static str),
}
