//! Capability surface of the third-party voice SDK.
//!
//! The SDK itself is opaque: the session only needs a constructor, the
//! `startCall`/`stopCall` pair, the optional `startAudioPlayback` and named
//! event subscription.

use crate::error::SdkError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Lifecycle events the session subscribes to on every client it constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkEvent {
    CallStarted,
    CallReady,
    CallEnded,
    AgentStartTalking,
    AgentStopTalking,
    Error,
}

impl SdkEvent {
    /// Every event, in subscription order.
    pub const ALL: [SdkEvent; 6] = [
        SdkEvent::CallStarted,
        SdkEvent::CallReady,
        SdkEvent::CallEnded,
        SdkEvent::AgentStartTalking,
        SdkEvent::AgentStopTalking,
        SdkEvent::Error,
    ];

    /// Event name as the SDK spells it.
    pub fn name(self) -> &'static str {
        match self {
            Self::CallStarted => "call_started",
            Self::CallReady => "call_ready",
            Self::CallEnded => "call_ended",
            Self::AgentStartTalking => "agent_start_talking",
            Self::AgentStopTalking => "agent_stop_talking",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SdkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer invoked by the SDK. The second argument carries the event
/// payload rendered as text, if any (the error message for `error`).
pub type EventHandler = Arc<dyn Fn(SdkEvent, Option<&str>) + Send + Sync>;

/// Argument of [`VoiceClient::start_call`].
#[derive(Clone, PartialEq, Eq)]
pub struct StartCallConfig {
    pub access_token: String,
}

impl fmt::Debug for StartCallConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartCallConfig")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// A constructed voice SDK client.
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Connects the call. Resolves once the SDK considers the call started.
    async fn start_call(&self, config: StartCallConfig) -> Result<(), SdkError>;

    /// Hangs up. Never fails.
    fn stop_call(&self);

    /// Whether the client exposes `startAudioPlayback`. Older SDK builds
    /// do not.
    fn supports_audio_playback(&self) -> bool {
        false
    }

    async fn start_audio_playback(&self) -> Result<(), SdkError> {
        Err(SdkError::Unsupported("startAudioPlayback"))
    }

    /// Registers `handler` for `event`. Clients without event support may
    /// ignore the registration.
    fn on(&self, event: SdkEvent, handler: EventHandler);
}

/// The constructor published by the SDK script under one of its bindings.
pub trait VoiceClientConstructor: Send + Sync {
    fn construct(&self) -> Arc<dyn VoiceClient>;
}

impl<F> VoiceClientConstructor for F
where
    F: Fn() -> Arc<dyn VoiceClient> + Send + Sync,
{
    fn construct(&self) -> Arc<dyn VoiceClient> {
        self()
    }
}
