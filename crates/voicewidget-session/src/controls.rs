//! What the widget shows: status text and which call button is enabled.

use std::fmt;

/// Status line of the call modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Idle,
    Starting,
    Connected,
    ConnectedMock,
    ServerError,
    ServerNotConfigured,
    SdkNotLoaded,
    FailedToStart,
}

impl CallStatus {
    pub fn text(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting...",
            Self::Connected => "Connected",
            Self::ConnectedMock => "Connected (mock)",
            Self::ServerError => "Server error",
            Self::ServerNotConfigured => "Server not configured",
            Self::SdkNotLoaded => "SDK not loaded",
            Self::FailedToStart => "Failed to start",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// A complete snapshot of the call controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlView {
    pub status: CallStatus,
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlView {
    /// Initial view, and the view after a call ends.
    pub fn idle() -> Self {
        Self {
            status: CallStatus::Idle,
            start_enabled: true,
            stop_enabled: false,
        }
    }

    pub fn starting() -> Self {
        Self {
            status: CallStatus::Starting,
            start_enabled: false,
            stop_enabled: false,
        }
    }

    pub fn connected(mock: bool) -> Self {
        Self {
            status: if mock {
                CallStatus::ConnectedMock
            } else {
                CallStatus::Connected
            },
            start_enabled: false,
            stop_enabled: true,
        }
    }

    /// A failed start: the status explains why and start is usable again.
    pub fn failed(status: CallStatus) -> Self {
        Self {
            status,
            start_enabled: true,
            stop_enabled: false,
        }
    }
}

/// Rendering side of the widget. Receives a fresh [`ControlView`] on every
/// state transition.
pub trait CallControls: Send + Sync {
    fn render(&self, view: &ControlView);
}
