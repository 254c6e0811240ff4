//! The call lifecycle state machine.
//!
//! ```text
//! Idle --start--> Starting --token + SDK + start_call--> Connected
//!                    |       --mock token-------------> Connected (mock)
//!                    +--any failure-------------------> Idle
//! Connected --stop--> Idle
//! ```
//!
//! A stop that arrives while the session is `Starting` is queued and applied
//! as soon as the start sequence settles. If the start fails the queued stop
//! is dropped since there is nothing left to stop.

use crate::broker::SessionBroker;
use crate::controls::{CallControls, ControlView};
use crate::error::SessionError;
use crate::resolver::{SdkResolution, SdkResolver, WARM_UP_ATTEMPTS, WARM_UP_INTERVAL};
use crate::sdk::{EventHandler, SdkEvent, StartCallConfig, VoiceClient};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use voicewidget_types::{ReplyOutcome, ANONYMOUS_USER_ID};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallState {
    #[default]
    Idle,
    Starting,
    Connected { mock: bool },
}

/// What a stop request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing to stop.
    Ignored,
    /// A start is in flight; the call is torn down once it settles.
    Queued,
    /// The call was stopped and the session is idle.
    Stopped,
}

/// A connected call produced by the start sequence, before it is committed
/// to the session.
struct Connection {
    mock: bool,
    access_token: String,
    call_id: Option<String>,
    client: Option<Arc<dyn VoiceClient>>,
}

#[derive(Default)]
struct Inner {
    state: CallState,
    access_token: Option<String>,
    call_id: Option<String>,
    client: Option<Arc<dyn VoiceClient>>,
    stop_requested: bool,
}

impl Inner {
    fn reset(&mut self) -> Option<Arc<dyn VoiceClient>> {
        self.state = CallState::Idle;
        self.access_token = None;
        self.call_id = None;
        self.stop_requested = false;
        self.client.take()
    }
}

/// Holds the session in `Starting` for one start sequence. If the sequence
/// is abandoned before it settles, dropping the attempt returns the session
/// to `Idle`.
struct StartAttempt<'a> {
    session: &'a CallSession,
    pending: bool,
}

impl StartAttempt<'_> {
    /// The sequence reached `commit` or `fail`, which own the state from here.
    fn settle(mut self) {
        self.pending = false;
    }
}

impl Drop for StartAttempt<'_> {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        {
            let mut inner = self.session.lock();
            if inner.state != CallState::Starting {
                return;
            }
            inner.reset();
        }
        self.session.controls.render(&ControlView::idle());
        warn!("call start abandoned before it settled; session reset to idle");
    }
}

/// One widget's call session.
///
/// Owns the SDK client handle of the current call; at most one handle exists
/// at a time. The internal lock is only held for bookkeeping and never across
/// an `.await`, so concurrent `start`/`stop` calls interleave safely and a
/// second `start` during `Starting` is rejected.
pub struct CallSession {
    broker: Arc<dyn SessionBroker>,
    resolver: Arc<SdkResolver>,
    controls: Arc<dyn CallControls>,
    user_id: String,
    inner: Mutex<Inner>,
}

impl CallSession {
    /// Creates an idle session and renders the initial controls.
    pub fn new(
        broker: Arc<dyn SessionBroker>,
        resolver: Arc<SdkResolver>,
        controls: Arc<dyn CallControls>,
    ) -> Self {
        controls.render(&ControlView::idle());
        Self {
            broker,
            resolver,
            controls,
            user_id: ANONYMOUS_USER_ID.to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Sets the user id sent to the broker (default `anonymous`).
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn state(&self) -> CallState {
        self.lock().state
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.state(), CallState::Connected { mock: true })
    }

    /// Access token of the current call, while Connected.
    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn call_id(&self) -> Option<String> {
        self.lock().call_id.clone()
    }

    pub fn has_client(&self) -> bool {
        self.lock().client.is_some()
    }

    pub fn resolver(&self) -> &Arc<SdkResolver> {
        &self.resolver
    }

    /// Starts the page-load SDK probe: [`WARM_UP_ATTEMPTS`] probes,
    /// [`WARM_UP_INTERVAL`] apart. Call once after constructing the session,
    /// from inside a tokio runtime. Only the resolver's ready flag depends on
    /// it; `start` resolves the SDK again either way.
    pub fn warm_up(&self) -> JoinHandle<bool> {
        self.resolver.spawn_warm_up(WARM_UP_ATTEMPTS, WARM_UP_INTERVAL)
    }

    /// Runs the start sequence.
    ///
    /// Returns the state the session settled in: `Connected`, or `Idle` when
    /// a stop was queued while starting.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyActive`] when the session is not idle (nothing
    /// changes in that case). Any other error means the session is back in
    /// `Idle` with the failure shown on the controls.
    ///
    /// Dropping the returned future before it completes (a timeout, a lost
    /// `select!` branch, an aborted task) puts the session back in `Idle`.
    pub async fn start(&self) -> Result<CallState, SessionError> {
        let attempt = self.begin_start()?;
        self.controls.render(&ControlView::starting());

        let result = self.establish().await;
        attempt.settle();
        match result {
            Ok(connection) => Ok(self.commit(connection).await),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Stops the current call.
    pub fn stop(&self) -> StopOutcome {
        let client = {
            let mut inner = self.lock();
            let state = inner.state;
            match state {
                CallState::Idle => {
                    debug!("stop ignored; no call in progress");
                    return StopOutcome::Ignored;
                }
                CallState::Starting => {
                    inner.stop_requested = true;
                    info!("stop requested while starting; call will end once start settles");
                    return StopOutcome::Queued;
                }
                CallState::Connected { .. } => inner.reset(),
            }
        };

        if let Some(client) = client {
            client.stop_call();
        }
        self.controls.render(&ControlView::idle());
        info!("call stopped");
        StopOutcome::Stopped
    }

    fn begin_start(&self) -> Result<StartAttempt<'_>, SessionError> {
        let mut inner = self.lock();
        if inner.state != CallState::Idle {
            debug!(state = ?inner.state, "start ignored; call already active");
            return Err(SessionError::AlreadyActive);
        }
        inner.state = CallState::Starting;
        inner.stop_requested = false;
        Ok(StartAttempt {
            session: self,
            pending: true,
        })
    }

    /// Token, SDK resolution, construction and `start_call`, in that order.
    async fn establish(&self) -> Result<Connection, SessionError> {
        let reply = self.broker.request_session(&self.user_id).await?;

        let (access_token, call_id) = match reply.outcome() {
            ReplyOutcome::Rejected { error, detail } => {
                return Err(SessionError::BrokerRejected {
                    error: error.to_string(),
                    detail: detail.map(str::to_string),
                });
            }
            ReplyOutcome::Unconfigured => return Err(SessionError::BrokerUnconfigured),
            ReplyOutcome::Mock { access_token } => {
                info!("mock session; skipping voice SDK");
                return Ok(Connection {
                    mock: true,
                    access_token: access_token.to_string(),
                    call_id: reply.call_id.clone(),
                    client: None,
                });
            }
            ReplyOutcome::Token {
                access_token,
                call_id,
            } => (access_token.to_string(), call_id.map(str::to_string)),
        };

        self.resolver.probe();
        let (constructor, source) = match self.resolver.resolve() {
            SdkResolution::Found {
                constructor,
                source,
            } => (constructor, source),
            SdkResolution::NotFound => return Err(SessionError::SdkUnavailable),
        };
        info!(source, "using voice SDK");

        let client = constructor.construct();
        observe(client.as_ref());

        client
            .start_call(StartCallConfig {
                access_token: access_token.clone(),
            })
            .await
            .map_err(|e| SessionError::CallStartFailed(e.to_string()))?;

        Ok(Connection {
            mock: false,
            access_token,
            call_id,
            client: Some(client),
        })
    }

    async fn commit(&self, connection: Connection) -> CallState {
        let state = CallState::Connected {
            mock: connection.mock,
        };

        let stop_requested = {
            let mut inner = self.lock();
            if inner.stop_requested {
                inner.reset();
                true
            } else {
                inner.state = state;
                inner.access_token = Some(connection.access_token);
                inner.call_id = connection.call_id.clone();
                inner.client = connection.client.clone();
                false
            }
        };

        if stop_requested {
            if let Some(client) = connection.client {
                client.stop_call();
            }
            self.controls.render(&ControlView::idle());
            info!("queued stop applied; call ended right after starting");
            return CallState::Idle;
        }

        self.controls.render(&ControlView::connected(connection.mock));
        info!(
            mock = connection.mock,
            call_id = connection.call_id.as_deref().unwrap_or("<none>"),
            "call connected"
        );

        if let Some(client) = connection.client {
            if client.supports_audio_playback() {
                if let Err(e) = client.start_audio_playback().await {
                    let err = SessionError::AudioPlaybackFailed(e.to_string());
                    warn!(error = %err, "continuing without explicit audio playback start");
                }
            }
        }

        state
    }

    fn fail(&self, err: &SessionError) {
        // The client handle is only committed on success, so there is
        // nothing to hang up here.
        self.lock().reset();

        match err {
            SessionError::BrokerRejected { error, detail } => {
                error!(error = %error, detail = detail.as_deref().unwrap_or(""), "start session rejected by broker");
            }
            other => error!(error = %other, "call start failed"),
        }

        if let Some(status) = err.status() {
            self.controls.render(&ControlView::failed(status));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Subscribes log-only observers for every lifecycle event. None of them
/// drive state transitions.
fn observe(client: &dyn VoiceClient) {
    let handler: EventHandler = Arc::new(|event: SdkEvent, detail: Option<&str>| match event {
        SdkEvent::Error => error!(event = %event, detail = detail.unwrap_or(""), "voice SDK error event"),
        _ => info!(event = %event, "voice SDK event"),
    });
    for event in SdkEvent::ALL {
        client.on(event, Arc::clone(&handler));
    }
}
