//! Fakes shared by the session integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use voicewidget_session::{
    CallControls, CallSession, ControlView, EventHandler, SdkBindings, SdkError, SdkEvent,
    SdkResolver, SessionBroker, SessionError, StartCallConfig, VoiceClient,
    VoiceClientConstructor,
};
use voicewidget_types::StartSessionReply;

/// Broker returning a scripted reply, optionally held until released.
pub struct FakeBroker {
    reply: Mutex<Option<Result<StartSessionReply, String>>>,
    gate: Option<Arc<Notify>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn replying(reply: StartSessionReply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(Ok(reply))),
            gate: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(Err(message.to_string()))),
            gate: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Replies only after `gate` is notified.
    pub fn gated(reply: StartSessionReply, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(Ok(reply))),
            gate: Some(gate),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionBroker for FakeBroker {
    async fn request_session(&self, user_id: &str) -> Result<StartSessionReply, SessionError> {
        self.requests.lock().unwrap().push(user_id.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.reply.lock().unwrap().clone() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(SessionError::TokenRequestFailed(message)),
            None => panic!("fake broker has no reply"),
        }
    }
}

/// How a [`FakeClient`] behaves.
#[derive(Debug, Clone, Default)]
pub struct ClientScript {
    pub reject_start: Option<String>,
    pub audio_playback: bool,
    pub reject_audio: bool,
}

/// Everything a [`FakeClient`] saw.
#[derive(Default)]
pub struct ClientLog {
    pub tokens: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
    pub audio_starts: AtomicUsize,
    pub subscriptions: Mutex<Vec<(SdkEvent, EventHandler)>>,
}

impl ClientLog {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn audio_start_count(&self) -> usize {
        self.audio_starts.load(Ordering::SeqCst)
    }

    pub fn subscribed_events(&self) -> Vec<SdkEvent> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| *event)
            .collect()
    }

    /// Fires `event` at every handler registered for it.
    pub fn emit(&self, event: SdkEvent, detail: Option<&str>) {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event, detail);
        }
    }
}

pub struct FakeClient {
    script: ClientScript,
    log: Arc<ClientLog>,
}

#[async_trait]
impl VoiceClient for FakeClient {
    async fn start_call(&self, config: StartCallConfig) -> Result<(), SdkError> {
        self.log.tokens.lock().unwrap().push(config.access_token);
        match &self.script.reject_start {
            Some(reason) => Err(SdkError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn stop_call(&self) {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn supports_audio_playback(&self) -> bool {
        self.script.audio_playback
    }

    async fn start_audio_playback(&self) -> Result<(), SdkError> {
        self.log.audio_starts.fetch_add(1, Ordering::SeqCst);
        if self.script.reject_audio {
            Err(SdkError::Rejected("autoplay blocked".to_string()))
        } else {
            Ok(())
        }
    }

    fn on(&self, event: SdkEvent, handler: EventHandler) {
        self.log.subscriptions.lock().unwrap().push((event, handler));
    }
}

/// Constructor counting how many clients it built. All clients share one log.
pub struct FakeConstructor {
    script: ClientScript,
    pub log: Arc<ClientLog>,
    pub constructed: AtomicUsize,
}

impl FakeConstructor {
    pub fn new(script: ClientScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            log: Arc::new(ClientLog::default()),
            constructed: AtomicUsize::new(0),
        })
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

impl VoiceClientConstructor for FakeConstructor {
    fn construct(&self) -> Arc<dyn VoiceClient> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeClient {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

/// Controls recording every rendered view.
#[derive(Default)]
pub struct RecordingControls {
    views: Mutex<Vec<ControlView>>,
}

impl RecordingControls {
    pub fn views(&self) -> Vec<ControlView> {
        self.views.lock().unwrap().clone()
    }

    pub fn last(&self) -> ControlView {
        *self.views.lock().unwrap().last().expect("nothing rendered")
    }

    pub fn render_count(&self) -> usize {
        self.views.lock().unwrap().len()
    }
}

impl CallControls for RecordingControls {
    fn render(&self, view: &ControlView) {
        self.views.lock().unwrap().push(*view);
    }
}

pub struct Harness {
    pub session: Arc<CallSession>,
    pub controls: Arc<RecordingControls>,
    pub bindings: SdkBindings,
}

/// Session over `broker` with `bindings` standing in for the page globals.
pub fn harness(broker: Arc<dyn SessionBroker>, bindings: SdkBindings) -> Harness {
    let controls = Arc::new(RecordingControls::default());
    let resolver = Arc::new(SdkResolver::new(bindings.clone()));
    let session = Arc::new(CallSession::new(broker, resolver, controls.clone()));
    Harness {
        session,
        controls,
        bindings,
    }
}

/// Bindings with `constructor` published under `path`.
pub fn bindings_with(path: &str, constructor: Arc<FakeConstructor>) -> SdkBindings {
    let bindings = SdkBindings::new();
    bindings.publish(path, constructor);
    bindings
}

pub fn token_reply(token: &str) -> StartSessionReply {
    StartSessionReply::token(Some(token.to_string()), Some("call-123".to_string()))
}
