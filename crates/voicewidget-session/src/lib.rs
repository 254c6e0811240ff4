//! Call session client for the voice widget.
//!
//! Drives a single browser voice call from the moment the visitor presses
//! "Start Call" until the call is torn down:
//!
//! 1. ask the token broker for a call access token ([`broker`]),
//! 2. find the voice SDK constructor among the bindings the SDK script may
//!    have published ([`resolver`]),
//! 3. construct a client, subscribe to its lifecycle events and start the
//!    call ([`sdk`], [`session`]),
//! 4. reflect every transition on the widget controls ([`controls`]).
//!
//! The SDK, the broker and the controls are all reached through traits so the
//! state machine can run against injected fakes.

pub mod broker;
pub mod controls;
pub mod error;
pub mod resolver;
pub mod sdk;
pub mod session;

pub use broker::{backend_base_url, HttpBroker, SessionBroker, DEFAULT_BACKEND_URL};
pub use controls::{CallControls, CallStatus, ControlView};
pub use error::{SdkError, SessionError};
pub use resolver::{
    ResolutionStrategy, SdkBindings, SdkResolution, SdkResolver, CANONICAL_BINDING,
    RESOLUTION_ORDER, WARM_UP_ATTEMPTS, WARM_UP_INTERVAL,
};
pub use sdk::{EventHandler, SdkEvent, StartCallConfig, VoiceClient, VoiceClientConstructor};
pub use session::{CallSession, CallState, StopOutcome};
