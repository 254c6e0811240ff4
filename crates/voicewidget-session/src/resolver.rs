//! Locating the voice SDK constructor.
//!
//! Depending on how its script was loaded, the SDK publishes its client
//! constructor under different global bindings (a UMD namespace, a named
//! global, a default export). [`SdkBindings`] stands in for that global
//! namespace and [`SdkResolver`] searches it in a fixed priority order.
//!
//! Resolution happens again on every call attempt because the script may
//! still be loading when the page starts. The warm-up probe only feeds the
//! diagnostic "ready" flag.

use crate::sdk::VoiceClientConstructor;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Binding every alternate location is normalized into.
pub const CANONICAL_BINDING: &str = "RetellWebClient";

/// Alternate bindings copied into [`CANONICAL_BINDING`] by
/// [`SdkResolver::probe`], in the order they are checked.
const ALTERNATE_BINDINGS: [&str; 3] = [
    "retellClientJsSdk.RetellWebClient",
    "Retell.RetellWebClient",
    "RetellClient.RetellWebClient",
];

/// Namespaces reported in the probe diagnostics.
const DIAGNOSTIC_NAMESPACES: [&str; 4] = [
    "retellClientJsSdk",
    "Retell",
    "RetellClient",
    "RetellWebClient",
];

/// Number of warm-up probes: the initial one plus ten retries.
pub const WARM_UP_ATTEMPTS: u32 = 11;

/// Fixed delay between warm-up probes.
pub const WARM_UP_INTERVAL: Duration = Duration::from_millis(300);

/// One named place the constructor may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionStrategy {
    /// Dotted binding path, also reported as the resolution source.
    pub source: &'static str,
}

impl ResolutionStrategy {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    pub fn try_resolve(&self, bindings: &SdkBindings) -> Option<Arc<dyn VoiceClientConstructor>> {
        bindings.get(self.source)
    }
}

/// Strategies tried by [`SdkResolver::resolve`], highest priority first.
pub const RESOLUTION_ORDER: [ResolutionStrategy; 5] = [
    ResolutionStrategy::new("RetellWebClient"),
    ResolutionStrategy::new("Retell.RetellWebClient"),
    ResolutionStrategy::new("RetellClient.RetellWebClient"),
    ResolutionStrategy::new("retellClientJsSdk.RetellWebClient"),
    ResolutionStrategy::new("retellClientJsSdk.default.RetellWebClient"),
];

/// Stand-in for the page's global namespace: dotted binding paths mapped to
/// SDK constructors.
///
/// Cloning shares the underlying map, so a loader and the resolver can hold
/// the same bindings.
#[derive(Clone, Default)]
pub struct SdkBindings {
    entries: Arc<RwLock<HashMap<String, Arc<dyn VoiceClientConstructor>>>>,
}

impl SdkBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `constructor` under `path`, replacing any previous binding.
    pub fn publish(&self, path: impl Into<String>, constructor: Arc<dyn VoiceClientConstructor>) {
        let path = path.into();
        debug!(path = %path, "voice SDK binding published");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, constructor);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn VoiceClientConstructor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Whether any binding lives at or below `namespace`.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .any(|path| {
                path == namespace
                    || path
                        .strip_prefix(namespace)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
    }

    /// Sorted binding paths, for diagnostics.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

impl fmt::Debug for SdkBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkBindings")
            .field("paths", &self.paths())
            .finish()
    }
}

/// Outcome of [`SdkResolver::resolve`].
pub enum SdkResolution {
    Found {
        constructor: Arc<dyn VoiceClientConstructor>,
        source: &'static str,
    },
    NotFound,
}

impl SdkResolution {
    pub fn is_found(&self) -> bool {
        matches!(self, SdkResolution::Found { .. })
    }

    pub fn source(&self) -> Option<&'static str> {
        match self {
            SdkResolution::Found { source, .. } => Some(source),
            SdkResolution::NotFound => None,
        }
    }
}

impl fmt::Debug for SdkResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkResolution::Found { source, .. } => {
                f.debug_struct("Found").field("source", source).finish()
            }
            SdkResolution::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Finds the SDK constructor in a set of [`SdkBindings`].
#[derive(Debug)]
pub struct SdkResolver {
    bindings: SdkBindings,
    ready: AtomicBool,
}

impl SdkResolver {
    pub fn new(bindings: SdkBindings) -> Self {
        Self {
            bindings,
            ready: AtomicBool::new(false),
        }
    }

    pub fn bindings(&self) -> &SdkBindings {
        &self.bindings
    }

    /// Result of the most recent probe. Diagnostic only.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Normalizes the first alternate binding found into
    /// [`CANONICAL_BINDING`] and records whether a constructor is available.
    pub fn probe(&self) -> bool {
        if !self.bindings.contains(CANONICAL_BINDING) {
            let alternate = ALTERNATE_BINDINGS
                .iter()
                .find_map(|path| self.bindings.get(path).map(|ctor| (*path, ctor)));
            if let Some((path, constructor)) = alternate {
                debug!(from = path, "normalizing voice SDK binding");
                self.bindings.publish(CANONICAL_BINDING, constructor);
            }
        }

        let found = self.bindings.contains(CANONICAL_BINDING);
        self.ready.store(found, Ordering::Relaxed);

        if !found {
            let present: Vec<&str> = DIAGNOSTIC_NAMESPACES
                .into_iter()
                .filter(|namespace| self.bindings.has_namespace(namespace))
                .collect();
            debug!(
                present = ?present,
                bindings = ?self.bindings.paths(),
                "voice SDK probe found no usable constructor"
            );
        }

        found
    }

    /// Walks [`RESOLUTION_ORDER`] and returns the first constructor found.
    pub fn resolve(&self) -> SdkResolution {
        RESOLUTION_ORDER
            .iter()
            .find_map(|strategy| {
                strategy
                    .try_resolve(&self.bindings)
                    .map(|constructor| SdkResolution::Found {
                        constructor,
                        source: strategy.source,
                    })
            })
            .unwrap_or(SdkResolution::NotFound)
    }

    /// Probes up to `attempts` times, `interval` apart, stopping at the first
    /// success. The task resolves to the final probe result.
    pub fn spawn_warm_up(self: &Arc<Self>, attempts: u32, interval: Duration) -> JoinHandle<bool> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            for attempt in 0..attempts {
                if resolver.probe() {
                    info!(attempt, "voice SDK ready");
                    return true;
                }
                if attempt + 1 < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            warn!(attempts, "voice SDK not available after warm-up; will retry at call start");
            false
        })
    }
}
