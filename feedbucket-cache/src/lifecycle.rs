//! Host lifecycle integration.
//!
//! Hosts report foreground/background transitions through a
//! [`LifecycleSource`]. When the app returns to the foreground the source
//! tells every attached [`LifecycleListener`] how long it was away; the cache
//! uses that to mark all buckets stale after a long absence.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use feedbucket_core::{elapsed_between, Clock, SystemClock};
use tokio::sync::mpsc;

/// Host application state, mirroring mobile app-state values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    /// In the foreground and receiving input.
    Active,
    /// Not visible.
    Background,
    /// Visible but not receiving input (transitional).
    Inactive,
}

impl AppState {
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Receives foreground-after-background notifications.
pub trait LifecycleListener: Send + Sync {
    /// Called once per return to the foreground with the time spent away.
    fn on_foreground_after_background(&self, elapsed: Duration);
}

/// A host-provided source of lifecycle transitions.
pub trait LifecycleSource {
    fn attach(&self, listener: Arc<dyn LifecycleListener>);
}

/// Lifecycle source for headless and server contexts. Never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleSource;

impl LifecycleSource for NoopLifecycleSource {
    fn attach(&self, _listener: Arc<dyn LifecycleListener>) {}
}

/// Tracks host state transitions and reports time spent out of the
/// foreground.
///
/// The host calls [`AppStateTracker::transition`] from its native app-state
/// callback, or feeds an async channel into [`AppStateTracker::run`].
pub struct AppStateTracker {
    clock: Arc<dyn Clock>,
    inner: Mutex<TrackerState>,
}

struct TrackerState {
    current: AppState,
    left_foreground_at: Option<DateTime<Utc>>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl AppStateTracker {
    /// Create a tracker that starts in the foreground.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(TrackerState {
                current: AppState::Active,
                left_foreground_at: None,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> AppState {
        self.lock().current
    }

    /// Record a host state change.
    ///
    /// Leaving the foreground stamps the time (the first non-active state
    /// wins, so `Inactive -> Background` keeps the first stamp). Returning
    /// to `Active` reports the elapsed time to every listener.
    pub fn transition(&self, next: AppState) {
        let now = self.clock.now();
        let (elapsed, listeners) = {
            let mut state = self.lock();
            let previous = state.current;
            state.current = next;

            match (previous.is_foreground(), next.is_foreground()) {
                (true, false) => {
                    state.left_foreground_at = Some(now);
                    return;
                }
                (false, true) => match state.left_foreground_at.take() {
                    Some(left_at) => (elapsed_between(left_at, now), state.listeners.clone()),
                    None => return,
                },
                _ => return,
            }
        };

        tracing::debug!(
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            listeners = listeners.len(),
            "App returned to foreground"
        );
        for listener in listeners {
            listener.on_foreground_after_background(elapsed);
        }
    }

    /// Pump state changes from an async channel until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<AppState>) {
        while let Some(next) = rx.recv().await {
            self.transition(next);
        }
        tracing::debug!("App state channel closed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AppStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSource for AppStateTracker {
    fn attach(&self, listener: Arc<dyn LifecycleListener>) {
        self.lock().listeners.push(listener);
    }
}
