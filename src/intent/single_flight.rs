//! # Single-Flight Initialization
//!
//! Lazily produces an expensive value exactly once, no matter how many
//! callers ask for it at the same time.
//!
//! ## State Transitions:
//! Uninitialized → Initializing → Ready
//! Initializing → Failed → Initializing (on the next call)
//!
//! While an attempt is in flight every caller awaits the same
//! [`Shared`] future, so a slow model warm-up happens once and all callers
//! see the same outcome. After success the value is cloned out on every call
//! without touching the backend again. After failure the error is kept for
//! status reporting and the next call starts a fresh attempt.

use crate::intent::error::{EngineError, EngineResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

type Attempt<T> = Shared<BoxFuture<'static, EngineResult<T>>>;

enum Phase<T> {
    Uninitialized,
    Initializing(Attempt<T>),
    Ready(T),
    Failed(EngineError),
}

/// Externally visible initialization phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl std::fmt::Display for InitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InitStatus::Uninitialized => "uninitialized",
            InitStatus::Initializing => "initializing",
            InitStatus::Ready => "ready",
            InitStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A value initialized at most once at a time, shared by all callers.
pub struct SingleFlight<T> {
    // The in-flight future holds a clone of this Arc to record its outcome.
    phase: Arc<Mutex<Phase<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            phase: Arc::new(Mutex::new(Phase::Uninitialized)),
        }
    }

    /// Return the ready value, join the attempt in flight, or start one.
    ///
    /// `init` is only invoked when no attempt is running and no value is
    /// ready. The lock is released before the attempt is awaited.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>> + Send + 'static,
    {
        let attempt = {
            let mut phase = self.phase.lock().await;
            match &*phase {
                Phase::Ready(value) => return Ok(value.clone()),
                Phase::Initializing(attempt) => {
                    tracing::debug!("Joining initialization already in flight");
                    attempt.clone()
                }
                Phase::Uninitialized | Phase::Failed(_) => {
                    let slot = Arc::clone(&self.phase);
                    let work = init();
                    let attempt = async move {
                        let result = work.await;
                        let mut phase = slot.lock().await;
                        *phase = match &result {
                            Ok(value) => Phase::Ready(value.clone()),
                            Err(e) => Phase::Failed(e.clone()),
                        };
                        result
                    }
                    .boxed()
                    .shared();

                    *phase = Phase::Initializing(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// The ready value, if initialization has completed.
    pub async fn get(&self) -> Option<T> {
        match &*self.phase.lock().await {
            Phase::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn status(&self) -> InitStatus {
        match &*self.phase.lock().await {
            Phase::Uninitialized => InitStatus::Uninitialized,
            Phase::Initializing(_) => InitStatus::Initializing,
            Phase::Ready(_) => InitStatus::Ready,
            Phase::Failed(_) => InitStatus::Failed,
        }
    }

    /// Error of the most recent failed attempt, cleared once one succeeds.
    pub async fn last_error(&self) -> Option<EngineError> {
        match &*self.phase.lock().await {
            Phase::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
