//! Model loading lifecycle shared by classifier implementations.

use super::ClassifierError;
use serde::Serialize;
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Loading state of the expression model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready)
    }

    fn is_settled(&self) -> bool {
        matches!(self, ModelState::Ready | ModelState::Failed(_))
    }
}

/// Observable model lifecycle.
///
/// Loading is idempotent: once Ready, further calls to [`ensure_ready`]
/// return immediately; while Loading, callers wait for the running load;
/// after a failure the next call retries.
///
/// [`ensure_ready`]: ModelLifecycle::ensure_ready
pub struct ModelLifecycle {
    state: watch::Sender<ModelState>,
}

impl ModelLifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ModelState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    /// Receive every lifecycle change.
    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.subscribe()
    }

    /// Run `load` unless the model is already loaded or being loaded.
    pub async fn ensure_ready<F, Fut>(&self, load: F) -> Result<(), ClassifierError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClassifierError>>,
    {
        let mut claimed = false;
        self.state.send_if_modified(|state| match state {
            ModelState::Uninitialized | ModelState::Failed(_) => {
                *state = ModelState::Loading;
                claimed = true;
                true
            }
            ModelState::Loading | ModelState::Ready => false,
        });

        if !claimed {
            return self.wait_ready().await;
        }

        debug!("Loading expression model");
        let guard = LoadGuard {
            state: &self.state,
            settled: false,
        };
        let result = load().await;
        guard.settle(&result);
        match &result {
            Ok(()) => info!("Expression model loaded"),
            Err(e) => warn!(error = %e, "Expression model failed to load"),
        }
        result
    }

    /// Wait until a load settles. Resolves immediately if already settled.
    pub async fn wait_ready(&self) -> Result<(), ClassifierError> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(ModelState::is_settled)
            .await
            .map_err(|e| ClassifierError::LoadFailed(e.to_string()))?
            .clone();
        match settled {
            ModelState::Failed(reason) => Err(ClassifierError::LoadFailed(reason)),
            _ => Ok(()),
        }
    }
}

impl Default for ModelLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes the load outcome, or a failure if the load future is dropped
/// before finishing so waiters are never stuck on Loading.
struct LoadGuard<'a> {
    state: &'a watch::Sender<ModelState>,
    settled: bool,
}

impl LoadGuard<'_> {
    fn settle(mut self, result: &Result<(), ClassifierError>) {
        let next = match result {
            Ok(()) => ModelState::Ready,
            Err(e) => ModelState::Failed(e.to_string()),
        };
        self.state.send_replace(next);
        self.settled = true;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state
                .send_replace(ModelState::Failed("model load was cancelled".to_string()));
        }
    }
}
