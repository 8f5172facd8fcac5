//! Future-based delivery of asynchronous backend call results.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{error::BackendError, normalization::normalize_call_completion, types::RequestId};

type CallResult = Result<Value, BackendError>;

/// Errors observed by the caller of a backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The backend reported a failure.
    #[error("backend call failed: {0}")]
    Backend(#[from] BackendError),
    /// The command could not be handed to the backend.
    #[error("command channel is closed")]
    CommandChannelClosed,
    /// The registration was dropped before a completion arrived.
    #[error("backend call {0} was abandoned before completing")]
    Abandoned(RequestId),
}

/// Registry of in-flight backend calls awaiting `AsyncCallCompleted`.
#[derive(Clone, Debug, Default)]
pub struct PendingCalls {
    waiting: Arc<Mutex<HashMap<RequestId, oneshot::Sender<CallResult>>>>,
}

impl PendingCalls {
    /// Register a new call and return the future of its result.
    pub fn register(&self) -> PendingCall {
        self.register_with(RequestId::new())
    }

    /// Register a call under a caller-chosen id.
    ///
    /// A previous registration with the same id is abandoned.
    pub fn register_with(&self, request_id: RequestId) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(request_id, tx).is_some() {
            warn!(%request_id, "backend call id reused; abandoning earlier caller");
        }
        debug!(%request_id, "backend call registered");
        PendingCall { request_id, rx }
    }

    /// Deliver a completion to its waiting caller.
    ///
    /// Returns `true` when a registered caller received the outcome. Unclaimed
    /// completions are logged and dropped.
    pub fn complete(
        &self,
        request_id: RequestId,
        result: Option<Value>,
        error: Option<BackendError>,
    ) -> bool {
        let outcome = normalize_call_completion(result, error, true);
        let Some(tx) = self.lock().remove(&request_id) else {
            log_unclaimed(request_id, &outcome, "no caller registered");
            return false;
        };

        match tx.send(outcome) {
            Ok(()) => true,
            Err(outcome) => {
                log_unclaimed(request_id, &outcome, "caller stopped waiting");
                false
            }
        }
    }

    /// Forget a registration; its future resolves to [`CallError::Abandoned`].
    pub fn cancel(&self, request_id: RequestId) -> bool {
        self.lock().remove(&request_id).is_some()
    }

    /// Number of calls still awaiting completion.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<CallResult>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Future side of a registered backend call.
#[derive(Debug)]
pub struct PendingCall {
    request_id: RequestId,
    rx: oneshot::Receiver<CallResult>,
}

impl PendingCall {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wait for the completion callback.
    pub async fn wait(self) -> Result<Value, CallError> {
        match self.rx.await {
            Ok(outcome) => outcome.map_err(CallError::Backend),
            Err(_) => Err(CallError::Abandoned(self.request_id)),
        }
    }
}

fn log_unclaimed(request_id: RequestId, outcome: &CallResult, reason: &str) {
    match outcome {
        Ok(_) => debug!(%request_id, reason, "dropping unclaimed backend call result"),
        Err(error) => warn!(
            %request_id,
            reason,
            error_code = %error.code,
            error = %error,
            "unhandled backend call failure"
        ),
    }
}
