use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BackendErrorCategory {
    /// Invalid input or request the homeserver does not accept.
    Config,
    /// Authentication/authorization failure.
    Auth,
    /// Transient network or transport failure.
    Network,
    /// Rate-limited by homeserver.
    RateLimited,
    /// Resource does not exist.
    NotFound,
    /// Cryptographic/encryption failure.
    Crypto,
    /// Internal backend bug or unclassified failure.
    #[default]
    Internal,
}

/// Failure reported by the backend for an asynchronous call.
///
/// `code` is the backend's error kind (a Matrix `errcode` such as
/// `M_FORBIDDEN`, or a backend exception name) and `args` its arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct BackendError {
    /// High-level error category.
    #[serde(default)]
    pub category: BackendErrorCategory,
    /// Stable machine-readable error kind.
    pub code: String,
    /// Arguments the backend attached to the error.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl BackendError {
    /// Construct a new backend error.
    pub fn new(
        category: BackendErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            args: Vec::new(),
            message: message.into(),
        }
    }

    /// Build an error from a backend `(errorKind, errorArgs)` pair.
    pub fn from_kind(code: impl Into<String>, args: Vec<Value>) -> Self {
        let code = code.into();
        let message = args
            .iter()
            .map(|arg| match arg {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            category: classify_error_kind(&code),
            code,
            args,
            message,
        }
    }

    /// Attach error arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Error for a completion callback that carried neither a result nor an error.
    pub fn empty_completion() -> Self {
        Self::new(
            BackendErrorCategory::Internal,
            "empty_completion",
            "backend call completed without result or error",
        )
    }
}

/// Map backend error kinds to error categories.
pub fn classify_error_kind(code: &str) -> BackendErrorCategory {
    match code {
        "M_UNKNOWN_TOKEN" | "M_UNAUTHORIZED" | "M_FORBIDDEN" | "M_USER_DEACTIVATED" => {
            BackendErrorCategory::Auth
        }
        "M_LIMIT_EXCEEDED" => BackendErrorCategory::RateLimited,
        "M_NOT_FOUND" | "UserNotFound" => BackendErrorCategory::NotFound,
        "M_BAD_JSON" | "M_NOT_JSON" | "M_TOO_LARGE" | "M_UNRECOGNIZED" | "M_INVALID_PARAM"
        | "InvalidUserId" | "InvalidUserInContext" | "UserFromOtherServerDisallowed"
        | "BadMimeType" => BackendErrorCategory::Config,
        "M_BAD_GATEWAY" | "ConnectionError" | "TimeoutError" => BackendErrorCategory::Network,
        code if code.starts_with("Olm") || code.starts_with("Megolm") => {
            BackendErrorCategory::Crypto
        }
        _ => BackendErrorCategory::Internal,
    }
}
