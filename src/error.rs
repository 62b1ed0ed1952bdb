//! Error and diagnostic types.

use thiserror::Error;

/// Failure of an action body, or of dispatching to an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

/// Errors raised by a devtools transport.
#[derive(Debug, Error)]
pub enum DevToolsError {
    #[error("devtools connection failed: {0}")]
    Connect(String),

    #[error("devtools send failed: {0}")]
    Send(String),

    #[error("devtools payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misconfigurations detected while creating a store.
///
/// Diagnostics are never fatal: the store is still built. They are only
/// produced in development environments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreDiagnostic {
    #[error("[{store}] setup returned a pending value; setup must return plain state")]
    PendingState { store: String },

    #[error("[{store}] state holds a reactive value at `{field}`; setup must return plain data")]
    ReactiveField { store: String, field: String },

    #[error("[{store}] state holds a function at `{field}`; state should only hold data")]
    FunctionField { store: String, field: String },

    #[error("[{store}] duplicate key `{key}` in state and actions")]
    DuplicateKey { store: String, key: String },

    #[error("[{store}] namespace `{namespace}` is already in use")]
    DuplicateNamespace { store: String, namespace: String },

    #[error("[{store}] middleware is not supported by create_store; use create_state")]
    MiddlewareUnsupported { store: String },

    #[error("[{store}] expected a reactive state but got a plain one")]
    ExpectedReactive { store: String },
}

impl StoreDiagnostic {
    /// Name of the store the diagnostic is about.
    pub fn store(&self) -> &str {
        match self {
            StoreDiagnostic::PendingState { store }
            | StoreDiagnostic::ReactiveField { store, .. }
            | StoreDiagnostic::FunctionField { store, .. }
            | StoreDiagnostic::DuplicateKey { store, .. }
            | StoreDiagnostic::DuplicateNamespace { store, .. }
            | StoreDiagnostic::MiddlewareUnsupported { store }
            | StoreDiagnostic::ExpectedReactive { store } => store,
        }
    }

    /// Whether this is reported as an error rather than a warning.
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            StoreDiagnostic::DuplicateKey { .. } | StoreDiagnostic::DuplicateNamespace { .. }
        )
    }
}
