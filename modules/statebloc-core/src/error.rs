//! Typed errors for state transitions.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

/// Every failure the engine observes. Cloneable so it can be broadcast on the
/// error stream and handed to delegates.
#[derive(Debug, Clone, Error)]
pub enum BlocError {
    /// A mapping function failed (synchronously, via a rejected future, or
    /// via an error emission on a stream).
    #[error("processing error: {0}")]
    Processing(Arc<anyhow::Error>),

    /// The mapping function explicitly opted out of an event type.
    #[error("unsupported event: {event_type}")]
    UnsupportedEvent { event_type: String },

    /// A delegate hook failed or panicked.
    #[error("delegate hook {hook} failed: {source}")]
    DelegateHook {
        hook: &'static str,
        #[source]
        source: Box<BlocError>,
    },

    /// A plain string error, wrapped.
    #[error("{0}")]
    Message(String),

    /// `dispatch_payload` was used without an event factory.
    #[error("no event factory configured")]
    MissingEventFactory,

    /// Neither an initial state nor a state builder was supplied.
    #[error("no initial state or state builder configured")]
    MissingDefaultState,

    #[error("configuration error: {0}")]
    Config(String),
}

impl BlocError {
    pub fn processing(error: impl Into<anyhow::Error>) -> Self {
        BlocError::Processing(Arc::new(error.into()))
    }

    pub(crate) fn hook(hook: &'static str, source: BlocError) -> Self {
        BlocError::DelegateHook {
            hook,
            source: Box::new(source),
        }
    }

    /// A panic caught while running a mapper or a hook.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        BlocError::processing(anyhow::anyhow!("panicked: {message}"))
    }
}

/// Run a synchronous hook, turning a panic into an error.
pub(crate) fn guarded<T>(f: impl FnOnce() -> T) -> BlocResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(BlocError::from_panic)
}

impl From<anyhow::Error> for BlocError {
    fn from(error: anyhow::Error) -> Self {
        BlocError::Processing(Arc::new(error))
    }
}

impl From<String> for BlocError {
    fn from(message: String) -> Self {
        BlocError::Message(message)
    }
}

impl From<&str> for BlocError {
    fn from(message: &str) -> Self {
        BlocError::Message(message.to_string())
    }
}

/// Result type alias for engine operations.
pub type BlocResult<T> = std::result::Result<T, BlocError>;
