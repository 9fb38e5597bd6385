//! Error types.
//!
//! Nothing in this crate propagates a failure that originated in user code
//! it isolates. Failed scheduler jobs and render functions are logged and
//! reported as values of [`Error`]; the only error returned directly to a
//! caller is misuse of a state wrapper.

use std::any::Any;

/// Errors produced by the reactive core and the renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A computed built without a setter was written to.
    #[error("computed value is readonly")]
    ReadonlyComputed,

    /// A scheduler job panicked. The remaining jobs of the flush still ran.
    #[error("job {job} panicked: {message}")]
    JobPanicked {
        /// Label (or numeric ID) of the failed job.
        job: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// A component render function panicked. The previous tree was kept.
    #[error("render of component `{component}` panicked: {message}")]
    RenderPanicked {
        /// Name of the component whose render failed.
        component: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// Jobs kept re-queueing themselves past the flush budget.
    #[error("scheduler did not settle after {limit} flushes")]
    RecursionLimit {
        /// The flush budget that was exceeded.
        limit: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
