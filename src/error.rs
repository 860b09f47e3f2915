use thiserror::Error;

/// Error type a listener may return to abort a dispatch round
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when using a [`Store`](crate::Store) or [`Notifier`](crate::Notifier)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to acquire lock on the store
    #[error("Failed to acquire lock")]
    LockError,
    /// A listener failed while handling an event; later listeners were not invoked
    #[error("Listener for '{event}' failed: {source}")]
    Listener {
        event: String,
        #[source]
        source: ListenerError,
    },
    /// A batch update was given something other than a JSON object
    #[error("Expected an object of key/value pairs, got {0}")]
    NotAnObject(String),
}
