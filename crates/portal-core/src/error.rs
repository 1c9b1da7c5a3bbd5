use crate::models::NotificationId;

/// Failure reported by a notification service implementation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a fetch that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Superseded by a newer call in the same category, or torn down.
    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Errors surfaced to the owning UI through `FeedSnapshot::error`.
///
/// Cancellation never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to load notifications: {0}")]
    Transient(ServiceError),

    #[error("Failed to mark notification {id} as read: {source}")]
    Mutation {
        id: NotificationId,
        source: ServiceError,
    },
}
