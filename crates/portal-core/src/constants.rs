//! Application-wide constants
//!
//! Centralized location for default configuration values and service
//! paths that are used across multiple modules.

/// Default interval between background reconciliation passes
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;

/// Default page size for the first page (activation, refetch, poll)
pub const DEFAULT_INITIAL_LIMIT: usize = 10;

/// Default page size for `load_more`
pub const DEFAULT_LOAD_MORE_LIMIT: usize = 10;

/// Default per-request timeout for the HTTP notification service
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default base URL of the notification service
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Environment variable holding the log filter directive
pub const LOG_FILTER_ENV: &str = "PORTAL_LOG";

/// Environment variable enabling debug logging to a file
pub const LOG_FILE_ENV: &str = "PORTAL_LOG_FILE";

// Notification service routes, relative to the base URL
pub mod routes {
    /// Paged list: `?limit=&offset=`
    pub const NOTIFICATIONS: &str = "notifications";
    /// `{"count": n}`
    pub const UNREAD_COUNT: &str = "notifications/unread-count";
    /// Suffix appended to `notifications/{id}/`
    pub const MARK_READ_SUFFIX: &str = "read";
}
