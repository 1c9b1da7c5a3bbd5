pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod sync;
pub mod tracing_setup;

pub use config::{FeedConfig, PortalConfig, ServiceConfig};
pub use engine::NotificationFeed;
pub use error::{FetchError, ServiceError, SyncError};
pub use models::{FeedSnapshot, NotificationEntry, NotificationId};
pub use service::{DynNotificationService, HttpNotificationService, NotificationService};
