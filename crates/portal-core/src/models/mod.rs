pub mod notification;

pub use notification::{FeedSnapshot, NotificationEntry, NotificationId};
