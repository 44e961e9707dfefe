//! Best-effort notification delivery.
//!
//! [`NotificationDispatcher`] hands `(title, body)` to a
//! [`NotificationSender`] on a detached task. Delivery is attempted once;
//! failures are logged and counted, never retried. The per-client
//! `repeat_interval` throttle is the only recovery path for a lost message.

mod dispatcher;
mod sender;
pub use dispatcher::*;
pub use sender::*;


pub const TEST_NOTIFICATION_TITLE: &str = "Deadman test notification.";
pub const TEST_NOTIFICATION_BODY: &str =
    "This is a test notification automatically generated by deadman.";
