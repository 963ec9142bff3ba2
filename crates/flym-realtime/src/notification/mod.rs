//! Out-of-band notification delivery.

pub mod dispatcher;

pub use dispatcher::NotificationDispatcher;
