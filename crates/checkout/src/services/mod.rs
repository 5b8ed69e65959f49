//! Collaborator service traits with in-memory implementations.

pub mod cart;
pub mod notification;

pub use cart::{CartService, InMemoryCartService};
pub use notification::{InMemoryNotificationService, NotificationEvent, NotificationService};
