//! Checkout orchestration and order fulfillment for the storefront system.
//!
//! This crate provides:
//! - The checkout orchestrator: all line-item reservations plus the order
//!   insert succeed as one unit of work, or none of them do
//! - The order status service: validated state transitions that finalize
//!   or release the backing reservations exactly once per order
//! - Collaborator seams (notifications, carts) with in-memory
//!   implementations for testing

pub mod error;
pub mod orchestrator;
pub mod services;
pub mod status;

pub use error::CheckoutError;
pub use orchestrator::{
    CheckoutItem, CheckoutReceipt, CheckoutRequest, CheckoutService, CheckoutSource,
};
pub use services::{
    CartService, InMemoryCartService, InMemoryNotificationService, NotificationEvent,
    NotificationService,
};
pub use status::StatusService;
