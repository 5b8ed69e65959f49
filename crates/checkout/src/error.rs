//! Checkout and status-transition error types.

use common::{OrderId, ProductId};
use store::{OrderStatus, StoreError};
use thiserror::Error;

/// Errors that can occur during checkout or order status updates.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The checkout request carried no items.
    #[error("Checkout has no items")]
    EmptyOrder,

    /// A requested quantity was zero.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// The product exists but is not currently purchasable.
    #[error("Product unavailable: '{title}' ({product_id})")]
    ProductUnavailable {
        product_id: ProductId,
        title: String,
    },

    /// A top-level reservation could not be satisfied.
    #[error("Insufficient stock for '{title}' ({product_id}): requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        title: String,
        requested: u32,
    },

    /// A variant reservation could not be satisfied.
    #[error(
        "Insufficient stock for '{title}' ({product_id}) variant {size}/{color}: requested {requested}"
    )]
    InsufficientVariantStock {
        product_id: ProductId,
        title: String,
        size: String,
        color: String,
        requested: u32,
    },

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status change violates the state machine rules.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Notification collaborator error. Never fails a checkout; logged by
    /// the caller.
    #[error("Notification service error: {0}")]
    Notification(String),

    /// Cart collaborator error. Never fails a checkout; logged by the
    /// caller.
    #[error("Cart service error: {0}")]
    Cart(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
