use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The referenced variant does not exist on the product.
    #[error("Variant not found on product {product_id}: size={size}, color={color}")]
    VariantNotFound {
        product_id: ProductId,
        size: String,
        color: String,
    },

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A stock counter was observed in a state the invariants forbid.
    /// Indicates a bug rather than a user-facing business condition.
    #[error("Stock ledger corruption on product {product_id}: {detail}")]
    LedgerCorruption {
        product_id: ProductId,
        detail: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
