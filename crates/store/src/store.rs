use async_trait::async_trait;

use common::{OrderId, ProductId};

use crate::{Order, OrderStatus, Product, Result, StockLevel};

/// Scope of a stock operation: the product's top-level counters or a
/// single variant inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockSelector {
    /// The top-level counters (simple-product path).
    Product,

    /// One size/color variant, matched case-insensitively.
    Variant { size: String, color: String },
}

impl StockSelector {
    /// Creates a variant selector.
    pub fn variant(size: impl Into<String>, color: impl Into<String>) -> Self {
        StockSelector::Variant {
            size: size.into(),
            color: color.into(),
        }
    }
}

impl std::fmt::Display for StockSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockSelector::Product => write!(f, "product"),
            StockSelector::Variant { size, color } => write!(f, "variant {size}/{color}"),
        }
    }
}

/// Core trait for ledger and order persistence.
///
/// Mutations run inside an explicit transaction handle obtained from
/// [`Store::begin`]; either every write in the handle commits or none do.
/// The stock operations must each be individually atomic with respect to
/// the same product/variant: `try_reserve` in particular is a single
/// indivisible conditional check-and-increment, never a read followed by
/// a write.
#[async_trait]
pub trait Store: Send + Sync {
    /// Transaction handle spanning a group of writes.
    type Tx: Send;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Commits every write made through the handle.
    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    /// Discards every write made through the handle.
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    /// Persists a new product, recomputing its derived aggregates.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Loads a product by ID.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Loads a product by ID from inside a transaction.
    async fn get_product_in_tx(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<Product>>;

    /// Atomically reserves `quantity` units if `stock - reserved_stock`
    /// allows it.
    ///
    /// Returns `false` without mutating anything when availability is
    /// insufficient. Fails with `VariantNotFound` when a variant selector
    /// names a variant the product does not have.
    async fn try_reserve(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<bool>;

    /// Returns `quantity` held units to availability, clamping the
    /// reserved counter at zero. Physical stock is untouched.
    async fn release(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<()>;

    /// Permanently removes `quantity` units from both physical stock and
    /// the reserved counter, returning the counters left behind.
    ///
    /// Fails with `LedgerCorruption` when physical stock is short, which
    /// cannot happen if a reservation preceded the call.
    async fn finalize(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<StockLevel>;

    /// Stages a new order inside the transaction.
    async fn insert_order(&self, tx: &mut Self::Tx, order: &Order) -> Result<()>;

    /// Loads an order by ID.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by ID from inside a transaction, locking the row
    /// against concurrent status updates where the backend supports it.
    async fn get_order_in_tx(&self, tx: &mut Self::Tx, order_id: OrderId)
    -> Result<Option<Order>>;

    /// Atomically claims the order's one-shot settlement flag.
    ///
    /// Returns `true` only for the caller that flips the flag from false
    /// to true; every later caller gets `false` and must skip the
    /// inventory effect.
    async fn claim_inventory_processed(&self, tx: &mut Self::Tx, order_id: OrderId)
    -> Result<bool>;

    /// Updates the order's status field and transition reason.
    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<()>;

    /// Administrative stock override for external correction tooling.
    ///
    /// Deliberately bypasses the reservation invariant checks; the write
    /// is logged so it never happens silently.
    async fn overwrite_stock(
        &self,
        product_id: ProductId,
        selector: &StockSelector,
        stock: u32,
        reserved: u32,
    ) -> Result<()>;
}
