use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{OrderId, ProductId};

use crate::{
    Order, OrderStatus, Product, Result, StockLevel, StoreError,
    store::{StockSelector, Store},
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store implementation for testing.
///
/// Stock mutations are applied eagerly under a single write lock, which
/// makes each operation atomic with respect to concurrent callers; the
/// transaction handle records enough state to undo them. A handle that is
/// dropped without committing undoes its writes, matching the rollback
/// behavior of a dropped database transaction. Order inserts are staged
/// on the handle and only become visible at commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

/// Transaction handle for [`InMemoryStore`]. Rolls back on drop unless
/// committed.
#[derive(Debug)]
pub struct MemoryTx {
    state: Arc<RwLock<MemoryState>>,
    undo: Vec<UndoOp>,
    staged_orders: Vec<Order>,
}

/// Snapshot of the state a write replaced, applied in reverse on rollback.
#[derive(Debug)]
enum UndoOp {
    StockWas {
        product_id: ProductId,
        selector: StockSelector,
        stock: u32,
        reserved: u32,
    },
    OrderWas {
        order_id: OrderId,
        status: OrderStatus,
        inventory_processed: bool,
        status_reason: Option<String>,
        updated_at: DateTime<Utc>,
    },
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        let mut state = self.state.write().unwrap();
        for op in self.undo.drain(..).rev() {
            apply_undo(&mut state, op);
        }
    }
}

fn apply_undo(state: &mut MemoryState, op: UndoOp) {
    match op {
        UndoOp::StockWas {
            product_id,
            selector,
            stock,
            reserved,
        } => {
            if let Some(product) = state.products.get_mut(&product_id) {
                match &selector {
                    StockSelector::Product => {
                        product.stock = stock;
                        product.reserved_stock = reserved;
                    }
                    StockSelector::Variant { size, color } => {
                        if let Some(variant) = product.find_variant_mut(size, color) {
                            variant.stock = stock;
                            variant.reserved_stock = reserved;
                        }
                    }
                }
                product.recompute_aggregates();
            }
        }
        UndoOp::OrderWas {
            order_id,
            status,
            inventory_processed,
            status_reason,
            updated_at,
        } => {
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.status = status;
                order.inventory_processed = inventory_processed;
                order.status_reason = status_reason;
                order.updated_at = updated_at;
            }
        }
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed products.
    pub async fn product_count(&self) -> usize {
        self.state.read().unwrap().products.len()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Clears all products and orders.
    pub async fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.products.clear();
        state.orders.clear();
    }
}

/// Reads the counters the selector points at, for undo journaling.
fn current_counters(product: &Product, selector: &StockSelector) -> Option<(u32, u32)> {
    match selector {
        StockSelector::Product => Some((product.stock, product.reserved_stock)),
        StockSelector::Variant { size, color } => product
            .find_variant(size, color)
            .map(|v| (v.stock, v.reserved_stock)),
    }
}

fn variant_not_found(product_id: ProductId, selector: &StockSelector) -> StoreError {
    match selector {
        StockSelector::Variant { size, color } => StoreError::VariantNotFound {
            product_id,
            size: size.clone(),
            color: color.clone(),
        },
        StockSelector::Product => StoreError::ProductNotFound(product_id),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(MemoryTx {
            state: self.state.clone(),
            undo: Vec::new(),
            staged_orders: Vec::new(),
        })
    }

    async fn commit(&self, mut tx: Self::Tx) -> Result<()> {
        let mut state = self.state.write().unwrap();
        for order in tx.staged_orders.drain(..) {
            state.orders.insert(order.order_id, order);
        }
        // Writes are already applied; dropping the emptied journal keeps
        // them.
        tx.undo.clear();
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        // The drop handler replays the undo journal.
        drop(tx);
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut stored = product.clone();
        stored.recompute_aggregates();
        self.state
            .write()
            .unwrap()
            .products
            .insert(stored.id, stored);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().unwrap().products.get(&product_id).cloned())
    }

    async fn get_product_in_tx(
        &self,
        _tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<Product>> {
        // Writes are applied eagerly, so the committed view is the
        // transactional view.
        self.get_product(product_id).await
    }

    async fn try_reserve(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<bool> {
        let mut state = self.state.write().unwrap();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        let (stock, reserved) = current_counters(product, selector)
            .ok_or_else(|| variant_not_found(product_id, selector))?;

        if stock.saturating_sub(reserved) < quantity {
            return Ok(false);
        }

        tx.undo.push(UndoOp::StockWas {
            product_id,
            selector: selector.clone(),
            stock,
            reserved,
        });

        match selector {
            StockSelector::Product => product.reserved_stock = reserved + quantity,
            StockSelector::Variant { size, color } => {
                if let Some(variant) = product.find_variant_mut(size, color) {
                    variant.reserved_stock = reserved + quantity;
                }
            }
        }
        product.updated_at = Utc::now();

        Ok(true)
    }

    async fn release(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        let (stock, reserved) = current_counters(product, selector)
            .ok_or_else(|| variant_not_found(product_id, selector))?;

        tx.undo.push(UndoOp::StockWas {
            product_id,
            selector: selector.clone(),
            stock,
            reserved,
        });

        let new_reserved = reserved.saturating_sub(quantity);
        match selector {
            StockSelector::Product => product.reserved_stock = new_reserved,
            StockSelector::Variant { size, color } => {
                if let Some(variant) = product.find_variant_mut(size, color) {
                    variant.reserved_stock = new_reserved;
                }
            }
        }
        product.updated_at = Utc::now();

        Ok(())
    }

    async fn finalize(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<StockLevel> {
        let mut state = self.state.write().unwrap();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        let (stock, reserved) = current_counters(product, selector)
            .ok_or_else(|| variant_not_found(product_id, selector))?;

        if stock < quantity {
            return Err(StoreError::LedgerCorruption {
                product_id,
                detail: format!(
                    "finalize of {quantity} units exceeds physical stock {stock} ({selector})"
                ),
            });
        }

        tx.undo.push(UndoOp::StockWas {
            product_id,
            selector: selector.clone(),
            stock,
            reserved,
        });

        let level = StockLevel {
            stock: stock - quantity,
            reserved: reserved.saturating_sub(quantity),
        };
        match selector {
            StockSelector::Product => {
                product.stock = level.stock;
                product.reserved_stock = level.reserved;
            }
            StockSelector::Variant { size, color } => {
                if let Some(variant) = product.find_variant_mut(size, color) {
                    variant.stock = level.stock;
                    variant.reserved_stock = level.reserved;
                }
            }
        }
        product.recompute_aggregates();
        product.updated_at = Utc::now();

        Ok(level)
    }

    async fn insert_order(&self, tx: &mut Self::Tx, order: &Order) -> Result<()> {
        tx.staged_orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().unwrap().orders.get(&order_id).cloned())
    }

    async fn get_order_in_tx(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        if let Some(staged) = tx.staged_orders.iter().find(|o| o.order_id == order_id) {
            return Ok(Some(staged.clone()));
        }
        self.get_order(order_id).await
    }

    async fn claim_inventory_processed(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<bool> {
        let mut state = self.state.write().unwrap();
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.inventory_processed {
            return Ok(false);
        }

        tx.undo.push(UndoOp::OrderWas {
            order_id,
            status: order.status,
            inventory_processed: order.inventory_processed,
            status_reason: order.status_reason.clone(),
            updated_at: order.updated_at,
        });

        order.inventory_processed = true;
        order.updated_at = Utc::now();

        Ok(true)
    }

    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        tx.undo.push(UndoOp::OrderWas {
            order_id,
            status: order.status,
            inventory_processed: order.inventory_processed,
            status_reason: order.status_reason.clone(),
            updated_at: order.updated_at,
        });

        order.status = status;
        order.status_reason = reason.map(str::to_string);
        order.updated_at = Utc::now();

        Ok(())
    }

    async fn overwrite_stock(
        &self,
        product_id: ProductId,
        selector: &StockSelector,
        stock: u32,
        reserved: u32,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        match selector {
            StockSelector::Product => {
                product.stock = stock;
                product.reserved_stock = reserved;
            }
            StockSelector::Variant { size, color } => {
                let variant = product
                    .find_variant_mut(size, color)
                    .ok_or_else(|| variant_not_found(product_id, selector))?;
                variant.stock = stock;
                variant.reserved_stock = reserved;
            }
        }
        product.recompute_aggregates();
        product.updated_at = Utc::now();

        tracing::warn!(
            %product_id,
            %selector,
            stock,
            reserved,
            "administrative stock override applied, invariant checks bypassed"
        );

        Ok(())
    }
}
