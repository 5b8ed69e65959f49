//! Reservation service over any [`Store`] backend.

use common::ProductId;
use store::{Result, StockLevel, StockSelector, Store, StoreError};

/// Atomic reserve/release/finalize operations against the stock ledger.
///
/// Concurrent callers can never together reserve more than `stock` units
/// of one product/variant: the store's conditional check-and-increment
/// serializes them, so the racer that would push the reserved counter
/// past physical stock observes the updated counter and gets `false`.
///
/// All operations run inside a caller-supplied transaction handle so the
/// checkout orchestrator can group several of them into one unit of work.
pub struct ReservationService<S: Store> {
    store: S,
}

impl<S: Store + Clone> Clone for ReservationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> ReservationService<S> {
    /// Creates a new reservation service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Atomically holds `quantity` units of the product's top-level stock.
    ///
    /// Returns `false` without mutating anything when availability is
    /// insufficient; insufficient stock is a business outcome, not an error.
    #[tracing::instrument(skip(self, tx))]
    pub async fn reserve_product(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool> {
        metrics::counter!("reservations_total").increment(1);

        let reserved = self
            .store
            .try_reserve(tx, product_id, &StockSelector::Product, quantity)
            .await?;

        if !reserved {
            metrics::counter!("reservation_conflicts_total").increment(1);
            tracing::debug!(%product_id, quantity, "reservation refused, insufficient stock");
        }
        Ok(reserved)
    }

    /// Atomically holds `quantity` units of one size/color variant.
    ///
    /// Size and color are matched case-insensitively. Fails with
    /// `VariantNotFound` when the product has variants but none match;
    /// falls back to the top-level counters when the product has no
    /// variants at all.
    #[tracing::instrument(skip(self, tx))]
    pub async fn reserve_variant(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> Result<bool> {
        match self.variant_selector(tx, product_id, size, color).await? {
            Some(selector) => {
                metrics::counter!("reservations_total").increment(1);
                let reserved = self
                    .store
                    .try_reserve(tx, product_id, &selector, quantity)
                    .await?;
                if !reserved {
                    metrics::counter!("reservation_conflicts_total").increment(1);
                    tracing::debug!(
                        %product_id, size, color, quantity,
                        "reservation refused, insufficient stock"
                    );
                }
                Ok(reserved)
            }
            None => self.reserve_product(tx, product_id, quantity).await,
        }
    }

    /// Returns `quantity` held units of top-level stock to availability.
    #[tracing::instrument(skip(self, tx))]
    pub async fn release_product(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        metrics::counter!("inventory_released_total").increment(u64::from(quantity));
        self.store
            .release(tx, product_id, &StockSelector::Product, quantity)
            .await
    }

    /// Returns `quantity` held units of one variant to availability.
    #[tracing::instrument(skip(self, tx))]
    pub async fn release_variant(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> Result<()> {
        match self.variant_selector(tx, product_id, size, color).await? {
            Some(selector) => {
                metrics::counter!("inventory_released_total").increment(u64::from(quantity));
                self.store.release(tx, product_id, &selector, quantity).await
            }
            None => self.release_product(tx, product_id, quantity).await,
        }
    }

    /// Permanently deducts `quantity` units of top-level stock and clears
    /// the corresponding hold.
    #[tracing::instrument(skip(self, tx))]
    pub async fn finalize_product(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockLevel> {
        metrics::counter!("inventory_finalized_total").increment(u64::from(quantity));
        self.store
            .finalize(tx, product_id, &StockSelector::Product, quantity)
            .await
    }

    /// Permanently deducts `quantity` units of one variant and clears the
    /// corresponding hold.
    #[tracing::instrument(skip(self, tx))]
    pub async fn finalize_variant(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> Result<StockLevel> {
        match self.variant_selector(tx, product_id, size, color).await? {
            Some(selector) => {
                metrics::counter!("inventory_finalized_total").increment(u64::from(quantity));
                self.store.finalize(tx, product_id, &selector, quantity).await
            }
            None => self.finalize_product(tx, product_id, quantity).await,
        }
    }

    /// Resolves the selector for a variant-scoped call: `Some` when the
    /// product tracks stock per variant, `None` when the call should fall
    /// back to the top-level counters.
    async fn variant_selector(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        size: &str,
        color: &str,
    ) -> Result<Option<StockSelector>> {
        let product = self
            .store
            .get_product_in_tx(tx, product_id)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if product.has_variants() {
            Ok(Some(StockSelector::variant(size, color)))
        } else {
            Ok(None)
        }
    }
}
