//! Order status transitions and one-shot inventory settlement.

use common::{OrderId, ProductId};
use inventory::ReservationService;
use store::{InventoryEffect, Order, OrderStatus, Store, StoreError};

use crate::error::CheckoutError;
use crate::services::NotificationService;

/// Variant coordinates of a stock position that sold out during a
/// finalize, carried out of the transaction for notification.
type DepletedPosition = (ProductId, Option<String>, Option<String>);

/// Applies order status transitions and their inventory effects.
///
/// Entering `Paid`/`Shipped`/`Delivered` finalizes every item's hold;
/// entering `Cancelled` releases it. Both effects are guarded by the
/// order's one-shot `inventory_processed` flag, claimed with an atomic
/// conditional update so two concurrent status calls settle inventory at
/// most once between them.
pub struct StatusService<S, N>
where
    S: Store,
    N: NotificationService,
{
    store: S,
    reservations: ReservationService<S>,
    notifier: N,
}

impl<S, N> StatusService<S, N>
where
    S: Store + Clone,
    N: NotificationService,
{
    /// Creates a new status service.
    pub fn new(store: S, notifier: N) -> Self {
        let reservations = ReservationService::new(store.clone());
        Self {
            store,
            reservations,
            notifier,
        }
    }

    /// Moves an order to `new_status`, settling inventory when the
    /// transition requires it, and returns the updated order.
    ///
    /// An illegal transition fails with `InvalidTransition` and leaves
    /// the order untouched. Ledger corruption discovered during a
    /// finalize aborts the whole transition and is surfaced, never
    /// swallowed.
    #[tracing::instrument(skip(self, reason))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order, CheckoutError> {
        metrics::counter!("status_transitions_total").increment(1);

        let mut tx = self.store.begin().await?;

        let order = match self.store.get_order_in_tx(&mut tx, order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                self.abort(tx).await;
                return Err(CheckoutError::OrderNotFound(order_id));
            }
            Err(e) => {
                self.abort(tx).await;
                return Err(e.into());
            }
        };

        if !order.status.can_transition(new_status) {
            self.abort(tx).await;
            tracing::info!(
                %order_id,
                from = %order.status,
                to = %new_status,
                "status transition rejected"
            );
            return Err(CheckoutError::InvalidTransition {
                order_id,
                from: order.status,
                to: new_status,
            });
        }

        let mut depleted: Vec<DepletedPosition> = Vec::new();

        if let Some(effect) = new_status.inventory_effect() {
            match self.store.claim_inventory_processed(&mut tx, order_id).await {
                // This caller won the one-shot flag; apply the effect.
                Ok(true) => {
                    if let Err(e) = self
                        .apply_effect(&mut tx, &order, effect, &mut depleted)
                        .await
                    {
                        if matches!(e, CheckoutError::Store(StoreError::LedgerCorruption { .. })) {
                            tracing::error!(
                                error = %e,
                                %order_id,
                                "stock ledger corruption during settlement"
                            );
                        }
                        self.abort(tx).await;
                        return Err(e);
                    }
                }
                // Already settled by an earlier transition; skip.
                Ok(false) => {
                    tracing::debug!(%order_id, "inventory already settled, skipping effect");
                }
                Err(e) => {
                    self.abort(tx).await;
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = self
            .store
            .set_order_status(&mut tx, order_id, new_status, reason.as_deref())
            .await
        {
            self.abort(tx).await;
            return Err(e.into());
        }
        self.store.commit(tx).await?;

        let old_status = order.status;
        tracing::info!(%order_id, from = %old_status, to = %new_status, "order status changed");

        if let Err(e) = self
            .notifier
            .order_status_changed(order_id, old_status, new_status)
            .await
        {
            tracing::warn!(error = %e, %order_id, "failed to publish order_status_changed");
        }
        for (product_id, size, color) in depleted {
            if let Err(e) = self
                .notifier
                .stock_depleted(product_id, size.as_deref(), color.as_deref())
                .await
            {
                tracing::warn!(error = %e, %product_id, "failed to publish product_stock_depleted");
            }
        }

        self.store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Finalizes or releases every item of the order inside the
    /// transaction, recording positions that sold out.
    async fn apply_effect(
        &self,
        tx: &mut S::Tx,
        order: &Order,
        effect: InventoryEffect,
        depleted: &mut Vec<DepletedPosition>,
    ) -> Result<(), CheckoutError> {
        for item in &order.items {
            match effect {
                InventoryEffect::Finalize => {
                    let level = match (&item.size, &item.color) {
                        (Some(size), Some(color)) => {
                            self.reservations
                                .finalize_variant(tx, item.product_id, size, color, item.quantity)
                                .await?
                        }
                        _ => {
                            self.reservations
                                .finalize_product(tx, item.product_id, item.quantity)
                                .await?
                        }
                    };
                    if level.available() == 0 {
                        depleted.push((item.product_id, item.size.clone(), item.color.clone()));
                    }
                }
                InventoryEffect::Release => match (&item.size, &item.color) {
                    (Some(size), Some(color)) => {
                        self.reservations
                            .release_variant(tx, item.product_id, size, color, item.quantity)
                            .await?
                    }
                    _ => {
                        self.reservations
                            .release_product(tx, item.product_id, item.quantity)
                            .await?
                    }
                },
            }
        }
        Ok(())
    }

    async fn abort(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            tracing::warn!(error = %e, "status update rollback failed");
        }
    }
}
