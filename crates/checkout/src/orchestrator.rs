//! Checkout orchestration: all-or-nothing reservation plus order insert.

use common::{CustomerId, Money, OrderId, ProductId};
use inventory::ReservationService;
use store::{Order, OrderItem, OrderStatus, PaymentMethod, Product, ShippingAddress, Store};

use crate::error::CheckoutError;
use crate::services::{CartService, NotificationService};

/// One requested line item in a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Where the checkout originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutSource {
    /// Checkout of the customer's cart; the cart is cleared afterwards.
    #[default]
    Cart,

    /// Direct purchase bypassing the cart.
    BuyNow,
}

/// A checkout request as handed over by the cart/buy-now collaborator.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub source: CheckoutSource,
}

/// The outcome of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total: Money,
    pub status: OrderStatus,
}

/// Turns a list of requested items into a persisted order with every
/// backing reservation held, or fails with no partial reservations left
/// behind.
///
/// All reservation calls and the order insert share one store transaction;
/// the first item that cannot be reserved aborts the transaction, undoing
/// every reservation made by earlier items in the same attempt.
pub struct CheckoutService<S, N, C>
where
    S: Store,
    N: NotificationService,
    C: CartService,
{
    store: S,
    reservations: ReservationService<S>,
    notifier: N,
    carts: C,
}

impl<S, N, C> CheckoutService<S, N, C>
where
    S: Store + Clone,
    N: NotificationService,
    C: CartService,
{
    /// Creates a new checkout service.
    pub fn new(store: S, notifier: N, carts: C) -> Self {
        let reservations = ReservationService::new(store.clone());
        Self {
            store,
            reservations,
            notifier,
            carts,
        }
    }

    /// Executes a checkout end to end.
    ///
    /// Insufficient stock is a terminal business outcome returned to the
    /// caller as-is, never retried here. Post-commit side effects (cart
    /// clearing, notifications) are best-effort and never fail the
    /// checkout.
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CheckoutError> {
        metrics::counter!("checkout_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run_checkout(request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::counter!("checkout_failed").increment(1);
        }
        result
    }

    async fn run_checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }
        for item in &request.items {
            if item.quantity == 0 {
                return Err(CheckoutError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
        }

        // 1. Resolve every item to its live product; an inactive product
        //    rejects the whole checkout before anything is reserved.
        let mut resolved: Vec<(CheckoutItem, Product)> = Vec::with_capacity(request.items.len());
        for item in request.items {
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| {
                    CheckoutError::Store(store::StoreError::ProductNotFound(item.product_id))
                })?;
            if !product.is_active {
                return Err(CheckoutError::ProductUnavailable {
                    product_id: item.product_id,
                    title: product.title,
                });
            }
            resolved.push((item, product));
        }

        // 2. Reserve every item and insert the order in one transaction.
        let mut tx = self.store.begin().await?;

        for (item, product) in &resolved {
            let reserved = match (&item.size, &item.color) {
                (Some(size), Some(color)) if product.has_variants() => {
                    self.reservations
                        .reserve_variant(&mut tx, item.product_id, size, color, item.quantity)
                        .await
                }
                _ => {
                    self.reservations
                        .reserve_product(&mut tx, item.product_id, item.quantity)
                        .await
                }
            };

            match reserved {
                Ok(true) => {}
                Ok(false) => {
                    self.abort(tx).await;
                    tracing::info!(
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        "checkout rejected, insufficient stock"
                    );
                    return Err(insufficient_stock_error(item, product));
                }
                Err(e) => {
                    self.abort(tx).await;
                    return Err(e.into());
                }
            }
        }

        let items: Vec<OrderItem> = resolved
            .iter()
            .map(|(item, product)| {
                let mut snapshot = OrderItem::new(
                    item.product_id,
                    product.title.clone(),
                    item.quantity,
                    product.price,
                );
                if let (Some(size), Some(color)) = (&item.size, &item.color) {
                    snapshot = snapshot.with_variant(size.clone(), color.clone());
                }
                if let Some(image) = &product.image {
                    snapshot = snapshot.with_image(image.clone());
                }
                snapshot
            })
            .collect();

        let order = Order::new(
            request.customer_id,
            items,
            request.shipping_address,
            request.payment_method,
        );

        if let Err(e) = self.store.insert_order(&mut tx, &order).await {
            self.abort(tx).await;
            return Err(e.into());
        }
        self.store.commit(tx).await?;

        tracing::info!(
            order_id = %order.order_id,
            total_cents = order.total.cents(),
            item_count = order.items.len(),
            "order created"
        );

        // 3. Best-effort side effects after the commit.
        if request.source == CheckoutSource::Cart
            && let Err(e) = self.carts.clear_cart(request.customer_id).await
        {
            tracing::warn!(
                error = %e,
                customer_id = %request.customer_id,
                "failed to clear cart after checkout"
            );
        }
        if let Err(e) = self.notifier.order_created(&order).await {
            tracing::warn!(
                error = %e,
                order_id = %order.order_id,
                "failed to publish order_created"
            );
        }

        Ok(CheckoutReceipt {
            order_id: order.order_id,
            total: order.total,
            status: order.status,
        })
    }

    /// Rolls the transaction back; a rollback failure must not mask the
    /// semantic error that triggered it.
    async fn abort(&self, tx: S::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            tracing::warn!(error = %e, "checkout rollback failed");
        }
    }
}

fn insufficient_stock_error(item: &CheckoutItem, product: &Product) -> CheckoutError {
    match (&item.size, &item.color) {
        (Some(size), Some(color)) if product.has_variants() => {
            CheckoutError::InsufficientVariantStock {
                product_id: item.product_id,
                title: product.title.clone(),
                size: size.clone(),
                color: color.clone(),
                requested: item.quantity,
            }
        }
        _ => CheckoutError::InsufficientStock {
            product_id: item.product_id,
            title: product.title.clone(),
            requested: item.quantity,
        },
    }
}
