//! Notification service trait and in-memory implementation.
//!
//! Notifications are fire-and-forget side effects: the orchestrator and
//! status service log failures and never let them fail the operation that
//! triggered them.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use store::{Order, OrderStatus};

use crate::error::CheckoutError;

/// An event emitted to the notification collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// A checkout completed and an order was persisted.
    OrderCreated {
        order_id: OrderId,
        total_cents: i64,
    },

    /// An order moved to a new status.
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A product or variant's available stock reached zero after a
    /// finalize.
    StockDepleted {
        product_id: ProductId,
        size: Option<String>,
        color: Option<String>,
    },
}

/// Trait for the notification collaborator (email/socket delivery lives
/// behind it, out of scope here).
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Announces a freshly created order.
    async fn order_created(&self, order: &Order) -> Result<(), CheckoutError>;

    /// Announces an order status change.
    async fn order_status_changed(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), CheckoutError>;

    /// Announces that a product or variant sold out.
    async fn stock_depleted(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    events: Vec<NotificationEvent>,
    fail_on_publish: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on every publish call.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all recorded events.
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.state.read().unwrap().events.clone()
    }

    /// Returns the number of recorded events.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().events.len()
    }

    fn record(&self, event: NotificationEvent) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(CheckoutError::Notification(
                "notification channel down".to_string(),
            ));
        }
        state.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn order_created(&self, order: &Order) -> Result<(), CheckoutError> {
        self.record(NotificationEvent::OrderCreated {
            order_id: order.order_id,
            total_cents: order.total.cents(),
        })
    }

    async fn order_status_changed(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), CheckoutError> {
        self.record(NotificationEvent::OrderStatusChanged { order_id, from, to })
    }

    async fn stock_depleted(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), CheckoutError> {
        self.record(NotificationEvent::StockDepleted {
            product_id,
            size: size.map(str::to_string),
            color: color.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_status_change() {
        let service = InMemoryNotificationService::new();
        let order_id = OrderId::new();

        service
            .order_status_changed(order_id, OrderStatus::Pending, OrderStatus::Paid)
            .await
            .unwrap();

        assert_eq!(service.event_count(), 1);
        assert_eq!(
            service.events()[0],
            NotificationEvent::OrderStatusChanged {
                order_id,
                from: OrderStatus::Pending,
                to: OrderStatus::Paid,
            }
        );
    }

    #[tokio::test]
    async fn test_fail_on_publish() {
        let service = InMemoryNotificationService::new();
        service.set_fail_on_publish(true);

        let result = service
            .stock_depleted(ProductId::new(), Some("M"), Some("Red"))
            .await;
        assert!(result.is_err());
        assert_eq!(service.event_count(), 0);
    }
}
