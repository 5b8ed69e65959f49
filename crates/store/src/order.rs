//! Orders and the order-status state machine.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// Transitions are validated by [`OrderStatus::can_transition`]; entering
/// `Paid`/`Shipped`/`Delivered` finalizes the order's inventory hold and
/// entering `Cancelled` releases it, each at most once per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, reservations held, awaiting payment.
    #[default]
    Pending,

    /// Payment captured.
    Paid,

    /// Order confirmed by the seller.
    Confirmed,

    /// Payment or confirmation failed.
    Failed,

    /// Order handed to fulfillment.
    Placed,

    /// Order shipped to the customer.
    Shipped,

    /// Order delivered (returns and exchanges only from here).
    Delivered,

    /// Order cancelled (terminal state).
    Cancelled,

    /// Customer asked to return the delivered order.
    ReturnRequested,

    /// Return request approved.
    ReturnApproved,

    /// Return request rejected.
    ReturnRejected,

    /// Customer asked to exchange the delivered order.
    ExchangeRequested,

    /// Exchange request approved.
    ExchangeApproved,

    /// Exchange request rejected.
    ExchangeRejected,
}

/// The inventory side effect of entering a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    /// Permanently deduct the held quantity from physical stock.
    Finalize,

    /// Undo the hold without touching physical stock.
    Release,
}

impl OrderStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns true for states that confirm fulfillment and settle inventory.
    pub fn is_fulfillment_confirmed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Returns true for the post-delivery return/exchange states.
    pub fn is_return_flow(&self) -> bool {
        matches!(
            self,
            OrderStatus::ReturnRequested
                | OrderStatus::ReturnApproved
                | OrderStatus::ReturnRejected
                | OrderStatus::ExchangeRequested
                | OrderStatus::ExchangeApproved
                | OrderStatus::ExchangeRejected
        )
    }

    /// Returns true if an order in this status may move to `to`.
    ///
    /// A delivered order can only be returned or exchanged, never
    /// cancelled; approval/rejection states are reachable only from their
    /// matching request.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        if *self == to {
            return false;
        }

        match to {
            // Initial state only; nothing transitions back to it.
            OrderStatus::Pending => false,

            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => {
                !self.is_terminal() && !self.is_return_flow()
            }

            OrderStatus::Confirmed | OrderStatus::Placed | OrderStatus::Failed => matches!(
                self,
                OrderStatus::Pending
                    | OrderStatus::Paid
                    | OrderStatus::Confirmed
                    | OrderStatus::Failed
                    | OrderStatus::Placed
            ),

            OrderStatus::Cancelled => {
                !self.is_terminal() && *self != OrderStatus::Delivered && !self.is_return_flow()
            }

            OrderStatus::ReturnRequested | OrderStatus::ExchangeRequested => {
                *self == OrderStatus::Delivered || self.is_return_flow()
            }

            OrderStatus::ReturnApproved | OrderStatus::ReturnRejected => {
                *self == OrderStatus::ReturnRequested
            }

            OrderStatus::ExchangeApproved | OrderStatus::ExchangeRejected => {
                *self == OrderStatus::ExchangeRequested
            }
        }
    }

    /// Returns the inventory effect of entering this status, if any.
    pub fn inventory_effect(&self) -> Option<InventoryEffect> {
        if self.is_fulfillment_confirmed() {
            Some(InventoryEffect::Finalize)
        } else if matches!(self, OrderStatus::Cancelled) {
            Some(InventoryEffect::Release)
        } else {
            None
        }
    }

    /// Returns the status name in its wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Placed => "PLACED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderStatus::ReturnApproved => "RETURN_APPROVED",
            OrderStatus::ReturnRejected => "RETURN_REJECTED",
            OrderStatus::ExchangeRequested => "EXCHANGE_REQUESTED",
            OrderStatus::ExchangeApproved => "EXCHANGE_APPROVED",
            OrderStatus::ExchangeRejected => "EXCHANGE_REJECTED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// How the customer pays for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cod,
    Upi,
}

impl PaymentMethod {
    /// Returns the method name in its wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cod => "cod",
            PaymentMethod::Upi => "upi",
        }
    }
}

/// A line item snapshot taken at checkout time.
///
/// Title, price and image are copied from the live product and never
/// recomputed; later catalog edits must not change a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product the snapshot was taken from.
    pub product_id: ProductId,

    /// Product title at checkout time.
    pub title: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Unit price at checkout time, in minor currency units.
    pub price: Money,

    /// Variant size, when the item targets a variant.
    pub size: Option<String>,

    /// Variant color, when the item targets a variant.
    pub color: Option<String>,

    /// Product image at checkout time.
    pub image: Option<String>,
}

impl OrderItem {
    /// Creates a new item snapshot without variant keys.
    pub fn new(
        product_id: ProductId,
        title: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            product_id,
            title: title.into(),
            quantity,
            price,
            size: None,
            color: None,
            image: None,
        }
    }

    /// Attaches the variant keys the item was reserved against.
    pub fn with_variant(mut self, size: impl Into<String>, color: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self.color = Some(color.into());
        self
    }

    /// Attaches the product image snapshot.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Returns the total price for this item (`price * quantity`).
    pub fn total_price(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// A placed order and its evolving fulfillment status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Externally visible identifier, generated at creation.
    pub order_id: OrderId,

    /// The customer who placed the order.
    pub customer_id: CustomerId,

    /// Line item snapshots, in the order supplied at checkout.
    pub items: Vec<OrderItem>,

    /// Current fulfillment status.
    pub status: OrderStatus,

    /// One-shot settlement guard: set the first time a finalize or release
    /// is applied; once true, no later transition touches inventory again.
    pub inventory_processed: bool,

    /// Sum of `price * quantity` across items, computed once at creation.
    pub total: Money,

    pub shipping_address: ShippingAddress,

    pub payment_method: PaymentMethod,

    /// Reason supplied with the most recent status change.
    pub status_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order with a fresh ID and a total computed
    /// from the item price snapshots.
    pub fn new(
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let total = items.iter().map(OrderItem::total_price).sum();
        let now = Utc::now();
        Self {
            order_id: OrderId::new(),
            customer_id,
            items,
            status: OrderStatus::Pending,
            inventory_processed: false,
            total,
            shipping_address,
            payment_method,
            status_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "12 Harbor Lane".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
        }
    }

    #[test]
    fn test_order_total_from_snapshots() {
        let order = Order::new(
            CustomerId::new(),
            vec![
                OrderItem::new(ProductId::new(), "Jacket", 2, Money::from_cents(50000)),
                OrderItem::new(ProductId::new(), "Scarf", 1, Money::from_cents(30000)),
            ],
            address(),
            PaymentMethod::Card,
        );

        assert_eq!(order.total.cents(), 130000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.inventory_processed);
    }

    #[test]
    fn test_pending_can_be_paid_or_cancelled() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Shipped));
    }

    #[test]
    fn test_delivered_cannot_be_cancelled() {
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::Cancelled));
        assert!(OrderStatus::Delivered.can_transition(OrderStatus::ReturnRequested));
        assert!(OrderStatus::Delivered.can_transition(OrderStatus::ExchangeRequested));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        for to in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::ReturnRequested,
            OrderStatus::Confirmed,
        ] {
            assert!(!OrderStatus::Cancelled.can_transition(to));
        }
    }

    #[test]
    fn test_approval_only_from_matching_request() {
        assert!(OrderStatus::ReturnRequested.can_transition(OrderStatus::ReturnApproved));
        assert!(OrderStatus::ReturnRequested.can_transition(OrderStatus::ReturnRejected));
        assert!(!OrderStatus::Delivered.can_transition(OrderStatus::ReturnApproved));
        assert!(!OrderStatus::ReturnRequested.can_transition(OrderStatus::ExchangeApproved));
        assert!(OrderStatus::ExchangeRequested.can_transition(OrderStatus::ExchangeApproved));
    }

    #[test]
    fn test_rejected_request_can_be_reopened() {
        assert!(OrderStatus::ReturnRejected.can_transition(OrderStatus::ReturnRequested));
        assert!(OrderStatus::ReturnRejected.can_transition(OrderStatus::ExchangeRequested));
    }

    #[test]
    fn test_return_flow_never_settles_inventory() {
        for status in [
            OrderStatus::ReturnRequested,
            OrderStatus::ReturnApproved,
            OrderStatus::ReturnRejected,
            OrderStatus::ExchangeRequested,
            OrderStatus::ExchangeApproved,
            OrderStatus::ExchangeRejected,
        ] {
            assert_eq!(status.inventory_effect(), None);
        }
    }

    #[test]
    fn test_inventory_effects() {
        assert_eq!(
            OrderStatus::Paid.inventory_effect(),
            Some(InventoryEffect::Finalize)
        );
        assert_eq!(
            OrderStatus::Shipped.inventory_effect(),
            Some(InventoryEffect::Finalize)
        );
        assert_eq!(
            OrderStatus::Cancelled.inventory_effect(),
            Some(InventoryEffect::Release)
        );
        assert_eq!(OrderStatus::Confirmed.inventory_effect(), None);
    }

    #[test]
    fn test_self_transition_rejected() {
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Paid));
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(OrderStatus::ReturnRequested.to_string(), "RETURN_REQUESTED");
        let json = serde_json::to_string(&OrderStatus::ExchangeApproved).unwrap();
        assert_eq!(json, "\"EXCHANGE_APPROVED\"");
        let parsed: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let order = Order::new(
            CustomerId::new(),
            vec![
                OrderItem::new(ProductId::new(), "Tee", 1, Money::from_cents(2500))
                    .with_variant("M", "Red"),
            ],
            address(),
            PaymentMethod::Upi,
        );
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
