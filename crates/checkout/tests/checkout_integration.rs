//! End-to-end tests for checkout orchestration and status transitions
//! over the in-memory store.

use std::sync::Arc;

use checkout::{
    CheckoutError, CheckoutItem, CheckoutRequest, CheckoutService, CheckoutSource,
    InMemoryCartService, InMemoryNotificationService, NotificationEvent, StatusService,
};
use common::{CustomerId, Money, ProductId};
use store::{
    InMemoryStore, OrderStatus, PaymentMethod, Product, ShippingAddress, StockSelector, Store,
    StoreError, Variant,
};

type TestCheckout = CheckoutService<InMemoryStore, InMemoryNotificationService, InMemoryCartService>;
type TestStatus = StatusService<InMemoryStore, InMemoryNotificationService>;

fn setup() -> (
    InMemoryStore,
    TestCheckout,
    TestStatus,
    InMemoryNotificationService,
    InMemoryCartService,
) {
    let store = InMemoryStore::new();
    let notifier = InMemoryNotificationService::new();
    let carts = InMemoryCartService::new();

    let checkout = CheckoutService::new(store.clone(), notifier.clone(), carts.clone());
    let status = StatusService::new(store.clone(), notifier.clone());

    (store, checkout, status, notifier, carts)
}

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 Harbor Lane".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
    }
}

fn request(customer_id: CustomerId, items: Vec<CheckoutItem>) -> CheckoutRequest {
    CheckoutRequest {
        customer_id,
        items,
        shipping_address: address(),
        payment_method: PaymentMethod::Card,
        source: CheckoutSource::Cart,
    }
}

fn variant_item(product_id: ProductId, quantity: u32, size: &str, color: &str) -> CheckoutItem {
    CheckoutItem {
        product_id,
        quantity,
        size: Some(size.to_string()),
        color: Some(color.to_string()),
    }
}

fn simple_item(product_id: ProductId, quantity: u32) -> CheckoutItem {
    CheckoutItem {
        product_id,
        quantity,
        size: None,
        color: None,
    }
}

async fn seed_jacket(store: &InMemoryStore, stock: u32) -> ProductId {
    let product = Product::new(ProductId::new(), "Jacket", Money::from_cents(50000))
        .with_variants(vec![
            Variant::new("M", "Red", stock),
            Variant::new("L", "Blue", stock),
        ]);
    let id = product.id;
    store.insert_product(&product).await.unwrap();
    id
}

async fn seed_scarf(store: &InMemoryStore, stock: u32) -> ProductId {
    let product =
        Product::new(ProductId::new(), "Scarf", Money::from_cents(30000)).with_stock(stock);
    let id = product.id;
    store.insert_product(&product).await.unwrap();
    id
}

async fn variant_counters(
    store: &InMemoryStore,
    id: ProductId,
    size: &str,
    color: &str,
) -> (u32, u32) {
    let product = store.get_product(id).await.unwrap().unwrap();
    let variant = product.find_variant(size, color).unwrap();
    (variant.stock, variant.reserved_stock)
}

#[tokio::test]
async fn test_checkout_happy_path() {
    let (store, checkout, _, notifier, carts) = setup();
    let jacket = seed_jacket(&store, 10).await;
    let scarf = seed_scarf(&store, 5).await;
    let customer = CustomerId::new();
    carts.seed_cart(customer);

    let receipt = checkout
        .checkout(request(
            customer,
            vec![
                variant_item(jacket, 2, "M", "Red"),
                simple_item(scarf, 1),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Pending);
    assert_eq!(receipt.total.cents(), 130000);

    // Reservations are held, physical stock untouched.
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (10, 2));
    let scarf_product = store.get_product(scarf).await.unwrap().unwrap();
    assert_eq!(scarf_product.reserved_stock, 1);
    assert_eq!(scarf_product.stock, 5);

    // Order persisted with snapshots.
    let order = store.get_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].title, "Jacket");
    assert_eq!(order.items[0].size.as_deref(), Some("M"));
    assert!(!order.inventory_processed);

    // Cart cleared, creation announced.
    assert!(!carts.has_cart(customer));
    assert!(matches!(
        notifier.events()[0],
        NotificationEvent::OrderCreated { total_cents: 130000, .. }
    ));
}

#[tokio::test]
async fn test_checkout_rolls_back_every_reservation_on_failure() {
    let (store, checkout, _, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;
    let scarf = seed_scarf(&store, 5).await;

    // Third item asks for more than its variant has.
    let result = checkout
        .checkout(request(
            CustomerId::new(),
            vec![
                variant_item(jacket, 2, "M", "Red"),
                simple_item(scarf, 1),
                variant_item(jacket, 99, "L", "Blue"),
            ],
        ))
        .await;

    match result {
        Err(CheckoutError::InsufficientVariantStock {
            size,
            color,
            requested,
            ..
        }) => {
            assert_eq!(size, "L");
            assert_eq!(color, "Blue");
            assert_eq!(requested, 99);
        }
        other => panic!("expected InsufficientVariantStock, got {other:?}"),
    }

    // Earlier reservations were undone.
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (10, 0));
    let scarf_product = store.get_product(scarf).await.unwrap().unwrap();
    assert_eq!(scarf_product.reserved_stock, 0);
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_inactive_product_rejects_whole_checkout() {
    let (store, checkout, _, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let inactive = Product::new(ProductId::new(), "Retired Hat", Money::from_cents(1500))
        .with_stock(3)
        .deactivated();
    let inactive_id = inactive.id;
    store.insert_product(&inactive).await.unwrap();

    let result = checkout
        .checkout(request(
            CustomerId::new(),
            vec![
                variant_item(jacket, 1, "M", "Red"),
                simple_item(inactive_id, 1),
            ],
        ))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::ProductUnavailable { .. })
    ));
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (10, 0));
}

#[tokio::test]
async fn test_unknown_product_fails() {
    let (_, checkout, _, _, _) = setup();

    let result = checkout
        .checkout(request(
            CustomerId::new(),
            vec![simple_item(ProductId::new(), 1)],
        ))
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::Store(StoreError::ProductNotFound(_)))
    ));
}

#[tokio::test]
async fn test_empty_and_zero_quantity_requests_rejected() {
    let (store, checkout, _, _, _) = setup();
    let scarf = seed_scarf(&store, 5).await;

    let result = checkout.checkout(request(CustomerId::new(), vec![])).await;
    assert!(matches!(result, Err(CheckoutError::EmptyOrder)));

    let result = checkout
        .checkout(request(CustomerId::new(), vec![simple_item(scarf, 0)]))
        .await;
    assert!(matches!(result, Err(CheckoutError::InvalidQuantity { .. })));
}

#[tokio::test]
async fn test_buy_now_leaves_cart_alone() {
    let (store, checkout, _, _, carts) = setup();
    let scarf = seed_scarf(&store, 5).await;
    let customer = CustomerId::new();
    carts.seed_cart(customer);

    let mut req = request(customer, vec![simple_item(scarf, 1)]);
    req.source = CheckoutSource::BuyNow;
    checkout.checkout(req).await.unwrap();

    assert!(carts.has_cart(customer));
}

#[tokio::test]
async fn test_notification_failure_never_fails_checkout() {
    let (store, checkout, _, notifier, _) = setup();
    let scarf = seed_scarf(&store, 5).await;
    notifier.set_fail_on_publish(true);

    let receipt = checkout
        .checkout(request(CustomerId::new(), vec![simple_item(scarf, 2)]))
        .await
        .unwrap();

    assert_eq!(receipt.status, OrderStatus::Pending);
    assert!(store.get_order(receipt.order_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_settlement_applies_exactly_once() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 4, "M", "Red")],
        ))
        .await
        .unwrap();

    // PENDING -> PAID finalizes: stock drops, hold cleared.
    let order = status
        .update_status(receipt.order_id, OrderStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.inventory_processed);
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (6, 0));

    // PAID -> SHIPPED must not finalize a second time.
    let order = status
        .update_status(receipt.order_id, OrderStatus::Shipped, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (6, 0));
}

#[tokio::test]
async fn test_cancel_releases_hold_without_touching_stock() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 3, "M", "Red")],
        ))
        .await
        .unwrap();
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (10, 3));

    let order = status
        .update_status(
            receipt.order_id,
            OrderStatus::Cancelled,
            Some("customer request".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.status_reason.as_deref(), Some("customer request"));
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (10, 0));
}

#[tokio::test]
async fn test_cancel_after_payment_keeps_stock_deducted() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 4, "M", "Red")],
        ))
        .await
        .unwrap();

    status
        .update_status(receipt.order_id, OrderStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (6, 0));

    // Inventory was already settled; cancelling must not release anything.
    status
        .update_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (6, 0));
}

#[tokio::test]
async fn test_delivered_order_cannot_be_cancelled() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 1, "M", "Red")],
        ))
        .await
        .unwrap();

    status
        .update_status(receipt.order_id, OrderStatus::Delivered, None)
        .await
        .unwrap();

    let result = status
        .update_status(receipt.order_id, OrderStatus::Cancelled, None)
        .await;

    assert!(matches!(
        result,
        Err(CheckoutError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
            ..
        })
    ));

    let order = store.get_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_return_flow_after_delivery() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 1, "M", "Red")],
        ))
        .await
        .unwrap();

    status
        .update_status(receipt.order_id, OrderStatus::Delivered, None)
        .await
        .unwrap();
    status
        .update_status(receipt.order_id, OrderStatus::ReturnRequested, None)
        .await
        .unwrap();
    let order = status
        .update_status(receipt.order_id, OrderStatus::ReturnApproved, None)
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::ReturnApproved);
    // Returns never touch the ledger in this flow.
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (9, 0));
}

#[tokio::test]
async fn test_ledger_corruption_aborts_transition() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 4, "M", "Red")],
        ))
        .await
        .unwrap();

    // Administrative override leaves less physical stock than the hold.
    store
        .overwrite_stock(jacket, &StockSelector::variant("M", "Red"), 2, 4)
        .await
        .unwrap();

    let result = status
        .update_status(receipt.order_id, OrderStatus::Paid, None)
        .await;
    assert!(matches!(
        result,
        Err(CheckoutError::Store(StoreError::LedgerCorruption { .. }))
    ));

    // The transition rolled back whole: status and flag unchanged.
    let order = store.get_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(!order.inventory_processed);
}

#[tokio::test]
async fn test_concurrent_status_updates_settle_once() {
    let (store, checkout, status, _, _) = setup();
    let jacket = seed_jacket(&store, 10).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 4, "M", "Red")],
        ))
        .await
        .unwrap();

    let status = Arc::new(status);
    let a = {
        let status = status.clone();
        let order_id = receipt.order_id;
        tokio::spawn(async move {
            status.update_status(order_id, OrderStatus::Paid, None).await
        })
    };
    let b = {
        let status = status.clone();
        let order_id = receipt.order_id;
        tokio::spawn(async move {
            status
                .update_status(order_id, OrderStatus::Shipped, None)
                .await
        })
    };
    let _ = a.await.unwrap();
    let _ = b.await.unwrap();

    // Whatever the interleaving, the hold is finalized exactly once.
    assert_eq!(variant_counters(&store, jacket, "M", "Red").await, (6, 0));
}

#[tokio::test]
async fn test_stock_depleted_event_emitted() {
    let (store, checkout, status, notifier, _) = setup();
    let jacket = seed_jacket(&store, 4).await;

    let receipt = checkout
        .checkout(request(
            CustomerId::new(),
            vec![variant_item(jacket, 4, "M", "Red")],
        ))
        .await
        .unwrap();

    status
        .update_status(receipt.order_id, OrderStatus::Paid, None)
        .await
        .unwrap();

    let depleted: Vec<_> = notifier
        .events()
        .into_iter()
        .filter(|e| matches!(e, NotificationEvent::StockDepleted { .. }))
        .collect();
    assert_eq!(
        depleted,
        vec![NotificationEvent::StockDepleted {
            product_id: jacket,
            size: Some("M".to_string()),
            color: Some("Red".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_status_update_on_unknown_order() {
    let (_, _, status, _, _) = setup();

    let result = status
        .update_status(common::OrderId::new(), OrderStatus::Paid, None)
        .await;
    assert!(matches!(result, Err(CheckoutError::OrderNotFound(_))));
}
