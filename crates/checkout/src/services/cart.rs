//! Cart service trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::CustomerId;

use crate::error::CheckoutError;

/// Trait for the cart collaborator.
///
/// Checkout clears the originating cart after a successful commit when
/// the purchase came from a cart rather than a direct buy.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Empties the customer's cart.
    async fn clear_cart(&self, customer_id: CustomerId) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashSet<CustomerId>,
    fail_on_clear: bool,
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates a new in-memory cart service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on every clear call.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Marks the customer as having a non-empty cart.
    pub fn seed_cart(&self, customer_id: CustomerId) {
        self.state.write().unwrap().carts.insert(customer_id);
    }

    /// Returns true if the customer still has a cart.
    pub fn has_cart(&self, customer_id: CustomerId) -> bool {
        self.state.read().unwrap().carts.contains(&customer_id)
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn clear_cart(&self, customer_id: CustomerId) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_clear {
            return Err(CheckoutError::Cart("cart backend unavailable".to_string()));
        }
        state.carts.remove(&customer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_cart() {
        let service = InMemoryCartService::new();
        let customer_id = CustomerId::new();

        service.seed_cart(customer_id);
        assert!(service.has_cart(customer_id));

        service.clear_cart(customer_id).await.unwrap();
        assert!(!service.has_cart(customer_id));
    }

    #[tokio::test]
    async fn test_fail_on_clear() {
        let service = InMemoryCartService::new();
        let customer_id = CustomerId::new();
        service.seed_cart(customer_id);
        service.set_fail_on_clear(true);

        let result = service.clear_cart(customer_id).await;
        assert!(result.is_err());
        assert!(service.has_cart(customer_id));
    }
}
