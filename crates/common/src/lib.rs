//! Shared vocabulary types for the storefront system.
//!
//! Identifier newtypes prevent mixing up product, order and customer UUIDs;
//! [`Money`] keeps all amounts in integer minor currency units.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CustomerId, OrderId, ProductId};
