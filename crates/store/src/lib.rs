//! Stock ledger and order persistence for the storefront system.
//!
//! This crate provides:
//! - The catalog document model (`Product`, `Variant`) with its stock
//!   counters and derived aggregates
//! - The persisted `Order` document and `OrderStatus` state machine
//! - The `Store` trait with an explicit transaction handle, implemented
//!   in memory for tests and on PostgreSQL for production

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod product;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, MemoryTx};
pub use order::{InventoryEffect, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
pub use postgres::{PgTx, PostgresStore};
pub use product::{Product, StockLevel, Variant};
pub use store::{StockSelector, Store};
