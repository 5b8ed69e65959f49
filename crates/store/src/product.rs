//! Catalog products and their per-variant stock counters.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// One size/color combination of a product with its own stock counters.
///
/// Variants are owned exclusively by their parent [`Product`]; they have no
/// identity outside the product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Size key, matched case-insensitively on lookup.
    pub size: String,

    /// Color key, matched case-insensitively on lookup.
    pub color: String,

    /// Physical units on hand.
    pub stock: u32,

    /// Units currently held by open reservations.
    pub reserved_stock: u32,

    /// Optional opaque stock-keeping identifier.
    pub sku: Option<String>,
}

impl Variant {
    /// Creates a new variant with the given stock and no open reservations.
    pub fn new(size: impl Into<String>, color: impl Into<String>, stock: u32) -> Self {
        Self {
            size: size.into(),
            color: color.into(),
            stock,
            reserved_stock: 0,
            sku: None,
        }
    }

    /// Attaches a SKU to the variant.
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Units purchasable right now: `stock - reserved_stock`.
    pub fn available_stock(&self) -> u32 {
        self.stock.saturating_sub(self.reserved_stock)
    }

    /// Returns true if this variant answers to the given size/color pair.
    pub fn matches(&self, size: &str, color: &str) -> bool {
        self.size.eq_ignore_ascii_case(size) && self.color.eq_ignore_ascii_case(color)
    }
}

/// Stock counters after a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    /// Physical units remaining.
    pub stock: u32,

    /// Units still held by open reservations.
    pub reserved: u32,
}

impl StockLevel {
    /// Units purchasable right now.
    pub fn available(&self) -> u32 {
        self.stock.saturating_sub(self.reserved)
    }
}

/// A sellable catalog item and the root of its stock ledger.
///
/// Simple products track stock in the top-level counters; variant products
/// track it per size/color pair. The counters are mutated only through the
/// store's atomic operations, never by direct field writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable identifier.
    pub id: ProductId,

    /// Display title, snapshotted onto order items at checkout.
    pub title: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Unit price in minor currency units.
    pub price: Money,

    /// Optional primary image reference.
    pub image: Option<String>,

    /// Whether the product can currently be purchased.
    pub is_active: bool,

    /// Physical units on hand (simple-product path).
    pub stock: u32,

    /// Units held by open reservations (simple-product path).
    pub reserved_stock: u32,

    /// Size/color variants, in insertion order. Empty for simple products.
    pub variants: Vec<Variant>,

    /// Derived: total physical stock across variants (or the top-level
    /// stock for simple products). Recomputed on every persist.
    pub total_stock: u32,

    /// Derived: distinct variant sizes in first-seen order.
    pub sizes: Vec<String>,

    /// Derived: distinct variant colors in first-seen order.
    pub colors: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new active product with no stock and no variants.
    pub fn new(id: ProductId, title: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: None,
            price,
            image: None,
            is_active: true,
            stock: 0,
            reserved_stock: 0,
            variants: Vec::new(),
            total_stock: 0,
            sizes: Vec::new(),
            colors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the top-level stock (simple-product path).
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self.recompute_aggregates();
        self
    }

    /// Replaces the variant list.
    pub fn with_variants(mut self, variants: Vec<Variant>) -> Self {
        self.variants = variants;
        self.recompute_aggregates();
        self
    }

    /// Marks the product as inactive (not purchasable).
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Units purchasable right now at the top level.
    pub fn available_stock(&self) -> u32 {
        self.stock.saturating_sub(self.reserved_stock)
    }

    /// Returns true if the product tracks stock per variant.
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Looks up a variant by size/color, case-insensitively.
    pub fn find_variant(&self, size: &str, color: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches(size, color))
    }

    /// Mutable variant lookup, case-insensitive.
    pub fn find_variant_mut(&mut self, size: &str, color: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.matches(size, color))
    }

    /// Recomputes the derived aggregate fields from the variant list.
    ///
    /// Called by the store on every persist so the aggregates never drift
    /// from the per-variant counters.
    pub fn recompute_aggregates(&mut self) {
        if self.variants.is_empty() {
            self.total_stock = self.stock;
            self.sizes.clear();
            self.colors.clear();
            return;
        }

        self.total_stock = self.variants.iter().map(|v| v.stock).sum();

        let mut sizes: Vec<String> = Vec::new();
        let mut colors: Vec<String> = Vec::new();
        for variant in &self.variants {
            if !sizes.iter().any(|s| s.eq_ignore_ascii_case(&variant.size)) {
                sizes.push(variant.size.clone());
            }
            if !colors.iter().any(|c| c.eq_ignore_ascii_case(&variant.color)) {
                colors.push(variant.color.clone());
            }
        }
        self.sizes = sizes;
        self.colors = colors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee_shirt() -> Product {
        Product::new(ProductId::new(), "Tee Shirt", Money::from_cents(2500)).with_variants(vec![
            Variant::new("M", "Red", 10),
            Variant::new("M", "Blue", 5),
            Variant::new("L", "Red", 3),
        ])
    }

    #[test]
    fn test_available_stock() {
        let mut variant = Variant::new("M", "Red", 10);
        assert_eq!(variant.available_stock(), 10);

        variant.reserved_stock = 4;
        assert_eq!(variant.available_stock(), 6);

        variant.reserved_stock = 10;
        assert_eq!(variant.available_stock(), 0);
    }

    #[test]
    fn test_find_variant_case_insensitive() {
        let product = tee_shirt();
        assert!(product.find_variant("m", "RED").is_some());
        assert!(product.find_variant("M", "Red").is_some());
        assert!(product.find_variant("XL", "Red").is_none());
    }

    #[test]
    fn test_recompute_aggregates_from_variants() {
        let product = tee_shirt();
        assert_eq!(product.total_stock, 18);
        assert_eq!(product.sizes, vec!["M", "L"]);
        assert_eq!(product.colors, vec!["Red", "Blue"]);
    }

    #[test]
    fn test_recompute_aggregates_simple_product() {
        let product = Product::new(ProductId::new(), "Mug", Money::from_cents(900)).with_stock(7);
        assert_eq!(product.total_stock, 7);
        assert!(product.sizes.is_empty());
        assert!(!product.has_variants());
    }

    #[test]
    fn test_stock_level_available() {
        let level = StockLevel {
            stock: 6,
            reserved: 2,
        };
        assert_eq!(level.available(), 4);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let product = tee_shirt();
        let json = serde_json::to_string(&product).unwrap();
        let deserialized: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(product, deserialized);
    }
}
