use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use common::{CustomerId, Money, OrderId, ProductId};

use crate::{
    Order, OrderItem, OrderStatus, PaymentMethod, Product, Result, ShippingAddress, StockLevel,
    StoreError, Variant,
    store::{StockSelector, Store},
};

/// Transaction handle used by [`PostgresStore`].
pub type PgTx = Transaction<'static, Postgres>;

/// PostgreSQL-backed store implementation.
///
/// The reservation primitives are expressed as conditional `UPDATE`
/// statements so the availability check and the counter increment happen
/// in one indivisible step on the database side.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow, variants: Vec<Variant>) -> Result<Product> {
        let product_id = ProductId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let mut product = Product {
            id: product_id,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            image: row.try_get("image")?,
            is_active: row.try_get("is_active")?,
            stock: counter(row.try_get("stock")?, product_id, "stock")?,
            reserved_stock: counter(row.try_get("reserved_stock")?, product_id, "reserved_stock")?,
            variants,
            total_stock: counter(row.try_get("total_stock")?, product_id, "total_stock")?,
            sizes: row.try_get("sizes")?,
            colors: row.try_get("colors")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        };
        product.recompute_aggregates();
        Ok(product)
    }

    fn row_to_variant(row: &PgRow, product_id: ProductId) -> Result<Variant> {
        Ok(Variant {
            size: row.try_get("size")?,
            color: row.try_get("color")?,
            stock: counter(row.try_get("stock")?, product_id, "variant stock")?,
            reserved_stock: counter(
                row.try_get("reserved_stock")?,
                product_id,
                "variant reserved_stock",
            )?,
            sku: row.try_get("sku")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: OrderStatus =
            serde_json::from_value(serde_json::Value::String(row.try_get("status")?))?;
        let payment_method: PaymentMethod =
            serde_json::from_value(serde_json::Value::String(row.try_get("payment_method")?))?;
        let items: Vec<OrderItem> =
            serde_json::from_value(row.try_get::<serde_json::Value, _>("items")?)?;

        Ok(Order {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            items,
            status,
            inventory_processed: row.try_get("inventory_processed")?,
            total: Money::from_cents(row.try_get("total_cents")?),
            shipping_address: ShippingAddress {
                street: row.try_get("street")?,
                city: row.try_get("city")?,
                state: row.try_get("state")?,
                zip_code: row.try_get("zip_code")?,
            },
            payment_method,
            status_reason: row.try_get("status_reason")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    async fn product_exists(&self, tx: &mut PgTx, product_id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id.as_uuid())
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }

    async fn variant_exists(
        &self,
        tx: &mut PgTx,
        product_id: ProductId,
        size: &str,
        color: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM product_variants
                WHERE product_id = $1 AND LOWER(size) = LOWER($2) AND LOWER(color) = LOWER($3)
            )
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(size)
        .bind(color)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// Confirms the selector resolves, then maps a zero-row conditional
    /// update to its semantic meaning.
    async fn selector_missing_error(
        &self,
        tx: &mut PgTx,
        product_id: ProductId,
        selector: &StockSelector,
    ) -> Result<Option<StoreError>> {
        if !self.product_exists(tx, product_id).await? {
            return Ok(Some(StoreError::ProductNotFound(product_id)));
        }
        if let StockSelector::Variant { size, color } = selector
            && !self.variant_exists(tx, product_id, size, color).await?
        {
            return Ok(Some(StoreError::VariantNotFound {
                product_id,
                size: size.clone(),
                color: color.clone(),
            }));
        }
        Ok(None)
    }

    /// Re-derives `products.total_stock` from the variant rows.
    async fn refresh_total_stock(&self, tx: &mut PgTx, product_id: ProductId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET total_stock = (
                SELECT COALESCE(SUM(stock), 0) FROM product_variants WHERE product_id = $1
            ),
            updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn counter(value: i64, product_id: ProductId, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::LedgerCorruption {
        product_id,
        detail: format!("{what} counter out of range: {value}"),
    })
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        tx.rollback().await?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut product = product.clone();
        product.recompute_aggregates();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products
                (id, title, description, price_cents, image, is_active,
                 stock, reserved_stock, total_stock, sizes, colors, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.image)
        .bind(product.is_active)
        .bind(product.stock as i64)
        .bind(product.reserved_stock as i64)
        .bind(product.total_stock as i64)
        .bind(&product.sizes)
        .bind(&product.colors)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        for (idx, variant) in product.variants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants
                    (product_id, idx, size, color, stock, reserved_stock, sku)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(product.id.as_uuid())
            .bind(idx as i32)
            .bind(&variant.size)
            .bind(&variant.color)
            .bind(variant.stock as i64)
            .bind(variant.reserved_stock as i64)
            .bind(&variant.sku)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let mut tx = self.pool.begin().await?;
        let product = self.get_product_in_tx(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn get_product_in_tx(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, price_cents, image, is_active,
                   stock, reserved_stock, total_stock, sizes, colors, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let variant_rows = sqlx::query(
            r#"
            SELECT size, color, stock, reserved_stock, sku
            FROM product_variants
            WHERE product_id = $1
            ORDER BY idx ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

        let variants = variant_rows
            .iter()
            .map(|r| Self::row_to_variant(r, product_id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self::row_to_product(&row, variants)?))
    }

    async fn try_reserve(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<bool> {
        let affected = match selector {
            StockSelector::Product => sqlx::query(
                r#"
                UPDATE products
                SET reserved_stock = reserved_stock + $2, updated_at = now()
                WHERE id = $1 AND stock - reserved_stock >= $2
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity as i64)
            .execute(&mut **tx)
            .await?
            .rows_affected(),
            StockSelector::Variant { size, color } => sqlx::query(
                r#"
                UPDATE product_variants
                SET reserved_stock = reserved_stock + $4
                WHERE product_id = $1
                  AND LOWER(size) = LOWER($2) AND LOWER(color) = LOWER($3)
                  AND stock - reserved_stock >= $4
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(size)
            .bind(color)
            .bind(quantity as i64)
            .execute(&mut **tx)
            .await?
            .rows_affected(),
        };

        if affected == 1 {
            return Ok(true);
        }

        // Zero rows: either the target does not exist or availability was
        // short. Only the latter is a plain `false`.
        match self.selector_missing_error(tx, product_id, selector).await? {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }

    async fn release(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<()> {
        let affected = match selector {
            StockSelector::Product => sqlx::query(
                r#"
                UPDATE products
                SET reserved_stock = GREATEST(reserved_stock - $2, 0), updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity as i64)
            .execute(&mut **tx)
            .await?
            .rows_affected(),
            StockSelector::Variant { size, color } => sqlx::query(
                r#"
                UPDATE product_variants
                SET reserved_stock = GREATEST(reserved_stock - $4, 0)
                WHERE product_id = $1
                  AND LOWER(size) = LOWER($2) AND LOWER(color) = LOWER($3)
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(size)
            .bind(color)
            .bind(quantity as i64)
            .execute(&mut **tx)
            .await?
            .rows_affected(),
        };

        if affected == 1 {
            return Ok(());
        }

        match self.selector_missing_error(tx, product_id, selector).await? {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn finalize(
        &self,
        tx: &mut Self::Tx,
        product_id: ProductId,
        selector: &StockSelector,
        quantity: u32,
    ) -> Result<StockLevel> {
        let row = match selector {
            StockSelector::Product => sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2,
                    reserved_stock = GREATEST(reserved_stock - $2, 0),
                    total_stock = stock - $2,
                    updated_at = now()
                WHERE id = $1 AND stock >= $2
                RETURNING stock, reserved_stock
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(quantity as i64)
            .fetch_optional(&mut **tx)
            .await?,
            StockSelector::Variant { size, color } => sqlx::query(
                r#"
                UPDATE product_variants
                SET stock = stock - $4,
                    reserved_stock = GREATEST(reserved_stock - $4, 0)
                WHERE product_id = $1
                  AND LOWER(size) = LOWER($2) AND LOWER(color) = LOWER($3)
                  AND stock >= $4
                RETURNING stock, reserved_stock
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(size)
            .bind(color)
            .bind(quantity as i64)
            .fetch_optional(&mut **tx)
            .await?,
        };

        match row {
            Some(row) => {
                if matches!(selector, StockSelector::Variant { .. }) {
                    self.refresh_total_stock(tx, product_id).await?;
                }
                Ok(StockLevel {
                    stock: counter(row.try_get("stock")?, product_id, "stock")?,
                    reserved: counter(row.try_get("reserved_stock")?, product_id, "reserved_stock")?,
                })
            }
            None => match self.selector_missing_error(tx, product_id, selector).await? {
                Some(err) => Err(err),
                None => Err(StoreError::LedgerCorruption {
                    product_id,
                    detail: format!(
                        "finalize of {quantity} units exceeds physical stock ({selector})"
                    ),
                }),
            },
        }
    }

    async fn insert_order(&self, tx: &mut Self::Tx, order: &Order) -> Result<()> {
        let items = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (order_id, customer_id, items, status, inventory_processed, total_cents,
                 street, city, state, zip_code, payment_method, status_reason,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(items)
        .bind(order.status.as_str())
        .bind(order.inventory_processed)
        .bind(order.total.cents())
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.state)
        .bind(&order.shipping_address.zip_code)
        .bind(order.payment_method.as_str())
        .bind(&order.status_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, customer_id, items, status, inventory_processed, total_cents,
                   street, city, state, zip_code, payment_method, status_reason,
                   created_at, updated_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn get_order_in_tx(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        // FOR UPDATE serializes concurrent status updates on one order.
        let row = sqlx::query(
            r#"
            SELECT order_id, customer_id, items, status, inventory_processed, total_cents,
                   street, city, state, zip_code, payment_method, status_reason,
                   created_at, updated_at
            FROM orders
            WHERE order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn claim_inventory_processed(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
    ) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE orders
            SET inventory_processed = TRUE, updated_at = now()
            WHERE order_id = $1 AND inventory_processed = FALSE
            "#,
        )
        .bind(order_id.as_uuid())
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if affected == 1 {
            return Ok(true);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(order_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        if exists {
            Ok(false)
        } else {
            Err(StoreError::OrderNotFound(order_id))
        }
    }

    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, status_reason = $3, updated_at = now()
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .bind(reason)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if affected == 1 {
            Ok(())
        } else {
            Err(StoreError::OrderNotFound(order_id))
        }
    }

    async fn overwrite_stock(
        &self,
        product_id: ProductId,
        selector: &StockSelector,
        stock: u32,
        reserved: u32,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let affected = match selector {
            StockSelector::Product => sqlx::query(
                r#"
                UPDATE products
                SET stock = $2, reserved_stock = $3, total_stock = $2, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(stock as i64)
            .bind(reserved as i64)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            StockSelector::Variant { size, color } => sqlx::query(
                r#"
                UPDATE product_variants
                SET stock = $4, reserved_stock = $5
                WHERE product_id = $1
                  AND LOWER(size) = LOWER($2) AND LOWER(color) = LOWER($3)
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(size)
            .bind(color)
            .bind(stock as i64)
            .bind(reserved as i64)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        };

        if affected == 0 {
            let err = self
                .selector_missing_error(&mut tx, product_id, selector)
                .await?
                .unwrap_or(StoreError::ProductNotFound(product_id));
            tx.rollback().await?;
            return Err(err);
        }

        if matches!(selector, StockSelector::Variant { .. }) {
            self.refresh_total_stock(&mut tx, product_id).await?;
        }

        tx.commit().await?;

        tracing::warn!(
            %product_id,
            %selector,
            stock,
            reserved,
            "administrative stock override applied, invariant checks bypassed"
        );

        Ok(())
    }
}
