//! Catalog seeding and stock visibility endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{Product, Store, Variant};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<VariantRequest>,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct VariantRequest {
    pub size: String,
    pub color: String,
    pub stock: u32,
    pub sku: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductCreatedResponse {
    pub product_id: String,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub image: Option<String>,
    pub is_active: bool,
    pub stock: u32,
    pub reserved_stock: u32,
    pub available_stock: u32,
    pub total_stock: u32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub variants: Vec<VariantResponse>,
}

#[derive(Serialize)]
pub struct VariantResponse {
    pub size: String,
    pub color: String,
    pub stock: u32,
    pub reserved_stock: u32,
    pub available_stock: u32,
    pub sku: Option<String>,
}

// -- Handlers --

/// POST /products — create a catalog product with optional variants.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(axum::http::StatusCode, Json<ProductCreatedResponse>), ApiError> {
    if req.price_cents <= 0 {
        return Err(ApiError::BadRequest(format!(
            "Invalid price: {} (must be greater than 0)",
            req.price_cents
        )));
    }

    let mut product = Product::new(ProductId::new(), req.title, Money::from_cents(req.price_cents))
        .with_stock(req.stock)
        .with_variants(
            req.variants
                .into_iter()
                .map(|v| {
                    let variant = Variant::new(v.size, v.color, v.stock);
                    match v.sku {
                        Some(sku) => variant.with_sku(sku),
                        None => variant,
                    }
                })
                .collect(),
        );
    product.description = req.description;
    product.image = req.image;
    product.is_active = req.is_active;

    let product_id = product.id;
    state.store.insert_product(&product).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ProductCreatedResponse {
            product_id: product_id.to_string(),
        }),
    ))
}

/// GET /products/:id — load a product with per-variant availability.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(to_response(product)))
}

fn to_response(product: Product) -> ProductResponse {
    let variants = product
        .variants
        .iter()
        .map(|v| VariantResponse {
            size: v.size.clone(),
            color: v.color.clone(),
            stock: v.stock,
            reserved_stock: v.reserved_stock,
            available_stock: v.available_stock(),
            sku: v.sku.clone(),
        })
        .collect();

    ProductResponse {
        id: product.id.to_string(),
        title: product.title.clone(),
        description: product.description.clone(),
        price_cents: product.price.cents(),
        image: product.image.clone(),
        is_active: product.is_active,
        stock: product.stock,
        reserved_stock: product.reserved_stock,
        available_stock: product.available_stock(),
        total_stock: product.total_stock,
        sizes: product.sizes.clone(),
        colors: product.colors.clone(),
        variants,
    }
}

pub(crate) fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(ProductId::from(uuid))
}
