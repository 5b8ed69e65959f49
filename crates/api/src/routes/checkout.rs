//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{CheckoutItem, CheckoutRequest, CheckoutSource};
use common::CustomerId;
use serde::{Deserialize, Serialize};
use store::{PaymentMethod, ShippingAddress, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::products::parse_product_id;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequestBody {
    pub user_id: String,
    pub items: Vec<CheckoutItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Direct purchase; the customer's cart is left untouched.
    #[serde(default)]
    pub buy_now: bool,
}

#[derive(Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub total_cents: i64,
    pub status: String,
}

// -- Handlers --

/// POST /checkout — reserve every item and create the order, or fail with
/// nothing reserved.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CheckoutRequestBody>,
) -> Result<(axum::http::StatusCode, Json<CheckoutResponse>), ApiError> {
    let customer_id = parse_customer_id(&req.user_id)?;

    let items = req
        .items
        .into_iter()
        .map(|item| {
            Ok(CheckoutItem {
                product_id: parse_product_id(&item.product_id)?,
                quantity: item.quantity,
                size: item.size,
                color: item.color,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let request = CheckoutRequest {
        customer_id,
        items,
        shipping_address: req.shipping_address,
        payment_method: req.payment_method,
        source: if req.buy_now {
            CheckoutSource::BuyNow
        } else {
            CheckoutSource::Cart
        },
    };

    let receipt = state.checkout.checkout(request).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: receipt.order_id.to_string(),
            total_cents: receipt.total.cents(),
            status: receipt.status.to_string(),
        }),
    ))
}

fn parse_customer_id(id: &str) -> Result<CustomerId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))?;
    Ok(CustomerId::from(uuid))
}
