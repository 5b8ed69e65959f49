//! Order lookup and status update endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use serde::{Deserialize, Serialize};
use store::{Order, OrderStatus, Store};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub new_status: OrderStatus,
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub inventory_processed: bool,
    pub total_cents: i64,
    pub items: Vec<OrderItemResponse>,
    pub payment_method: String,
    pub status_reason: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub price_cents: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id.to_string(),
                title: item.title.clone(),
                quantity: item.quantity,
                price_cents: item.price.cents(),
                size: item.size.clone(),
                color: item.color.clone(),
            })
            .collect();

        OrderResponse {
            order_id: order.order_id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.to_string(),
            inventory_processed: order.inventory_processed,
            total_cents: order.total.cents(),
            items,
            payment_method: order.payment_method.as_str().to_string(),
            status_reason: order.status_reason,
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// POST /orders/:id/status — apply a status transition to an order.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;

    let order = state
        .status
        .update_status(order_id, req.new_status, req.reason)
        .await?;

    Ok(Json(order.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from(uuid))
}
