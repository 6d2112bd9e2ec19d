//! Order route handlers.
//!
//! Bodies are read leniently: the `Content-Type` header is not checked, and a
//! field of the wrong JSON type reads as blank and is reported by the pipeline
//! as a missing field. Only a body that is not a JSON object is rejected here.

use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use group_order_core::{Order, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::{BearerCredential, ClientIp};
use crate::services::orders::{ItemInput, lenient_items, lenient_text};
use crate::services::SubmitOrder;
use crate::state::AppState;

/// Body of `POST /api/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitOrderRequest {
    /// Fallback credential for clients that cannot set headers.
    #[serde(default, deserialize_with = "lenient_text")]
    pub access_token: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub delivery_location: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub note: String,
    #[serde(default, deserialize_with = "lenient_items")]
    pub items: Vec<ItemInput>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub device_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitOrderResponse {
    pub order_id: OrderId,
}

/// Body of `POST /api/orders/lookup`.
#[derive(Debug, Default, Deserialize)]
pub struct LookupOrderRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub access_token: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct LookupOrderResponse {
    pub order: Order,
}

/// Body of `POST /api/orders/history`.
#[derive(Debug, Default, Deserialize)]
pub struct OrderHistoryRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct OrderHistoryResponse {
    pub orders: Vec<Order>,
}

/// Parse a request body as JSON, whatever its declared content type.
fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        AppError::BadRequest("Invalid JSON".to_string())
    })
}

fn body_token(token: String) -> Option<String> {
    (!token.trim().is_empty()).then_some(token)
}

/// Submit an order.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    bearer: BearerCredential,
    ClientIp(client_ip): ClientIp,
    body: Bytes,
) -> Result<Json<SubmitOrderResponse>> {
    let body: SubmitOrderRequest = json_body(&body)?;

    let request = SubmitOrder {
        credential: bearer.or_body(body_token(body.access_token)),
        client_ip,
        delivery_location: body.delivery_location,
        note: body.note,
        items: body.items,
        device_id: body.device_id,
        idempotency_key: body.idempotency_key,
    };

    let order_id = state.orders().submit_order(request).await?;
    Ok(Json(SubmitOrderResponse { order_id }))
}

/// Fetch one of the caller's orders.
#[instrument(skip_all)]
pub async fn lookup(
    State(state): State<AppState>,
    bearer: BearerCredential,
    body: Bytes,
) -> Result<Json<LookupOrderResponse>> {
    let body: LookupOrderRequest = json_body(&body)?;
    let credential = bearer.or_body(body_token(body.access_token));

    let order = state
        .orders()
        .lookup_order(credential.as_deref(), &body.order_id)
        .await?;
    Ok(Json(LookupOrderResponse { order }))
}

/// List the caller's recent orders.
#[instrument(skip_all)]
pub async fn history(
    State(state): State<AppState>,
    bearer: BearerCredential,
    body: Bytes,
) -> Result<Json<OrderHistoryResponse>> {
    let body: OrderHistoryRequest = json_body(&body)?;
    let credential = bearer.or_body(body_token(body.access_token));

    let orders = state.orders().list_orders(credential.as_deref()).await?;
    Ok(Json(OrderHistoryResponse { orders }))
}
