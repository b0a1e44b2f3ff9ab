//! Order route handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use model::api::{
    CreateOrderRequest, OrderEnvelope, OrdersByPhoneResponse, PhoneQuery, UpdateOrderRequest,
    UpdateStatusRequest,
};
use model::{Order, OrderStats};
use service::Requester;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderEnvelope>)> {
    let Json(request) = payload?;
    let order = state.orders.create_order(request).await?;
    state.metrics.record_order_created();
    Ok((
        StatusCode::CREATED,
        Json(OrderEnvelope::new(order, "Order created successfully")),
    ))
}

pub async fn get_orders_by_phone(
    State(state): State<AppState>,
    query: Result<Query<PhoneQuery>, QueryRejection>,
) -> ApiResult<Json<OrdersByPhoneResponse>> {
    let Query(query) = query?;
    let phone = query
        .phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Phone number is required".into()))?;

    let orders = state.orders.get_orders_by_phone(&phone).await?;
    Ok(Json(orders.into()))
}

pub async fn get_all_orders(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<Vec<Order>>> {
    info!(admin = %admin.email, "Listing all orders");
    Ok(Json(state.orders.get_all_orders().await?))
}

pub async fn order_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<OrderStats>> {
    Ok(Json(state.orders.order_stats().await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<Order>> {
    let Path(id) = path?;
    let Json(UpdateStatusRequest { status }) = payload?;
    info!(admin = %admin.email, order_id = %id, %status, "Updating order status");
    Ok(Json(state.orders.update_order_status(id, status).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PhoneQuery>, QueryRejection>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> ApiResult<Json<OrderEnvelope>> {
    let Path(id) = path?;
    let Query(query) = query?;
    let Json(request) = payload?;

    let order = state
        .orders
        .update_order_info(id, request, Requester::customer(query.phone))
        .await?;
    Ok(Json(OrderEnvelope::new(order, "Order updated successfully")))
}

pub async fn update_order_admin(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> ApiResult<Json<OrderEnvelope>> {
    let Path(id) = path?;
    let Json(request) = payload?;
    info!(admin = %admin.email, order_id = %id, "Admin updating order");

    let order = state
        .orders
        .update_order_info(id, request, Requester::Admin)
        .await?;
    Ok(Json(OrderEnvelope::new(order, "Order updated successfully")))
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
