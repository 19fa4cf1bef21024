//! HTTP handlers for kitchen order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{KitchenOrder, PaginatedResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::kitchen_order::{
    CreateKitchenOrderInput, DeliverOrderInput, DeliveryResponse, ProcessOrderInput,
};
use crate::services::{CancelInput, KitchenOrderService, OrderQuery};
use crate::AppState;

const RESOURCE: &str = "kitchen_orders";

fn service(state: AppState) -> KitchenOrderService {
    let ttl = state.config.qr.kitchen_order_ttl();
    KitchenOrderService::new(state.db, state.signer, ttl)
}

pub async fn create_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateKitchenOrderInput>,
) -> AppResult<impl IntoResponse> {
    check_permission(&user, RESOURCE, "write")?;
    let order = service(state).create(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_kitchen_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<PaginatedResponse<KitchenOrder>>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(service(state).list(&query).await?))
}

pub async fn get_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KitchenOrder>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(service(state).get(id).await?))
}

pub async fn delete_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, RESOURCE, "write")?;
    service(state).soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KitchenOrder>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(service(state).send(id).await?))
}

/// Approve quantities and allocate stock
///
/// The body is optional; without it every item is approved in full.
pub async fn process_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ProcessOrderInput>>,
) -> AppResult<Json<KitchenOrder>> {
    check_permission(&user, RESOURCE, "process")?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(service(state).process(id, input).await?))
}

/// Confirm delivery at the dapur and post the sale
pub async fn deliver_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<DeliverOrderInput>>,
) -> AppResult<Json<DeliveryResponse>> {
    check_permission(&user, RESOURCE, "deliver")?;
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(service(state).deliver(id, input).await?))
}

pub async fn cancel_kitchen_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CancelInput>,
) -> AppResult<Json<KitchenOrder>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(service(state).cancel(id, input).await?))
}
