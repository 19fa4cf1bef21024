//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{PaginatedResponse, PurchaseOrder};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::purchase_order::{
    ConfirmSupplierInput, CreatePurchaseOrderInput, ReceiveGoodsInput, ReceiveGoodsResponse,
};
use crate::services::{CancelInput, OrderQuery, PurchaseOrderService};
use crate::AppState;

const RESOURCE: &str = "purchase_orders";

fn service(state: AppState) -> PurchaseOrderService {
    let ttl = state.config.qr.purchase_order_ttl();
    PurchaseOrderService::new(state.db, state.signer, ttl)
}

/// Create a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<impl IntoResponse> {
    check_permission(&user, RESOURCE, "write")?;
    let po = service(state).create(input).await?;
    Ok((StatusCode::CREATED, Json(po)))
}

/// List purchase orders
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(service(state).list(&query).await?))
}

/// Get a purchase order with its items
pub async fn get_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(service(state).get(id).await?))
}

/// Soft-delete a purchase order
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&user, RESOURCE, "write")?;
    service(state).soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send to the supplier, issuing the QR code
pub async fn send_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(service(state).send(id).await?))
}

/// Record the supplier's confirmed prices and quantities
pub async fn confirm_supplier(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ConfirmSupplierInput>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(service(state).confirm_supplier(id, input).await?))
}

/// Koperasi approval of the supplier's figures
pub async fn confirm_koperasi(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&user, RESOURCE, "confirm")?;
    Ok(Json(service(state).confirm_koperasi(id).await?))
}

/// Receive goods into stock and post the purchase
pub async fn receive_goods(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ReceiveGoodsInput>,
) -> AppResult<Json<ReceiveGoodsResponse>> {
    check_permission(&user, RESOURCE, "receive")?;
    Ok(Json(service(state).receive_goods(id, input).await?))
}

/// Cancel a purchase order
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CancelInput>,
) -> AppResult<Json<PurchaseOrder>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(service(state).cancel(id, input).await?))
}
