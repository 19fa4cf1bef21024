//! HTTP handlers for stock items and batches

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use shared::StockBatch;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::stock::{CreateStockItemInput, ExpireSweepResult, StockItemSummary};
use crate::services::StockService;
use crate::AppState;

const RESOURCE: &str = "stock";

pub async fn create_stock_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateStockItemInput>,
) -> AppResult<impl IntoResponse> {
    check_permission(&user, RESOURCE, "write")?;
    let item = StockService::new(state.db).create_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_stock_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<StockItemSummary>>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(StockService::new(state.db).list_items().await?))
}

pub async fn get_stock_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StockItemSummary>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(StockService::new(state.db).get_item(id).await?))
}

/// Batches of an item in allocation order
pub async fn list_stock_batches(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<StockBatch>>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(StockService::new(state.db).list_batches(id).await?))
}

/// Items below their minimum stock
pub async fn list_low_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<StockItemSummary>>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(StockService::new(state.db).low_stock().await?))
}

pub async fn expire_sweep(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ExpireSweepResult>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(StockService::new(state.db).expire_sweep(Utc::now()).await?))
}
