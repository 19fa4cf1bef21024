//! HTTP handlers for finance transactions

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use shared::Transaction;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::finance::TransactionQuery;
use crate::services::FinanceService;
use crate::AppState;

const RESOURCE: &str = "finance";

/// List transactions as JSON, or as CSV with `?format=csv`
pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TransactionQuery>,
) -> AppResult<impl IntoResponse> {
    check_permission(&user, RESOURCE, "read")?;
    let page = FinanceService::new(state.db).list_transactions(&query).await?;

    if query.wants_csv() {
        let csv = FinanceService::export_to_csv(&page.data)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"transactions.csv\"",
                ),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(page).into_response())
    }
}

pub async fn get_transaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Transaction>> {
    check_permission(&user, RESOURCE, "read")?;
    Ok(Json(FinanceService::new(state.db).get_transaction(id).await?))
}

pub async fn mark_transaction_paid(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Transaction>> {
    check_permission(&user, RESOURCE, "write")?;
    Ok(Json(FinanceService::new(state.db).mark_paid(id).await?))
}
