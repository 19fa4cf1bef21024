//! HTTP handlers for the dapur registry

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::dapur::{CreateDapurInput, Dapur};
use crate::services::DapurService;
use crate::AppState;

pub async fn create_dapur(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateDapurInput>,
) -> AppResult<impl IntoResponse> {
    check_permission(&user, "dapurs", "write")?;
    let dapur = DapurService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(dapur)))
}

pub async fn list_dapurs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Dapur>>> {
    check_permission(&user, "dapurs", "read")?;
    Ok(Json(DapurService::new(state.db).list().await?))
}
