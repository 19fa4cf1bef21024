//! QR scan resolution

use axum::{
    extract::{Path, State},
    Json,
};
use shared::QrScan;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::QrService;
use crate::AppState;

/// Resolve a scanned code to the order it belongs to
pub async fn resolve_qr(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(qr_string): Path<String>,
) -> AppResult<Json<QrScan>> {
    let scan = QrService::new(state.db, state.signer).resolve(&qr_string).await?;
    Ok(Json(scan))
}
