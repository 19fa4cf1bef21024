//! QR code persistence and scan resolution

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{DomainError, QrCode, QrScan, QrSigner, Reference};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct QrService {
    db: PgPool,
    signer: Arc<QrSigner>,
}

#[derive(Debug, FromRow)]
struct QrCodeRow {
    id: Uuid,
    qr_string: String,
    reference_type: String,
    reference_id: Uuid,
    data: serde_json::Value,
    expires_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<QrCodeRow> for QrCode {
    type Error = AppError;

    fn try_from(row: QrCodeRow) -> Result<Self, Self::Error> {
        let reference = Reference::from_parts(&row.reference_type, row.reference_id)
            .ok_or_else(|| {
                DomainError::DataIntegrity(format!(
                    "QR code {} has unknown reference type {}",
                    row.id, row.reference_type
                ))
            })?;
        Ok(QrCode {
            id: row.id,
            qr_string: row.qr_string,
            reference,
            data: row.data,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Store a freshly issued code, deactivating older codes for the same order
pub async fn store_code(conn: &mut PgConnection, qr: &QrCode) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE qr_codes SET is_active = FALSE
        WHERE reference_type = $1 AND reference_id = $2 AND is_active
        "#,
    )
    .bind(qr.reference.reference_type.as_str())
    .bind(qr.reference.reference_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO qr_codes (id, qr_string, reference_type, reference_id, data, expires_at, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(qr.id)
    .bind(&qr.qr_string)
    .bind(qr.reference.reference_type.as_str())
    .bind(qr.reference.reference_id)
    .bind(&qr.data)
    .bind(qr.expires_at)
    .bind(qr.is_active)
    .bind(qr.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Require that a scanned string is a stored, active and unexpired code
///
/// The signature and reference are checked by the engine; this covers the
/// state only the database knows.
pub async fn ensure_active(
    conn: &mut PgConnection,
    qr_string: &str,
    now: DateTime<Utc>,
) -> AppResult<QrCode> {
    let qr: QrCode = fetch_by_string(conn, qr_string)
        .await?
        .ok_or_else(|| DomainError::validation("qr_string", "Unknown QR code"))?;

    if !qr.is_valid(now) {
        return Err(DomainError::validation("qr_string", "QR code is no longer valid").into());
    }
    Ok(qr)
}

async fn fetch_by_string(conn: &mut PgConnection, qr_string: &str) -> AppResult<Option<QrCode>> {
    sqlx::query_as::<_, QrCodeRow>(
        r#"
        SELECT id, qr_string, reference_type, reference_id, data, expires_at, is_active, created_at
        FROM qr_codes WHERE qr_string = $1
        "#,
    )
    .bind(qr_string)
    .fetch_optional(&mut *conn)
    .await?
    .map(QrCode::try_from)
    .transpose()
}

impl QrService {
    pub fn new(db: PgPool, signer: Arc<QrSigner>) -> Self {
        Self { db, signer }
    }

    /// Resolve a scanned QR string to the order it references
    pub async fn resolve(&self, qr_string: &str) -> AppResult<QrScan> {
        let now = Utc::now();
        let scan = self.signer.validate(qr_string, now)?;

        let mut conn = self.db.acquire().await?;
        let stored = ensure_active(&mut *conn, qr_string, now).await?;
        if stored.reference != scan.reference {
            return Err(DomainError::DataIntegrity(format!(
                "QR code {} is stored against {} but signed for {}",
                stored.id, stored.reference, scan.reference
            ))
            .into());
        }

        Ok(scan)
    }
}
