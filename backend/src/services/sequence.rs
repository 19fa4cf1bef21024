//! Atomic document number generation

use chrono::{DateTime, Utc};
use shared::{format_document_number, DocumentKind};
use sqlx::PgConnection;

use crate::error::AppResult;

/// Reserve the next number for a document kind
///
/// Runs inside the caller's transaction, so a rolled-back creation also
/// releases its number.
pub async fn next_document_number(
    conn: &mut PgConnection,
    kind: DocumentKind,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let period = kind.period(now);

    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO document_sequences (scope, period, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (scope, period)
        DO UPDATE SET last_value = document_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.scope())
    .bind(&period)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_document_number(kind, &period, value))
}
