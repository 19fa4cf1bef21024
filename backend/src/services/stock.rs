//! Stock items, batches and ledger persistence
//!
//! Order services lock the affected `stock_items` rows, load a
//! [`StockLedger`] through [`load_ledger`], run the engine and hand the ledger
//! back to [`persist_ledger`] inside the same transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_name, validate_stock_thresholds, validate_unit, BatchStatus, DomainError,
    MovementKind, Reference, StockBatch, StockItem, StockItemCode, StockLedger, StockLevel,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Input for creating a stock item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockItemInput {
    /// Full `PREFIX-KEY` code
    #[validate(length(min = 4, max = 26))]
    pub code: String,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[serde(default)]
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
}

/// A stock item with its on-hand quantity
#[derive(Debug, Clone, Serialize)]
pub struct StockItemSummary {
    #[serde(flatten)]
    pub item: StockItem,
    pub on_hand: Decimal,
    pub level: StockLevel,
}

/// Result of an expiry sweep
#[derive(Debug, Clone, Serialize)]
pub struct ExpireSweepResult {
    pub expired_batch_ids: Vec<Uuid>,
    pub swept_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StockItemRow {
    id: Uuid,
    code: String,
    name: String,
    unit: String,
    min_stock: Decimal,
    max_stock: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    on_hand: Decimal,
}

impl From<StockItemRow> for StockItemSummary {
    fn from(row: StockItemRow) -> Self {
        let item = StockItem {
            id: row.id,
            code: row.code,
            name: row.name,
            unit: row.unit,
            min_stock: row.min_stock,
            max_stock: row.max_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        let level = item.level(row.on_hand);
        StockItemSummary {
            item,
            on_hand: row.on_hand,
            level,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockBatchRow {
    id: Uuid,
    stock_item_id: Uuid,
    sequence: i64,
    quantity: Decimal,
    remaining: Decimal,
    unit_cost: Decimal,
    expiry_date: Option<NaiveDate>,
    production_date: Option<NaiveDate>,
    status: String,
    source_type: Option<String>,
    source_id: Option<Uuid>,
    received_at: DateTime<Utc>,
}

impl TryFrom<StockBatchRow> for StockBatch {
    type Error = AppError;

    fn try_from(row: StockBatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::parse(&row.status).ok_or_else(|| {
            DomainError::DataIntegrity(format!(
                "Stock batch {} has unknown status {}",
                row.id, row.status
            ))
        })?;
        let source = match (row.source_type.as_deref(), row.source_id) {
            (Some(kind), Some(id)) => Some(Reference::from_parts(kind, id).ok_or_else(|| {
                DomainError::DataIntegrity(format!(
                    "Stock batch {} has unknown source type {}",
                    row.id, kind
                ))
            })?),
            _ => None,
        };

        Ok(StockBatch {
            id: row.id,
            stock_item_id: row.stock_item_id,
            sequence: row.sequence,
            quantity: row.quantity,
            remaining: row.remaining,
            unit_cost: row.unit_cost,
            expiry_date: row.expiry_date,
            production_date: row.production_date,
            status,
            source,
            received_at: row.received_at,
        })
    }
}

const BATCH_COLUMNS: &str = "id, stock_item_id, sequence, quantity, remaining, unit_cost, \
     expiry_date, production_date, status, source_type, source_id, received_at";

const ITEM_SUMMARY_SELECT: &str = r#"
    SELECT si.id, si.code, si.name, si.unit, si.min_stock, si.max_stock,
           si.created_at, si.updated_at,
           COALESCE(SUM(sb.remaining) FILTER (WHERE sb.status = 'available'), 0) AS on_hand
    FROM stock_items si
    LEFT JOIN stock_batches sb ON sb.stock_item_id = si.id
"#;

/// Lock stock item rows in id order so concurrent units of work cannot deadlock
pub async fn lock_items(conn: &mut PgConnection, stock_item_ids: &[Uuid]) -> AppResult<()> {
    let ids: Vec<Uuid> = stock_item_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let locked = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM stock_items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    if let Some(missing) = ids.iter().find(|id| !locked.contains(id)) {
        return Err(AppError::not_found("stock item", missing));
    }
    Ok(())
}

/// Lock the given stock items and load all of their batches
pub async fn load_ledger(conn: &mut PgConnection, stock_item_ids: &[Uuid]) -> AppResult<StockLedger> {
    lock_items(conn, stock_item_ids).await?;

    let rows = sqlx::query_as::<_, StockBatchRow>(&format!(
        "SELECT {} FROM stock_batches WHERE stock_item_id = ANY($1) ORDER BY stock_item_id, sequence",
        BATCH_COLUMNS
    ))
    .bind(stock_item_ids)
    .fetch_all(&mut *conn)
    .await?;

    let batches = rows
        .into_iter()
        .map(StockBatch::try_from)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(StockLedger::from_batches(batches))
}

/// Load the batches created by receiving the given order
pub async fn load_sourced_batches(
    conn: &mut PgConnection,
    reference: &Reference,
) -> AppResult<StockLedger> {
    let rows = sqlx::query_as::<_, StockBatchRow>(&format!(
        "SELECT {} FROM stock_batches WHERE source_type = $1 AND source_id = $2 ORDER BY sequence",
        BATCH_COLUMNS
    ))
    .bind(reference.reference_type.as_str())
    .bind(reference.reference_id)
    .fetch_all(&mut *conn)
    .await?;

    let batches = rows
        .into_iter()
        .map(StockBatch::try_from)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(StockLedger::from_batches(batches))
}

/// Write back every batch the ledger changed and drain its journal
pub async fn persist_ledger(conn: &mut PgConnection, ledger: &mut StockLedger) -> AppResult<()> {
    let received: BTreeSet<Uuid> = ledger
        .journal()
        .iter()
        .filter(|m| m.kind == MovementKind::Received)
        .map(|m| m.batch_id)
        .collect();
    let touched = ledger.touched_batch_ids();

    for batch in ledger.batches() {
        if received.contains(&batch.id) {
            sqlx::query(
                r#"
                INSERT INTO stock_batches (
                    id, stock_item_id, sequence, quantity, remaining, unit_cost,
                    expiry_date, production_date, status, source_type, source_id, received_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(batch.id)
            .bind(batch.stock_item_id)
            .bind(batch.sequence)
            .bind(batch.quantity)
            .bind(batch.remaining)
            .bind(batch.unit_cost)
            .bind(batch.expiry_date)
            .bind(batch.production_date)
            .bind(batch.status.as_str())
            .bind(batch.source.map(|r| r.reference_type.as_str()))
            .bind(batch.source.map(|r| r.reference_id))
            .bind(batch.received_at)
            .execute(&mut *conn)
            .await?;
        } else if touched.contains(&batch.id) {
            sqlx::query("UPDATE stock_batches SET remaining = $2, status = $3 WHERE id = $1")
                .bind(batch.id)
                .bind(batch.remaining)
                .bind(batch.status.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }

    for movement in ledger.take_journal() {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, batch_id, stock_item_id, kind, direction, quantity,
                reference_type, reference_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(movement.batch_id)
        .bind(movement.stock_item_id)
        .bind(movement.kind.as_str())
        .bind(movement.kind.direction())
        .bind(movement.quantity)
        .bind(movement.reference.map(|r| r.reference_type.as_str()))
        .bind(movement.reference.map(|r| r.reference_id))
        .bind(movement.occurred_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a stock item
    ///
    /// A code key may live under one category only; the unique index on
    /// `code_key` backs the check below.
    pub async fn create_item(&self, input: CreateStockItemInput) -> AppResult<StockItemSummary> {
        input.validate()?;
        let code = StockItemCode::parse(input.code.trim())?;
        validate_name("name", &input.name)?;
        validate_unit(&input.unit)?;
        validate_stock_thresholds(input.min_stock, input.max_stock)?;

        let existing = sqlx::query_scalar::<_, String>(
            "SELECT code FROM stock_items WHERE code_key = $1",
        )
        .bind(code.key())
        .fetch_optional(&self.db)
        .await?;

        if let Some(existing) = existing {
            let existing = StockItemCode::parse(&existing)?;
            let message = if code.conflicts_with(&existing) {
                format!(
                    "Key {} is already used by {} in another category",
                    code.key(),
                    existing
                )
            } else {
                format!("Stock item {} already exists", code)
            };
            return Err(DomainError::validation("code", message).into());
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO stock_items (id, code, code_prefix, code_key, name, unit, min_stock, max_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code.to_string())
        .bind(code.prefix())
        .bind(code.key())
        .bind(input.name.trim())
        .bind(input.unit.trim())
        .bind(input.min_stock)
        .bind(input.max_stock)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(stock_item_id = %id, code = %code, "Stock item created");
        self.get_item(id).await
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<StockItemSummary> {
        let row = sqlx::query_as::<_, StockItemRow>(&format!(
            "{} WHERE si.id = $1 GROUP BY si.id",
            ITEM_SUMMARY_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("stock item", id))?;

        Ok(row.into())
    }

    pub async fn list_items(&self) -> AppResult<Vec<StockItemSummary>> {
        let rows = sqlx::query_as::<_, StockItemRow>(&format!(
            "{} GROUP BY si.id ORDER BY si.code",
            ITEM_SUMMARY_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockItemSummary::from).collect())
    }

    /// Items whose on-hand quantity is below their minimum
    pub async fn low_stock(&self) -> AppResult<Vec<StockItemSummary>> {
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .filter(|s| s.level == StockLevel::BelowMinimum)
            .collect())
    }

    /// Batches of an item in allocation order
    pub async fn list_batches(&self, stock_item_id: Uuid) -> AppResult<Vec<StockBatch>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stock_items WHERE id = $1)",
        )
        .bind(stock_item_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::not_found("stock item", stock_item_id));
        }

        let rows = sqlx::query_as::<_, StockBatchRow>(&format!(
            "SELECT {} FROM stock_batches WHERE stock_item_id = $1 \
             ORDER BY expiry_date ASC NULLS LAST, sequence ASC",
            BATCH_COLUMNS
        ))
        .bind(stock_item_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockBatch::try_from).collect()
    }

    /// Expire every available batch whose expiry date has passed
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> AppResult<ExpireSweepResult> {
        let mut tx = self.db.begin().await?;

        let item_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT stock_item_id FROM stock_batches
            WHERE status = 'available' AND expiry_date < $1
            "#,
        )
        .bind(now.date_naive())
        .fetch_all(&mut *tx)
        .await?;

        if item_ids.is_empty() {
            tx.commit().await?;
            return Ok(ExpireSweepResult {
                expired_batch_ids: Vec::new(),
                swept_at: now,
            });
        }

        let mut ledger = load_ledger(&mut *tx, &item_ids).await?;
        let expired_batch_ids = ledger.expire_sweep(now);
        persist_ledger(&mut *tx, &mut ledger).await?;

        tx.commit().await?;

        tracing::info!(expired = expired_batch_ids.len(), "Expiry sweep completed");
        Ok(ExpireSweepResult {
            expired_batch_ids,
            swept_at: now,
        })
    }
}
