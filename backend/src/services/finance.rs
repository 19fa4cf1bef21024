//! Finance transaction persistence, listing and export

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    DomainError, PaginatedResponse, Pagination, PaymentStatus, Posting, Reference, Transaction,
    TransactionCategory, TransactionItem, TransactionType,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
}

/// Query parameters for the transaction listing
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub transaction_type: Option<TransactionType>,
    pub payment_status: Option<PaymentStatus>,
    /// `json` (default) or `csv`
    pub format: Option<String>,
}

/// Flat CSV row for a transaction
#[derive(Debug, Serialize)]
pub struct TransactionCsvRow {
    pub id: Uuid,
    pub transaction_date: NaiveDate,
    pub transaction_type: &'static str,
    pub category: &'static str,
    pub reference_type: &'static str,
    pub reference_id: Uuid,
    pub amount: Decimal,
    pub buy_total: Decimal,
    pub sell_total: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
    pub payment_status: &'static str,
}

impl TransactionQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }

    pub fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

impl From<&Transaction> for TransactionCsvRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            transaction_date: tx.transaction_date,
            transaction_type: tx.transaction_type.as_str(),
            category: tx.category.as_str(),
            reference_type: tx.reference.reference_type.as_str(),
            reference_id: tx.reference.reference_id,
            amount: tx.amount,
            buy_total: tx.buy_total,
            sell_total: tx.sell_total,
            profit: tx.profit,
            margin: tx.margin,
            payment_status: tx.payment_status.as_str(),
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_date: NaiveDate,
    transaction_type: String,
    category: String,
    amount: Decimal,
    buy_total: Decimal,
    sell_total: Decimal,
    profit: Decimal,
    margin: Decimal,
    reference_type: String,
    reference_id: Uuid,
    payment_status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TransactionItemRow {
    id: Uuid,
    transaction_id: Uuid,
    stock_item_id: Uuid,
    order_item_id: Uuid,
    qty: Decimal,
    buy_price: Decimal,
    sell_price: Decimal,
    buy_total: Decimal,
    sell_total: Decimal,
    profit: Decimal,
    margin: Decimal,
}

impl From<TransactionItemRow> for TransactionItem {
    fn from(row: TransactionItemRow) -> Self {
        TransactionItem {
            id: row.id,
            transaction_id: row.transaction_id,
            stock_item_id: row.stock_item_id,
            order_item_id: row.order_item_id,
            qty: row.qty,
            buy_price: row.buy_price,
            sell_price: row.sell_price,
            buy_total: row.buy_total,
            sell_total: row.sell_total,
            profit: row.profit,
            margin: row.margin,
        }
    }
}

impl TransactionRow {
    fn into_model(self, items: Vec<TransactionItem>) -> AppResult<Transaction> {
        let corrupt = |column: &str, value: &str| {
            AppError::from(DomainError::DataIntegrity(format!(
                "Transaction {} has unknown {} {}",
                self.id, column, value
            )))
        };

        let transaction_type = TransactionType::parse(&self.transaction_type)
            .ok_or_else(|| corrupt("transaction_type", &self.transaction_type))?;
        let category = TransactionCategory::parse(&self.category)
            .ok_or_else(|| corrupt("category", &self.category))?;
        let payment_status = PaymentStatus::parse(&self.payment_status)
            .ok_or_else(|| corrupt("payment_status", &self.payment_status))?;
        let reference = Reference::from_parts(&self.reference_type, self.reference_id)
            .ok_or_else(|| corrupt("reference_type", &self.reference_type))?;

        Ok(Transaction {
            id: self.id,
            transaction_date: self.transaction_date,
            transaction_type,
            category,
            amount: self.amount,
            buy_total: self.buy_total,
            sell_total: self.sell_total,
            profit: self.profit,
            margin: self.margin,
            reference,
            payment_status,
            created_at: self.created_at,
            items,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "id, transaction_date, transaction_type, category, amount, \
     buy_total, sell_total, profit, margin, reference_type, reference_id, payment_status, created_at";

const ITEM_COLUMNS: &str = "id, transaction_id, stock_item_id, order_item_id, qty, buy_price, \
     sell_price, buy_total, sell_total, profit, margin";

async fn load_items(
    conn: &mut PgConnection,
    transaction_ids: &[Uuid],
) -> AppResult<Vec<TransactionItemRow>> {
    let rows = sqlx::query_as::<_, TransactionItemRow>(&format!(
        "SELECT {} FROM transaction_items WHERE transaction_id = ANY($1) ORDER BY id",
        ITEM_COLUMNS
    ))
    .bind(transaction_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<TransactionRow>,
) -> AppResult<Vec<Transaction>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = load_items(conn, &ids).await?;

    rows.into_iter()
        .map(|row| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                items.drain(..).partition(|i| i.transaction_id == row.id);
            items = rest;
            row.into_model(mine.into_iter().map(TransactionItem::from).collect())
        })
        .collect()
}

/// The transaction already posted for an order, if any
pub async fn find_by_reference(
    conn: &mut PgConnection,
    reference: &Reference,
) -> AppResult<Option<Transaction>> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {} FROM transactions WHERE reference_type = $1 AND reference_id = $2",
        TRANSACTION_COLUMNS
    ))
    .bind(reference.reference_type.as_str())
    .bind(reference.reference_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(attach_items(conn, vec![row]).await?.into_iter().next()),
        None => Ok(None),
    }
}

/// Persist a newly created posting; existing postings are left alone
///
/// The unique index on the reference makes a concurrent duplicate insert a
/// no-op, after which the stored transaction wins.
pub async fn store_posting(conn: &mut PgConnection, posting: Posting) -> AppResult<Transaction> {
    let tx = match posting {
        Posting::Existing(tx) => return Ok(tx),
        Posting::Created(tx) => tx,
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO transactions (
            id, transaction_date, transaction_type, category, amount, buy_total, sell_total,
            profit, margin, reference_type, reference_id, payment_status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (reference_type, reference_id) DO NOTHING
        "#,
    )
    .bind(tx.id)
    .bind(tx.transaction_date)
    .bind(tx.transaction_type.as_str())
    .bind(tx.category.as_str())
    .bind(tx.amount)
    .bind(tx.buy_total)
    .bind(tx.sell_total)
    .bind(tx.profit)
    .bind(tx.margin)
    .bind(tx.reference.reference_type.as_str())
    .bind(tx.reference.reference_id)
    .bind(tx.payment_status.as_str())
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        tracing::warn!(reference = %tx.reference, "Transaction already posted, keeping stored one");
        return find_by_reference(conn, &tx.reference).await?.ok_or_else(|| {
            DomainError::DataIntegrity(format!(
                "Transaction for {} conflicted but cannot be found",
                tx.reference
            ))
            .into()
        });
    }

    for item in &tx.items {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, stock_item_id, order_item_id, qty, buy_price, sell_price,
                buy_total, sell_total, profit, margin
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.id)
        .bind(item.transaction_id)
        .bind(item.stock_item_id)
        .bind(item.order_item_id)
        .bind(item.qty)
        .bind(item.buy_price)
        .bind(item.sell_price)
        .bind(item.buy_total)
        .bind(item.sell_total)
        .bind(item.profit)
        .bind(item.margin)
        .execute(&mut *conn)
        .await?;
    }

    tracing::info!(
        transaction_id = %tx.id,
        reference = %tx.reference,
        amount = %tx.amount,
        "Finance transaction posted"
    );
    Ok(tx)
}

impl FinanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Transactions, newest first
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<Transaction>> {
        let pagination = query.pagination();
        let (limit, offset) = pagination.limit_offset();
        let transaction_type = query.transaction_type.map(|t| t.as_str());
        let payment_status = query.payment_status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE ($1::text IS NULL OR transaction_type = $1)
              AND ($2::text IS NULL OR payment_status = $2)
            "#,
        )
        .bind(transaction_type)
        .bind(payment_status)
        .fetch_one(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE ($1::text IS NULL OR transaction_type = $1)
              AND ($2::text IS NULL OR payment_status = $2)
            ORDER BY transaction_date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(transaction_type)
        .bind(payment_status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let data = attach_items(&mut *conn, rows).await?;
        Ok(PaginatedResponse::new(data, &pagination, total.max(0) as u64))
    }

    pub async fn get_transaction(&self, id: Uuid) -> AppResult<Transaction> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("transaction", id))?;

        attach_items(&mut *conn, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("transaction", id))
    }

    /// Flip a transaction to PAID; the only mutation a transaction allows
    pub async fn mark_paid(&self, id: Uuid) -> AppResult<Transaction> {
        let updated = sqlx::query("UPDATE transactions SET payment_status = 'paid' WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::not_found("transaction", id));
        }

        tracing::info!(transaction_id = %id, "Transaction marked paid");
        self.get_transaction(id).await
    }

    /// Export transactions as CSV
    pub fn export_to_csv(transactions: &[Transaction]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for tx in transactions {
            wtr.serialize(TransactionCsvRow::from(tx))
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> Transaction {
        let id = Uuid::new_v4();
        Transaction {
            id,
            transaction_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            transaction_type: TransactionType::Sales,
            category: TransactionCategory::KitchenOrder,
            amount: Decimal::from(400),
            buy_total: Decimal::from(270),
            sell_total: Decimal::from(400),
            profit: Decimal::from(130),
            margin: Decimal::new(325, 3),
            reference: Reference::kitchen_order(Uuid::new_v4()),
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_csv_export_has_header_and_one_row_per_transaction() {
        let csv = FinanceService::export_to_csv(&[transaction(), transaction()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,transaction_date,transaction_type,category"));
        assert!(lines[1].contains(",sales,kitchen_order,kitchen_order,"));
        assert!(lines[1].ends_with(",400,270,400,130,0.325,unpaid"));
    }

    #[test]
    fn test_csv_export_of_nothing_is_empty() {
        let csv = FinanceService::export_to_csv(&[]).unwrap();
        assert!(csv.is_empty());
    }
}
