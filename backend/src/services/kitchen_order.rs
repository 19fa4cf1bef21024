//! Kitchen order service
//!
//! Processing and cancellation touch stock, so they lock the order row first
//! and then the affected stock items in id order.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    BatchAllocation, DocumentKind, DomainError, ItemApproval, KitchenOrder, KitchenOrderItem,
    KitchenOrderStatus, NewKitchenOrderItem, OrderContext, PaginatedResponse, QrSigner,
    Transaction,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{finance, qr, sequence, stock, CancelInput, OrderQuery};

#[derive(Clone)]
pub struct KitchenOrderService {
    db: PgPool,
    signer: Arc<QrSigner>,
    qr_ttl: Duration,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateKitchenOrderInput {
    pub dapur_id: Uuid,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub items: Vec<NewKitchenOrderItem>,
}

/// Approved quantities; items left out are approved in full
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProcessOrderInput {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub items: Vec<ItemApproval>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DeliverOrderInput {
    #[validate(length(min = 1, max = 2048))]
    pub qr_string: Option<String>,
}

/// Outcome of a confirmed delivery
#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    pub order: KitchenOrder,
    pub transaction: Transaction,
}

#[derive(Debug, FromRow)]
struct KitchenOrderRow {
    id: Uuid,
    order_number: String,
    dapur_id: Uuid,
    status: String,
    estimated_total: Decimal,
    actual_total: Option<Decimal>,
    qr_code: Option<String>,
    notes: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct KitchenOrderItemRow {
    id: Uuid,
    kitchen_order_id: Uuid,
    stock_item_id: Uuid,
    position: i32,
    requested_qty: Decimal,
    approved_qty: Option<Decimal>,
    unit_price: Decimal,
    subtotal: Decimal,
    buy_price: Option<Decimal>,
    buy_total: Option<Decimal>,
    profit: Option<Decimal>,
    stock_allocations: Json<Vec<BatchAllocation>>,
}

impl From<KitchenOrderItemRow> for KitchenOrderItem {
    fn from(row: KitchenOrderItemRow) -> Self {
        KitchenOrderItem {
            id: row.id,
            kitchen_order_id: row.kitchen_order_id,
            stock_item_id: row.stock_item_id,
            position: row.position,
            requested_qty: row.requested_qty,
            approved_qty: row.approved_qty,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
            buy_price: row.buy_price,
            buy_total: row.buy_total,
            profit: row.profit,
            stock_allocations: row.stock_allocations.0,
        }
    }
}

impl KitchenOrderRow {
    fn into_model(self, items: Vec<KitchenOrderItem>) -> AppResult<KitchenOrder> {
        let status = KitchenOrderStatus::parse(&self.status).ok_or_else(|| {
            DomainError::DataIntegrity(format!(
                "Kitchen order {} has unknown status {}",
                self.order_number, self.status
            ))
        })?;

        Ok(KitchenOrder {
            id: self.id,
            order_number: self.order_number,
            dapur_id: self.dapur_id,
            status,
            estimated_total: self.estimated_total,
            actual_total: self.actual_total,
            qr_code: self.qr_code,
            notes: self.notes,
            sent_at: self.sent_at,
            processed_at: self.processed_at,
            delivered_at: self.delivered_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
            cancellation_reason: self.cancellation_reason,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, dapur_id, status, estimated_total, actual_total, \
     qr_code, notes, sent_at, processed_at, delivered_at, received_at, cancelled_at, \
     cancellation_reason, deleted_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, kitchen_order_id, stock_item_id, position, requested_qty, \
     approved_qty, unit_price, subtotal, buy_price, buy_total, profit, stock_allocations";

async fn load_items(conn: &mut PgConnection, order_ids: &[Uuid]) -> AppResult<Vec<KitchenOrderItem>> {
    let rows = sqlx::query_as::<_, KitchenOrderItemRow>(&format!(
        "SELECT {} FROM kitchen_order_items WHERE kitchen_order_id = ANY($1) \
         ORDER BY kitchen_order_id, position",
        ITEM_COLUMNS
    ))
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(KitchenOrderItem::from).collect())
}

async fn lock_order(conn: &mut PgConnection, id: Uuid) -> AppResult<KitchenOrder> {
    let row = sqlx::query_as::<_, KitchenOrderRow>(&format!(
        "SELECT {} FROM kitchen_orders WHERE id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("kitchen order", id))?;

    let items = load_items(conn, &[id]).await?;
    row.into_model(items)
}

async fn insert_order(conn: &mut PgConnection, order: &KitchenOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO kitchen_orders (
            id, order_number, dapur_id, status, estimated_total, notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.dapur_id)
    .bind(order.status.as_str())
    .bind(order.estimated_total)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO kitchen_order_items (
                id, kitchen_order_id, stock_item_id, position, requested_qty, unit_price, subtotal
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.kitchen_order_id)
        .bind(item.stock_item_id)
        .bind(item.position)
        .bind(item.requested_qty)
        .bind(item.unit_price)
        .bind(item.subtotal)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn save_order(conn: &mut PgConnection, order: &KitchenOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE kitchen_orders SET
            status = $2, actual_total = $3, qr_code = $4, sent_at = $5, processed_at = $6,
            delivered_at = $7, received_at = $8, cancelled_at = $9, cancellation_reason = $10,
            deleted_at = $11, updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(order.actual_total)
    .bind(&order.qr_code)
    .bind(order.sent_at)
    .bind(order.processed_at)
    .bind(order.delivered_at)
    .bind(order.received_at)
    .bind(order.cancelled_at)
    .bind(&order.cancellation_reason)
    .bind(order.deleted_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            UPDATE kitchen_order_items SET
                approved_qty = $2, subtotal = $3, buy_price = $4, buy_total = $5,
                profit = $6, stock_allocations = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.approved_qty)
        .bind(item.subtotal)
        .bind(item.buy_price)
        .bind(item.buy_total)
        .bind(item.profit)
        .bind(Json(&item.stock_allocations))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn log_transition(order: &KitchenOrder, event: &str) {
    tracing::info!(
        kitchen_order_id = %order.id,
        order_number = %order.order_number,
        status = %order.status,
        "Kitchen order {}",
        event
    );
}

impl KitchenOrderService {
    pub fn new(db: PgPool, signer: Arc<QrSigner>, qr_ttl: Duration) -> Self {
        Self { db, signer, qr_ttl }
    }

    fn context(&self) -> OrderContext<'_> {
        OrderContext::new(&self.signer, self.qr_ttl, Utc::now())
    }

    /// Create a DRAFT kitchen order for a dapur
    pub async fn create(&self, input: CreateKitchenOrderInput) -> AppResult<KitchenOrder> {
        input.validate()?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let dapur_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM dapurs WHERE id = $1)",
        )
        .bind(input.dapur_id)
        .fetch_one(&mut *tx)
        .await?;

        if !dapur_exists {
            return Err(AppError::not_found("dapur", input.dapur_id));
        }

        let stock_item_ids: Vec<Uuid> = input.items.iter().map(|i| i.stock_item_id).collect();
        stock::lock_items(&mut *tx, &stock_item_ids).await?;

        let order_number =
            sequence::next_document_number(&mut *tx, DocumentKind::KitchenOrder, now).await?;
        let notes = input.notes.filter(|n| !n.trim().is_empty());
        let order = KitchenOrder::draft(order_number, input.dapur_id, notes, input.items, now)?;

        insert_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "created");
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<KitchenOrder> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, KitchenOrderRow>(&format!(
            "SELECT {} FROM kitchen_orders WHERE id = $1 AND deleted_at IS NULL",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("kitchen order", id))?;

        let items = load_items(&mut *conn, &[id]).await?;
        row.into_model(items)
    }

    pub async fn list(&self, query: &OrderQuery) -> AppResult<PaginatedResponse<KitchenOrder>> {
        if let Some(status) = &query.status {
            if KitchenOrderStatus::parse(status).is_none() {
                return Err(
                    DomainError::validation("status", format!("Unknown status {}", status)).into(),
                );
            }
        }
        let pagination = query.pagination();
        let (limit, offset) = pagination.limit_offset();

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM kitchen_orders
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            "#,
        )
        .bind(&query.status)
        .fetch_one(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, KitchenOrderRow>(&format!(
            r#"
            SELECT {} FROM kitchen_orders
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(&query.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = load_items(&mut *conn, &ids).await?;

        let orders = rows
            .into_iter()
            .map(|row| {
                let (mine, rest): (Vec<_>, Vec<_>) =
                    items.drain(..).partition(|i| i.kitchen_order_id == row.id);
                items = rest;
                row.into_model(mine)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(orders, &pagination, total.max(0) as u64))
    }

    /// DRAFT → TERKIRIM
    pub async fn send(&self, id: Uuid) -> AppResult<KitchenOrder> {
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;

        let code = order.send(&ctx)?;
        qr::store_code(&mut *tx, &code).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "sent");
        Ok(order)
    }

    /// TERKIRIM → DIPROSES, allocating stock for every approved quantity
    pub async fn process(&self, id: Uuid, input: ProcessOrderInput) -> AppResult<KitchenOrder> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;

        let stock_item_ids: Vec<Uuid> = order.items.iter().map(|i| i.stock_item_id).collect();
        let mut ledger = stock::load_ledger(&mut *tx, &stock_item_ids).await?;

        order.process(&ctx, &input.items, &mut ledger)?;

        stock::persist_ledger(&mut *tx, &mut ledger).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "processed");
        Ok(order)
    }

    /// DIPROSES → DITERIMA_DAPUR, posting the sale
    pub async fn deliver(&self, id: Uuid, input: DeliverOrderInput) -> AppResult<DeliveryResponse> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;

        if let Some(qr_string) = input.qr_string.as_deref() {
            qr::ensure_active(&mut *tx, qr_string, ctx.now).await?;
        }

        let existing = finance::find_by_reference(&mut *tx, &order.reference()).await?;
        let posting = order.deliver_and_confirm(&ctx, input.qr_string.as_deref(), existing)?;

        let transaction = finance::store_posting(&mut *tx, posting).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "delivered");
        Ok(DeliveryResponse { order, transaction })
    }

    /// Any non-terminal state → DIBATALKAN, returning held stock
    pub async fn cancel(&self, id: Uuid, input: CancelInput) -> AppResult<KitchenOrder> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;

        let stock_item_ids: Vec<Uuid> = order
            .items
            .iter()
            .filter(|i| !i.stock_allocations.is_empty())
            .map(|i| i.stock_item_id)
            .collect();
        let mut ledger = stock::load_ledger(&mut *tx, &stock_item_ids).await?;

        order.cancel(&ctx, &input.reason, &mut ledger)?;

        stock::persist_ledger(&mut *tx, &mut ledger).await?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "cancelled");
        Ok(order)
    }

    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut order = lock_order(&mut *tx, id).await?;

        order.soft_delete(&ctx)?;
        save_order(&mut *tx, &order).await?;
        tx.commit().await?;

        log_transition(&order, "deleted");
        Ok(())
    }
}
