//! Purchase order service
//!
//! Every transition runs in one database transaction: the order row is locked
//! with `FOR UPDATE`, the engine applies the change in memory, and the order,
//! stock batches, movements, posting and QR code are written back together.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    DocumentKind, DomainError, NewPurchaseOrderItem, OrderContext, PaginatedResponse,
    PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, QrSigner, ReceivedItem,
    SupplierItemActual, Transaction,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{finance, qr, sequence, stock, CancelInput, OrderQuery};

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
    signer: Arc<QrSigner>,
    qr_ttl: Duration,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: Uuid,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub items: Vec<NewPurchaseOrderItem>,
}

/// Supplier confirmation payload
#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmSupplierInput {
    #[validate(length(min = 1))]
    pub items: Vec<SupplierItemActual>,
}

/// Goods receipt payload
#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveGoodsInput {
    #[validate(length(min = 1))]
    pub items: Vec<ReceivedItem>,
    /// Scanned QR string, checked against the order when present
    pub qr_string: Option<String>,
}

/// Outcome of a goods receipt
#[derive(Debug, Serialize)]
pub struct ReceiveGoodsResponse {
    pub order: PurchaseOrder,
    pub batch_ids: Vec<Uuid>,
    pub transaction: Transaction,
}

#[derive(Debug, FromRow)]
struct PurchaseOrderRow {
    id: Uuid,
    po_number: String,
    supplier_id: Uuid,
    status: String,
    estimated_total: Decimal,
    actual_total: Option<Decimal>,
    qr_code: Option<String>,
    notes: Option<String>,
    sent_to_supplier_at: Option<DateTime<Utc>>,
    supplier_confirmed_at: Option<DateTime<Utc>>,
    koperasi_confirmed_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PurchaseOrderItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    stock_item_id: Uuid,
    position: i32,
    estimated_unit_price: Decimal,
    estimated_qty: Decimal,
    estimated_subtotal: Decimal,
    actual_unit_price: Option<Decimal>,
    actual_qty: Option<Decimal>,
    actual_subtotal: Option<Decimal>,
    received_qty: Option<Decimal>,
    expiry_date: Option<NaiveDate>,
    production_date: Option<NaiveDate>,
}

impl From<PurchaseOrderItemRow> for PurchaseOrderItem {
    fn from(row: PurchaseOrderItemRow) -> Self {
        PurchaseOrderItem {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            stock_item_id: row.stock_item_id,
            position: row.position,
            estimated_unit_price: row.estimated_unit_price,
            estimated_qty: row.estimated_qty,
            estimated_subtotal: row.estimated_subtotal,
            actual_unit_price: row.actual_unit_price,
            actual_qty: row.actual_qty,
            actual_subtotal: row.actual_subtotal,
            received_qty: row.received_qty,
            expiry_date: row.expiry_date,
            production_date: row.production_date,
        }
    }
}

impl PurchaseOrderRow {
    fn into_model(self, items: Vec<PurchaseOrderItem>) -> AppResult<PurchaseOrder> {
        let status = PurchaseOrderStatus::parse(&self.status).ok_or_else(|| {
            DomainError::DataIntegrity(format!(
                "Purchase order {} has unknown status {}",
                self.po_number, self.status
            ))
        })?;

        Ok(PurchaseOrder {
            id: self.id,
            po_number: self.po_number,
            supplier_id: self.supplier_id,
            status,
            estimated_total: self.estimated_total,
            actual_total: self.actual_total,
            qr_code: self.qr_code,
            notes: self.notes,
            sent_to_supplier_at: self.sent_to_supplier_at,
            supplier_confirmed_at: self.supplier_confirmed_at,
            koperasi_confirmed_at: self.koperasi_confirmed_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
            rejection_reason: self.rejection_reason,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

const ORDER_COLUMNS: &str = "id, po_number, supplier_id, status, estimated_total, actual_total, \
     qr_code, notes, sent_to_supplier_at, supplier_confirmed_at, koperasi_confirmed_at, \
     received_at, cancelled_at, rejection_reason, deleted_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, purchase_order_id, stock_item_id, position, estimated_unit_price, \
     estimated_qty, estimated_subtotal, actual_unit_price, actual_qty, actual_subtotal, \
     received_qty, expiry_date, production_date";

async fn load_items(conn: &mut PgConnection, order_ids: &[Uuid]) -> AppResult<Vec<PurchaseOrderItem>> {
    let rows = sqlx::query_as::<_, PurchaseOrderItemRow>(&format!(
        "SELECT {} FROM purchase_order_items WHERE purchase_order_id = ANY($1) \
         ORDER BY purchase_order_id, position",
        ITEM_COLUMNS
    ))
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(PurchaseOrderItem::from).collect())
}

/// Lock and load an order, soft-deleted ones included
async fn lock_order(conn: &mut PgConnection, id: Uuid) -> AppResult<PurchaseOrder> {
    let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
        "SELECT {} FROM purchase_orders WHERE id = $1 FOR UPDATE",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("purchase order", id))?;

    let items = load_items(conn, &[id]).await?;
    row.into_model(items)
}

async fn insert_order(conn: &mut PgConnection, po: &PurchaseOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO purchase_orders (
            id, po_number, supplier_id, status, estimated_total, notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(po.id)
    .bind(&po.po_number)
    .bind(po.supplier_id)
    .bind(po.status.as_str())
    .bind(po.estimated_total)
    .bind(&po.notes)
    .bind(po.created_at)
    .bind(po.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &po.items {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                id, purchase_order_id, stock_item_id, position,
                estimated_unit_price, estimated_qty, estimated_subtotal
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.purchase_order_id)
        .bind(item.stock_item_id)
        .bind(item.position)
        .bind(item.estimated_unit_price)
        .bind(item.estimated_qty)
        .bind(item.estimated_subtotal)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Write back every mutable column of an order and its items
async fn save_order(conn: &mut PgConnection, po: &PurchaseOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_orders SET
            status = $2, actual_total = $3, qr_code = $4,
            sent_to_supplier_at = $5, supplier_confirmed_at = $6, koperasi_confirmed_at = $7,
            received_at = $8, cancelled_at = $9, rejection_reason = $10,
            deleted_at = $11, updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(po.id)
    .bind(po.status.as_str())
    .bind(po.actual_total)
    .bind(&po.qr_code)
    .bind(po.sent_to_supplier_at)
    .bind(po.supplier_confirmed_at)
    .bind(po.koperasi_confirmed_at)
    .bind(po.received_at)
    .bind(po.cancelled_at)
    .bind(&po.rejection_reason)
    .bind(po.deleted_at)
    .bind(po.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &po.items {
        sqlx::query(
            r#"
            UPDATE purchase_order_items SET
                actual_unit_price = $2, actual_qty = $3, actual_subtotal = $4,
                received_qty = $5, expiry_date = $6, production_date = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.actual_unit_price)
        .bind(item.actual_qty)
        .bind(item.actual_subtotal)
        .bind(item.received_qty)
        .bind(item.expiry_date)
        .bind(item.production_date)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn log_transition(po: &PurchaseOrder, event: &str) {
    tracing::info!(
        purchase_order_id = %po.id,
        po_number = %po.po_number,
        status = %po.status,
        "Purchase order {}",
        event
    );
}

impl PurchaseOrderService {
    pub fn new(db: PgPool, signer: Arc<QrSigner>, qr_ttl: Duration) -> Self {
        Self { db, signer, qr_ttl }
    }

    fn context(&self) -> OrderContext<'_> {
        OrderContext::new(&self.signer, self.qr_ttl, Utc::now())
    }

    /// Create a DRAFT purchase order with a generated number
    pub async fn create(&self, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        input.validate()?;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let stock_item_ids: Vec<Uuid> = input.items.iter().map(|i| i.stock_item_id).collect();
        stock::lock_items(&mut *tx, &stock_item_ids).await?;

        let po_number =
            sequence::next_document_number(&mut *tx, DocumentKind::PurchaseOrder, now).await?;
        let notes = input.notes.filter(|n| !n.trim().is_empty());
        let po = PurchaseOrder::draft(po_number, input.supplier_id, notes, input.items, now)?;

        insert_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "created");
        Ok(po)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let mut conn = self.db.acquire().await?;
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 AND deleted_at IS NULL",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("purchase order", id))?;

        let items = load_items(&mut *conn, &[id]).await?;
        row.into_model(items)
    }

    /// Live purchase orders, newest first
    pub async fn list(&self, query: &OrderQuery) -> AppResult<PaginatedResponse<PurchaseOrder>> {
        if let Some(status) = &query.status {
            if PurchaseOrderStatus::parse(status).is_none() {
                return Err(
                    DomainError::validation("status", format!("Unknown status {}", status)).into(),
                );
            }
        }
        let pagination = query.pagination();
        let (limit, offset) = pagination.limit_offset();

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM purchase_orders
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1)
            "#,
        )
        .bind(&query.status)
        .fetch_one(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r#"
            SELECT {} FROM purchase_orders
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
                    items.drain(..).partition(|i| i.purchase_order_id == row.id);
                items = rest;
                row.into_model(mine)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(orders, &pagination, total.max(0) as u64))
    }

    /// DRAFT → TERKIRIM
    pub async fn send(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        let code = po.send(&ctx)?;
        qr::store_code(&mut *tx, &code).await?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "sent to supplier");
        Ok(po)
    }

    /// TERKIRIM → DIKONFIRMASI_SUPPLIER
    pub async fn confirm_supplier(
        &self,
        id: Uuid,
        input: ConfirmSupplierInput,
    ) -> AppResult<PurchaseOrder> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        po.confirm_supplier(&ctx, &input.items)?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "confirmed by supplier");
        Ok(po)
    }

    /// DIKONFIRMASI_SUPPLIER → DIKONFIRMASI_KOPERASI
    pub async fn confirm_koperasi(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        po.confirm_koperasi(&ctx)?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "confirmed by koperasi");
        Ok(po)
    }

    /// DIKONFIRMASI_KOPERASI → SELESAI: batches in, purchase transaction out
    pub async fn receive_goods(
        &self,
        id: Uuid,
        input: ReceiveGoodsInput,
    ) -> AppResult<ReceiveGoodsResponse> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        if let Some(qr_string) = input.qr_string.as_deref() {
            qr::ensure_active(&mut *tx, qr_string, ctx.now).await?;
        }

        let stock_item_ids: Vec<Uuid> = po.items.iter().map(|i| i.stock_item_id).collect();
        let mut ledger = stock::load_ledger(&mut *tx, &stock_item_ids).await?;
        let existing = finance::find_by_reference(&mut *tx, &po.reference()).await?;

        let receipt = po.receive_goods(
            &ctx,
            &input.items,
            input.qr_string.as_deref(),
            &mut ledger,
            existing,
        )?;

        stock::persist_ledger(&mut *tx, &mut ledger).await?;
        let transaction = finance::store_posting(&mut *tx, receipt.posting).await?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "received");
        Ok(ReceiveGoodsResponse {
            order: po,
            batch_ids: receipt.batch_ids,
            transaction,
        })
    }

    /// Any non-terminal state → DIBATALKAN
    pub async fn cancel(&self, id: Uuid, input: CancelInput) -> AppResult<PurchaseOrder> {
        input.validate()?;
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        let sourced = stock::load_sourced_batches(&mut *tx, &po.reference()).await?;
        po.cancel(&ctx, &input.reason, &sourced)?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "cancelled");
        Ok(po)
    }

    /// Hide a DRAFT or closed order
    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let ctx = self.context();
        let mut tx = self.db.begin().await?;
        let mut po = lock_order(&mut *tx, id).await?;

        po.soft_delete(&ctx)?;
        save_order(&mut *tx, &po).await?;
        tx.commit().await?;

        log_transition(&po, "deleted");
        Ok(())
    }
}
