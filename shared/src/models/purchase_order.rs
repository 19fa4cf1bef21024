//! Purchase order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Purchase order status (procurement from a supplier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    /// Sent to the supplier
    Terkirim,
    DikonfirmasiSupplier,
    DikonfirmasiKoperasi,
    /// Goods received; terminal
    Selesai,
    /// Terminal
    Dibatalkan,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Terkirim => "terkirim",
            PurchaseOrderStatus::DikonfirmasiSupplier => "dikonfirmasi_supplier",
            PurchaseOrderStatus::DikonfirmasiKoperasi => "dikonfirmasi_koperasi",
            PurchaseOrderStatus::Selesai => "selesai",
            PurchaseOrderStatus::Dibatalkan => "dibatalkan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "terkirim" => Some(PurchaseOrderStatus::Terkirim),
            "dikonfirmasi_supplier" => Some(PurchaseOrderStatus::DikonfirmasiSupplier),
            "dikonfirmasi_koperasi" => Some(PurchaseOrderStatus::DikonfirmasiKoperasi),
            "selesai" => Some(PurchaseOrderStatus::Selesai),
            "dibatalkan" => Some(PurchaseOrderStatus::Dibatalkan),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase order with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub supplier_id: Uuid,
    pub status: PurchaseOrderStatus,
    pub estimated_total: Decimal,
    /// Null until the order is SELESAI
    pub actual_total: Option<Decimal>,
    /// QR string issued when the order was sent
    pub qr_code: Option<String>,
    pub notes: Option<String>,
    pub sent_to_supplier_at: Option<DateTime<Utc>>,
    pub supplier_confirmed_at: Option<DateTime<Utc>>,
    pub koperasi_confirmed_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<PurchaseOrderItem>,
}

/// A line of a purchase order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub stock_item_id: Uuid,
    pub position: i32,
    pub estimated_unit_price: Decimal,
    pub estimated_qty: Decimal,
    /// Always estimated_unit_price × estimated_qty
    pub estimated_subtotal: Decimal,
    pub actual_unit_price: Option<Decimal>,
    pub actual_qty: Option<Decimal>,
    pub actual_subtotal: Option<Decimal>,
    pub received_qty: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
}

/// Input line for creating a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub stock_item_id: Uuid,
    pub estimated_unit_price: Decimal,
    pub estimated_qty: Decimal,
}

/// Supplier-confirmed figures for one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierItemActual {
    pub item_id: Uuid,
    pub actual_unit_price: Decimal,
    pub actual_qty: Decimal,
}

/// Goods received for one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedItem {
    pub item_id: Uuid,
    pub received_qty: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
}

impl PurchaseOrder {
    /// Build a new DRAFT purchase order
    pub fn draft(
        po_number: String,
        supplier_id: Uuid,
        notes: Option<String>,
        lines: Vec<NewPurchaseOrderItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "items",
                "A purchase order needs at least one item",
            ));
        }

        let id = Uuid::new_v4();
        let mut items = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if line.estimated_qty <= Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].estimated_qty", idx),
                    "Quantity must be positive",
                ));
            }
            if line.estimated_unit_price < Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].estimated_unit_price", idx),
                    "Unit price cannot be negative",
                ));
            }

            items.push(PurchaseOrderItem {
                id: Uuid::new_v4(),
                purchase_order_id: id,
                stock_item_id: line.stock_item_id,
                position: idx as i32,
                estimated_unit_price: line.estimated_unit_price,
                estimated_qty: line.estimated_qty,
                estimated_subtotal: line.estimated_unit_price * line.estimated_qty,
                actual_unit_price: None,
                actual_qty: None,
                actual_subtotal: None,
                received_qty: None,
                expiry_date: None,
                production_date: None,
            });
        }

        let estimated_total = items.iter().map(|i| i.estimated_subtotal).sum();

        Ok(Self {
            id,
            po_number,
            supplier_id,
            status: PurchaseOrderStatus::Draft,
            estimated_total,
            actual_total: None,
            qr_code: None,
            notes,
            sent_to_supplier_at: None,
            supplier_confirmed_at: None,
            koperasi_confirmed_at: None,
            received_at: None,
            cancelled_at: None,
            rejection_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            items,
        })
    }

    pub fn item(&self, item_id: Uuid) -> Option<&PurchaseOrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }
}
