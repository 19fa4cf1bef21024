//! Kitchen order models (orders placed by a dapur against cooperative stock)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BatchAllocation;
use crate::error::{DomainError, DomainResult};

/// Kitchen order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KitchenOrderStatus {
    Draft,
    Terkirim,
    /// Approved and stock allocated
    Diproses,
    /// Delivered and accepted by the kitchen; terminal
    DiterimaDapur,
    Dibatalkan,
}

impl KitchenOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KitchenOrderStatus::Draft => "draft",
            KitchenOrderStatus::Terkirim => "terkirim",
            KitchenOrderStatus::Diproses => "diproses",
            KitchenOrderStatus::DiterimaDapur => "diterima_dapur",
            KitchenOrderStatus::Dibatalkan => "dibatalkan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(KitchenOrderStatus::Draft),
            "terkirim" => Some(KitchenOrderStatus::Terkirim),
            "diproses" => Some(KitchenOrderStatus::Diproses),
            "diterima_dapur" => Some(KitchenOrderStatus::DiterimaDapur),
            "dibatalkan" => Some(KitchenOrderStatus::Dibatalkan),
            _ => None,
        }
    }
}

impl std::fmt::Display for KitchenOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kitchen order with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenOrder {
    pub id: Uuid,
    pub order_number: String,
    pub dapur_id: Uuid,
    pub status: KitchenOrderStatus,
    pub estimated_total: Decimal,
    pub actual_total: Option<Decimal>,
    pub qr_code: Option<String>,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<KitchenOrderItem>,
}

/// A line of a kitchen order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrderItem {
    pub id: Uuid,
    pub kitchen_order_id: Uuid,
    pub stock_item_id: Uuid,
    pub position: i32,
    pub requested_qty: Decimal,
    /// Set when processed; never above requested_qty
    pub approved_qty: Option<Decimal>,
    /// Selling price per unit
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// Weighted unit cost of the allocated batches
    pub buy_price: Option<Decimal>,
    pub buy_total: Option<Decimal>,
    pub profit: Option<Decimal>,
    /// Batches that satisfied this item, in allocation order
    pub stock_allocations: Vec<BatchAllocation>,
}

impl KitchenOrderItem {
    pub fn allocated_qty(&self) -> Decimal {
        self.stock_allocations.iter().map(|a| a.qty).sum()
    }
}

/// Input line for creating a kitchen order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKitchenOrderItem {
    pub stock_item_id: Uuid,
    pub requested_qty: Decimal,
    pub unit_price: Decimal,
}

/// Approved quantity for one item when processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemApproval {
    pub item_id: Uuid,
    pub approved_qty: Decimal,
}

impl KitchenOrder {
    /// Build a new DRAFT kitchen order
    pub fn draft(
        order_number: String,
        dapur_id: Uuid,
        notes: Option<String>,
        lines: Vec<NewKitchenOrderItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "items",
                "A kitchen order needs at least one item",
            ));
        }

        let id = Uuid::new_v4();
        let mut items = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if line.requested_qty <= Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].requested_qty", idx),
                    "Quantity must be positive",
                ));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].unit_price", idx),
                    "Unit price cannot be negative",
                ));
            }

            items.push(KitchenOrderItem {
                id: Uuid::new_v4(),
                kitchen_order_id: id,
                stock_item_id: line.stock_item_id,
                position: idx as i32,
                requested_qty: line.requested_qty,
                approved_qty: None,
                unit_price: line.unit_price,
                subtotal: line.requested_qty * line.unit_price,
                buy_price: None,
                buy_total: None,
                profit: None,
                stock_allocations: Vec::new(),
            });
        }

        let estimated_total = items.iter().map(|i| i.subtotal).sum();

        Ok(Self {
            id,
            order_number,
            dapur_id,
            status: KitchenOrderStatus::Draft,
            estimated_total,
            actual_total: None,
            qr_code: None,
            notes,
            sent_at: None,
            processed_at: None,
            delivered_at: None,
            received_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_totals() {
        let order = KitchenOrder::draft(
            "KO-202610-0001".to_string(),
            Uuid::new_v4(),
            None,
            vec![
                NewKitchenOrderItem {
                    stock_item_id: Uuid::new_v4(),
                    requested_qty: Decimal::from(5),
                    unit_price: Decimal::from(120),
                },
                NewKitchenOrderItem {
                    stock_item_id: Uuid::new_v4(),
                    requested_qty: Decimal::from(2),
                    unit_price: Decimal::from(50),
                },
            ],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.status, KitchenOrderStatus::Draft);
        assert_eq!(order.estimated_total, Decimal::from(700));
        assert!(order.items.iter().all(|i| i.approved_qty.is_none()));
        assert!(order.items.iter().all(|i| i.stock_allocations.is_empty()));
    }

    #[test]
    fn test_draft_rejects_zero_quantity() {
        let err = KitchenOrder::draft(
            "KO-1".to_string(),
            Uuid::new_v4(),
            None,
            vec![NewKitchenOrderItem {
                stock_item_id: Uuid::new_v4(),
                requested_qty: Decimal::ZERO,
                unit_price: Decimal::ONE,
            }],
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
