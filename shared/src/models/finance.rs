//! Finance transaction models derived from completed orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Sales,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sales => "sales",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(TransactionType::Purchase),
            "sales" => Some(TransactionType::Sales),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Po,
    KitchenOrder,
    Adjustment,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Po => "po",
            TransactionCategory::KitchenOrder => "kitchen_order",
            TransactionCategory::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "po" => Some(TransactionCategory::Po),
            "kitchen_order" => Some(TransactionCategory::KitchenOrder),
            "adjustment" => Some(TransactionCategory::Adjustment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// A finance transaction; immutable apart from `payment_status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_date: NaiveDate,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub buy_total: Decimal,
    pub sell_total: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
    /// Originating order; at most one transaction per reference
    pub reference: Reference,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<TransactionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub stock_item_id: Uuid,
    /// Order item this line was derived from
    pub order_item_id: Uuid,
    pub qty: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub buy_total: Decimal,
    pub sell_total: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
}
