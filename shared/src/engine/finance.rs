//! Derivation of finance transactions from completed orders
//!
//! Posting is idempotent per (reference_type, reference_id): when a
//! transaction already exists for the order it is returned unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    KitchenOrder, KitchenOrderStatus, PaymentStatus, PurchaseOrder, PurchaseOrderStatus,
    Reference, Transaction, TransactionCategory, TransactionItem, TransactionType,
};

/// Outcome of a posting attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Posting {
    /// A new transaction that the caller must persist
    Created(Transaction),
    /// The transaction already posted for this order
    Existing(Transaction),
}

impl Posting {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Posting::Created(tx) | Posting::Existing(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            Posting::Created(tx) | Posting::Existing(tx) => tx,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Posting::Created(_))
    }
}

/// profit = sell − buy; margin = profit / sell, or 0 when sell is 0
pub fn profit_and_margin(sell_total: Decimal, buy_total: Decimal) -> (Decimal, Decimal) {
    let profit = sell_total - buy_total;
    let margin = if sell_total.is_zero() {
        Decimal::ZERO
    } else {
        profit.checked_div(sell_total).unwrap_or(Decimal::ZERO)
    };
    (profit, margin)
}

pub struct FinanceTransactionGenerator;

impl FinanceTransactionGenerator {
    /// Purchase transaction for a received purchase order
    ///
    /// Procurement is booked at cost, so each line carries sell = buy.
    pub fn post_purchase(
        po: &PurchaseOrder,
        existing: Option<Transaction>,
        now: DateTime<Utc>,
    ) -> DomainResult<Posting> {
        let reference = Reference::purchase_order(po.id);
        if let Some(tx) = existing {
            return Self::reuse(tx, &reference);
        }

        if po.status != PurchaseOrderStatus::Selesai {
            return Err(DomainError::DataIntegrity(format!(
                "Purchase order {} cannot be posted while {}",
                po.po_number, po.status
            )));
        }

        let id = Uuid::new_v4();
        let mut items = Vec::new();
        for item in &po.items {
            let (Some(qty), Some(price), Some(subtotal)) =
                (item.actual_qty, item.actual_unit_price, item.actual_subtotal)
            else {
                continue;
            };
            let (profit, margin) = profit_and_margin(subtotal, subtotal);
            items.push(TransactionItem {
                id: Uuid::new_v4(),
                transaction_id: id,
                stock_item_id: item.stock_item_id,
                order_item_id: item.id,
                qty,
                buy_price: price,
                sell_price: price,
                buy_total: subtotal,
                sell_total: subtotal,
                profit,
                margin,
            });
        }

        let amount = po.actual_total.unwrap_or_default();
        Ok(Posting::Created(Self::assemble(
            id,
            TransactionType::Purchase,
            TransactionCategory::Po,
            amount,
            reference,
            items,
            now,
        )))
    }

    /// Sales transaction for a delivered kitchen order
    pub fn post_sales(
        order: &KitchenOrder,
        existing: Option<Transaction>,
        now: DateTime<Utc>,
    ) -> DomainResult<Posting> {
        let reference = Reference::kitchen_order(order.id);
        if let Some(tx) = existing {
            return Self::reuse(tx, &reference);
        }

        if order.status != KitchenOrderStatus::DiterimaDapur {
            return Err(DomainError::DataIntegrity(format!(
                "Kitchen order {} cannot be posted while {}",
                order.order_number, order.status
            )));
        }

        let id = Uuid::new_v4();
        let mut items = Vec::new();
        for item in &order.items {
            let qty = item.approved_qty.unwrap_or_default();
            if qty.is_zero() {
                continue;
            }
            let buy_total = item.buy_total.unwrap_or_default();
            let (profit, margin) = profit_and_margin(item.subtotal, buy_total);
            items.push(TransactionItem {
                id: Uuid::new_v4(),
                transaction_id: id,
                stock_item_id: item.stock_item_id,
                order_item_id: item.id,
                qty,
                buy_price: item.buy_price.unwrap_or_default(),
                sell_price: item.unit_price,
                buy_total,
                sell_total: item.subtotal,
                profit,
                margin,
            });
        }

        let amount = order.actual_total.unwrap_or_default();
        Ok(Posting::Created(Self::assemble(
            id,
            TransactionType::Sales,
            TransactionCategory::KitchenOrder,
            amount,
            reference,
            items,
            now,
        )))
    }

    fn reuse(tx: Transaction, reference: &Reference) -> DomainResult<Posting> {
        if &tx.reference != reference {
            return Err(DomainError::DataIntegrity(format!(
                "Transaction {} belongs to {}, not {}",
                tx.id, tx.reference, reference
            )));
        }
        Ok(Posting::Existing(tx))
    }

    fn assemble(
        id: Uuid,
        transaction_type: TransactionType,
        category: TransactionCategory,
        amount: Decimal,
        reference: Reference,
        items: Vec<TransactionItem>,
        now: DateTime<Utc>,
    ) -> Transaction {
        let buy_total: Decimal = items.iter().map(|i| i.buy_total).sum();
        let sell_total: Decimal = items.iter().map(|i| i.sell_total).sum();
        let (profit, margin) = profit_and_margin(sell_total, buy_total);

        Transaction {
            id,
            transaction_date: now.date_naive(),
            transaction_type,
            category,
            amount,
            buy_total,
            sell_total,
            profit,
            margin,
            reference,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            items,
        }
    }
}
