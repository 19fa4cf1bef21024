//! Kitchen order state machine

use rust_decimal::Decimal;

use super::{
    ensure_transition, ensure_unique_items, require_reason, FinanceTransactionGenerator,
    OrderContext, Posting, StockLedger, TransitionTable,
};
use crate::error::{DomainError, DomainResult};
use crate::models::{
    AllocationPolicy, BatchAllocation, ItemApproval, KitchenOrder, KitchenOrderStatus, QrCode,
    Reference, Transaction,
};

impl KitchenOrder {
    pub fn reference(&self) -> Reference {
        Reference::kitchen_order(self.id)
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::not_found("kitchen order", self.id));
        }
        Ok(())
    }

    fn ensure_can_move(&self, to: KitchenOrderStatus) -> DomainResult<()> {
        self.ensure_live()?;
        ensure_transition(self.status, to)
    }

    /// All allocations currently held by this order
    pub fn allocations(&self) -> Vec<BatchAllocation> {
        self.items
            .iter()
            .flat_map(|i| i.stock_allocations.iter().cloned())
            .collect()
    }

    /// DRAFT → TERKIRIM, minting the order's QR code
    pub fn send(&mut self, ctx: &OrderContext<'_>) -> DomainResult<QrCode> {
        self.ensure_can_move(KitchenOrderStatus::Terkirim)?;

        let payload = serde_json::json!({
            "order_number": self.order_number,
            "dapur_id": self.dapur_id,
            "estimated_total": self.estimated_total,
        });
        let qr = ctx
            .signer
            .issue(self.reference(), payload, ctx.qr_ttl, ctx.now)?;

        self.status = KitchenOrderStatus::Terkirim;
        self.qr_code = Some(qr.qr_string.clone());
        self.sent_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(qr)
    }

    /// TERKIRIM → DIPROSES, approving quantities and allocating stock
    ///
    /// Items without an explicit approval are approved in full. Allocation is
    /// atomic across items: one shortage rejects the whole order.
    pub fn process(
        &mut self,
        ctx: &OrderContext<'_>,
        approvals: &[ItemApproval],
        ledger: &mut StockLedger,
    ) -> DomainResult<()> {
        self.ensure_can_move(KitchenOrderStatus::Diproses)?;
        ensure_unique_items(approvals.iter().map(|a| a.item_id))?;

        for (idx, approval) in approvals.iter().enumerate() {
            let item = self
                .items
                .iter()
                .find(|i| i.id == approval.item_id)
                .ok_or_else(|| DomainError::not_found("kitchen order item", approval.item_id))?;
            if approval.approved_qty < Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].approved_qty", idx),
                    "Approved quantity cannot be negative",
                ));
            }
            if approval.approved_qty > item.requested_qty {
                return Err(DomainError::validation(
                    format!("items[{}].approved_qty", idx),
                    format!(
                        "Approved quantity {} exceeds requested {}",
                        approval.approved_qty, item.requested_qty
                    ),
                ));
            }
        }

        let reference = self.reference();
        let mut staged = self.clone();
        let mut staged_ledger = ledger.clone();

        for item in staged.items.iter_mut() {
            let approved = approvals
                .iter()
                .find(|a| a.item_id == item.id)
                .map_or(item.requested_qty, |a| a.approved_qty);

            let allocations = if approved.is_zero() {
                Vec::new()
            } else {
                staged_ledger.allocate(
                    item.stock_item_id,
                    approved,
                    AllocationPolicy::FifoByExpiry,
                    Some(reference),
                    ctx.now,
                )?
            };

            let buy_total: Decimal = allocations.iter().map(|a| a.qty * a.unit_cost).sum();
            let buy_price = if approved.is_zero() {
                Decimal::ZERO
            } else {
                buy_total.checked_div(approved).unwrap_or(Decimal::ZERO)
            };

            item.approved_qty = Some(approved);
            item.subtotal = approved * item.unit_price;
            item.buy_total = Some(buy_total);
            item.buy_price = Some(buy_price);
            item.profit = Some(item.subtotal - buy_total);
            item.stock_allocations = allocations;
        }

        staged.status = KitchenOrderStatus::Diproses;
        staged.processed_at = Some(ctx.now);
        staged.updated_at = ctx.now;

        *self = staged;
        *ledger = staged_ledger;
        Ok(())
    }

    /// DIPROSES → DITERIMA_DAPUR, finalising totals and posting the sale
    pub fn deliver_and_confirm(
        &mut self,
        ctx: &OrderContext<'_>,
        qr_string: Option<&str>,
        existing: Option<Transaction>,
    ) -> DomainResult<Posting> {
        self.ensure_can_move(KitchenOrderStatus::DiterimaDapur)?;

        if let Some(qr) = qr_string {
            ctx.signer.validate_for(qr, &self.reference(), ctx.now)?;
        }

        for item in &self.items {
            let approved = item.approved_qty.unwrap_or_default();
            if item.allocated_qty() != approved {
                return Err(DomainError::DataIntegrity(format!(
                    "Item {} of order {} has {} allocated against {} approved",
                    item.id,
                    self.order_number,
                    item.allocated_qty(),
                    approved
                )));
            }
        }

        let mut staged = self.clone();
        staged.actual_total = Some(staged.items.iter().map(|i| i.subtotal).sum());
        staged.status = KitchenOrderStatus::DiterimaDapur;
        staged.delivered_at = Some(ctx.now);
        staged.received_at = Some(ctx.now);
        staged.updated_at = ctx.now;

        let posting = FinanceTransactionGenerator::post_sales(&staged, existing, ctx.now)?;

        *self = staged;
        Ok(posting)
    }

    /// Any non-terminal state → DIBATALKAN, releasing held stock first
    pub fn cancel(
        &mut self,
        ctx: &OrderContext<'_>,
        reason: &str,
        ledger: &mut StockLedger,
    ) -> DomainResult<()> {
        self.ensure_can_move(KitchenOrderStatus::Dibatalkan)?;
        let reason = require_reason(reason)?;

        let mut staged = self.clone();
        let mut staged_ledger = ledger.clone();

        if self.status == KitchenOrderStatus::Diproses {
            staged_ledger.release(&self.allocations(), Some(self.reference()), ctx.now)?;
            for item in staged.items.iter_mut() {
                item.stock_allocations.clear();
                item.buy_price = None;
                item.buy_total = None;
                item.profit = None;
            }
        }

        staged.status = KitchenOrderStatus::Dibatalkan;
        staged.cancellation_reason = Some(reason);
        staged.cancelled_at = Some(ctx.now);
        staged.updated_at = ctx.now;

        *self = staged;
        *ledger = staged_ledger;
        Ok(())
    }

    /// Soft-delete; only drafts and closed orders may be hidden
    pub fn soft_delete(&mut self, ctx: &OrderContext<'_>) -> DomainResult<()> {
        self.ensure_live()?;
        if self.status != KitchenOrderStatus::Draft && !self.status.is_terminal() {
            return Err(DomainError::validation(
                "status",
                format!("Kitchen order in status {} cannot be deleted", self.status),
            ));
        }
        self.deleted_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BatchReceipt, QrSigner};
    use crate::models::NewKitchenOrderItem;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn ctx(signer: &QrSigner) -> OrderContext<'_> {
        OrderContext::new(
            signer,
            Duration::days(1),
            Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap(),
        )
    }

    fn stocked(item: Uuid, qty: i64, cost: i64) -> StockLedger {
        let mut ledger = StockLedger::new();
        ledger
            .receive(
                BatchReceipt {
                    stock_item_id: item,
                    qty: Decimal::from(qty),
                    unit_cost: Decimal::from(cost),
                    expiry_date: None,
                    production_date: None,
                    source: None,
                },
                Utc::now(),
            )
            .unwrap();
        ledger.take_journal();
        ledger
    }

    fn sent_order(ctx: &OrderContext<'_>, item: Uuid, qty: i64, price: i64) -> KitchenOrder {
        let mut order = KitchenOrder::draft(
            "KO-202610-0001".to_string(),
            Uuid::new_v4(),
            None,
            vec![NewKitchenOrderItem {
                stock_item_id: item,
                requested_qty: Decimal::from(qty),
                unit_price: Decimal::from(price),
            }],
            Utc::now(),
        )
        .unwrap();
        order.send(ctx).unwrap();
        order
    }

    #[test]
    fn test_process_rejects_approval_above_request() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let stock = Uuid::new_v4();
        let mut ledger = stocked(stock, 10, 80);
        let mut order = sent_order(&ctx, stock, 5, 100);
        let item_id = order.items[0].id;

        let err = order
            .process(
                &ctx,
                &[ItemApproval {
                    item_id,
                    approved_qty: Decimal::from(6),
                }],
                &mut ledger,
            )
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(order.status, KitchenOrderStatus::Terkirim);
        assert_eq!(ledger.available(stock), Decimal::from(10));
    }

    #[test]
    fn test_process_records_cost_and_profit() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let stock = Uuid::new_v4();
        let mut ledger = stocked(stock, 10, 80);
        let mut order = sent_order(&ctx, stock, 5, 100);
        let item_id = order.items[0].id;

        order
            .process(
                &ctx,
                &[ItemApproval {
                    item_id,
                    approved_qty: Decimal::from(4),
                }],
                &mut ledger,
            )
            .unwrap();

        let item = &order.items[0];
        assert_eq!(order.status, KitchenOrderStatus::Diproses);
        assert_eq!(item.approved_qty, Some(Decimal::from(4)));
        assert_eq!(item.allocated_qty(), Decimal::from(4));
        assert_eq!(item.subtotal, Decimal::from(400));
        assert_eq!(item.buy_price, Some(Decimal::from(80)));
        assert_eq!(item.profit, Some(Decimal::from(80)));
        assert_eq!(ledger.available(stock), Decimal::from(6));
    }

    #[test]
    fn test_zero_approval_allocates_nothing() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let stock = Uuid::new_v4();
        let mut ledger = stocked(stock, 10, 80);
        let mut order = sent_order(&ctx, stock, 5, 100);
        let item_id = order.items[0].id;

        order
            .process(
                &ctx,
                &[ItemApproval {
                    item_id,
                    approved_qty: Decimal::ZERO,
                }],
                &mut ledger,
            )
            .unwrap();

        assert!(order.items[0].stock_allocations.is_empty());
        assert_eq!(order.items[0].subtotal, Decimal::ZERO);
        assert_eq!(ledger.available(stock), Decimal::from(10));
    }

    #[test]
    fn test_deliver_from_terkirim_is_invalid() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let mut order = sent_order(&ctx, Uuid::new_v4(), 5, 100);

        let err = order.deliver_and_confirm(&ctx, None, None).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(order.actual_total.is_none());
    }

    #[test]
    fn test_deliver_with_wrong_qr_is_rejected() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let stock = Uuid::new_v4();
        let mut ledger = stocked(stock, 10, 80);
        let mut order = sent_order(&ctx, stock, 5, 100);
        let other = sent_order(&ctx, stock, 1, 100);
        order.process(&ctx, &[], &mut ledger).unwrap();

        let err = order
            .deliver_and_confirm(&ctx, other.qr_code.as_deref(), None)
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(order.status, KitchenOrderStatus::Diproses);

        let posting = order
            .deliver_and_confirm(&ctx, order.qr_code.clone().as_deref(), None)
            .unwrap();
        assert!(posting.is_created());
    }

    #[test]
    fn test_cancel_draft_touches_no_stock() {
        let signer = QrSigner::new("k");
        let ctx = ctx(&signer);
        let stock = Uuid::new_v4();
        let mut ledger = stocked(stock, 10, 80);
        let mut order = sent_order(&ctx, stock, 5, 100);

        order.cancel(&ctx, "Menu changed", &mut ledger).unwrap();

        assert_eq!(order.status, KitchenOrderStatus::Dibatalkan);
        assert!(ledger.journal().is_empty());
    }
}
