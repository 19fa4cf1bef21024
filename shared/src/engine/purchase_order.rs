//! Purchase order state machine

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    ensure_transition, ensure_unique_items, require_reason, BatchReceipt,
    FinanceTransactionGenerator, OrderContext, Posting, StockLedger, TransitionTable,
};
use crate::error::{DomainError, DomainResult};
use crate::models::{
    PurchaseOrder, PurchaseOrderStatus, QrCode, ReceivedItem, Reference, SupplierItemActual,
    Transaction,
};

/// Result of receiving goods for a purchase order
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    /// Batches created, in the order of the received items
    pub batch_ids: Vec<Uuid>,
    pub posting: Posting,
}

impl PurchaseOrder {
    pub fn reference(&self) -> Reference {
        Reference::purchase_order(self.id)
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::not_found("purchase order", self.id));
        }
        Ok(())
    }

    fn ensure_can_move(&self, to: PurchaseOrderStatus) -> DomainResult<()> {
        self.ensure_live()?;
        ensure_transition(self.status, to)
    }

    /// DRAFT → TERKIRIM, minting the order's QR code
    pub fn send(&mut self, ctx: &OrderContext<'_>) -> DomainResult<QrCode> {
        self.ensure_can_move(PurchaseOrderStatus::Terkirim)?;

        let payload = serde_json::json!({
            "po_number": self.po_number,
            "supplier_id": self.supplier_id,
            "estimated_total": self.estimated_total,
        });
        let qr = ctx
            .signer
            .issue(self.reference(), payload, ctx.qr_ttl, ctx.now)?;

        self.status = PurchaseOrderStatus::Terkirim;
        self.qr_code = Some(qr.qr_string.clone());
        self.sent_to_supplier_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(qr)
    }

    /// TERKIRIM → DIKONFIRMASI_SUPPLIER, recording the supplier's figures
    pub fn confirm_supplier(
        &mut self,
        ctx: &OrderContext<'_>,
        actuals: &[SupplierItemActual],
    ) -> DomainResult<()> {
        self.ensure_can_move(PurchaseOrderStatus::DikonfirmasiSupplier)?;

        if actuals.is_empty() {
            return Err(DomainError::validation(
                "items",
                "At least one item must be confirmed",
            ));
        }
        ensure_unique_items(actuals.iter().map(|a| a.item_id))?;

        let mut items = self.items.clone();
        for (idx, actual) in actuals.iter().enumerate() {
            if actual.actual_qty < Decimal::ONE {
                return Err(DomainError::validation(
                    format!("items[{}].actual_qty", idx),
                    "Actual quantity must be at least 1",
                ));
            }
            if actual.actual_unit_price < Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].actual_unit_price", idx),
                    "Actual unit price cannot be negative",
                ));
            }

            let item = items
                .iter_mut()
                .find(|i| i.id == actual.item_id)
                .ok_or_else(|| DomainError::not_found("purchase order item", actual.item_id))?;
            item.actual_unit_price = Some(actual.actual_unit_price);
            item.actual_qty = Some(actual.actual_qty);
            item.actual_subtotal = Some(actual.actual_unit_price * actual.actual_qty);
        }

        self.items = items;
        self.status = PurchaseOrderStatus::DikonfirmasiSupplier;
        self.supplier_confirmed_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(())
    }

    /// DIKONFIRMASI_SUPPLIER → DIKONFIRMASI_KOPERASI; approval gate only
    pub fn confirm_koperasi(&mut self, ctx: &OrderContext<'_>) -> DomainResult<()> {
        self.ensure_can_move(PurchaseOrderStatus::DikonfirmasiKoperasi)?;

        self.status = PurchaseOrderStatus::DikonfirmasiKoperasi;
        self.koperasi_confirmed_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(())
    }

    /// DIKONFIRMASI_KOPERASI → SELESAI
    ///
    /// Creates one stock batch per received item and posts the purchase
    /// transaction. Nothing is applied to the order or the ledger unless every
    /// step succeeds.
    pub fn receive_goods(
        &mut self,
        ctx: &OrderContext<'_>,
        received: &[ReceivedItem],
        qr_string: Option<&str>,
        ledger: &mut StockLedger,
        existing: Option<Transaction>,
    ) -> DomainResult<PurchaseReceipt> {
        self.ensure_can_move(PurchaseOrderStatus::Selesai)?;

        if let Some(qr) = qr_string {
            ctx.signer.validate_for(qr, &self.reference(), ctx.now)?;
        }
        if received.is_empty() {
            return Err(DomainError::validation(
                "items",
                "At least one received item is required",
            ));
        }
        ensure_unique_items(received.iter().map(|r| r.item_id))?;

        let reference = self.reference();
        let mut staged = self.clone();
        let mut staged_ledger = ledger.clone();
        let mut batch_ids = Vec::with_capacity(received.len());

        for (idx, line) in received.iter().enumerate() {
            if line.received_qty <= Decimal::ZERO {
                return Err(DomainError::validation(
                    format!("items[{}].received_qty", idx),
                    "Received quantity must be positive",
                ));
            }

            let item = staged
                .items
                .iter_mut()
                .find(|i| i.id == line.item_id)
                .ok_or_else(|| DomainError::not_found("purchase order item", line.item_id))?;
            let unit_cost = item.actual_unit_price.ok_or_else(|| {
                DomainError::validation(
                    format!("items[{}].item_id", idx),
                    "Item was not confirmed by the supplier",
                )
            })?;
            if item.actual_qty.is_some_and(|confirmed| line.received_qty > confirmed) {
                return Err(DomainError::validation(
                    format!("items[{}].received_qty", idx),
                    "Received quantity exceeds the confirmed quantity",
                ));
            }

            let batch_id = staged_ledger.receive(
                BatchReceipt {
                    stock_item_id: item.stock_item_id,
                    qty: line.received_qty,
                    unit_cost,
                    expiry_date: line.expiry_date,
                    production_date: line.production_date,
                    source: Some(reference),
                },
                ctx.now,
            )?;

            item.received_qty = Some(line.received_qty);
            item.expiry_date = line.expiry_date;
            item.production_date = line.production_date;
            batch_ids.push(batch_id);
        }

        staged.actual_total = Some(staged.items.iter().filter_map(|i| i.actual_subtotal).sum());
        staged.status = PurchaseOrderStatus::Selesai;
        staged.received_at = Some(ctx.now);
        staged.updated_at = ctx.now;

        let posting = FinanceTransactionGenerator::post_purchase(&staged, existing, ctx.now)?;

        *self = staged;
        *ledger = staged_ledger;
        Ok(PurchaseReceipt { batch_ids, posting })
    }

    /// Any non-terminal state → DIBATALKAN
    ///
    /// `ledger` must contain every batch sourced from this order; stock
    /// existing before receipt is an integrity violation and is surfaced.
    pub fn cancel(
        &mut self,
        ctx: &OrderContext<'_>,
        reason: &str,
        ledger: &StockLedger,
    ) -> DomainResult<()> {
        self.ensure_can_move(PurchaseOrderStatus::Dibatalkan)?;
        let reason = require_reason(reason)?;

        let sourced = ledger.batches_sourced_from(&self.reference());
        if !sourced.is_empty() {
            return Err(DomainError::DataIntegrity(format!(
                "Purchase order {} has {} stock batch(es) but was never received",
                self.po_number,
                sourced.len()
            )));
        }

        self.status = PurchaseOrderStatus::Dibatalkan;
        self.rejection_reason = Some(reason);
        self.cancelled_at = Some(ctx.now);
        self.updated_at = ctx.now;
        Ok(())
    }

    /// Soft-delete; only drafts and closed orders may be hidden
    pub fn soft_delete(&mut self, ctx: &OrderContext<'_>) -> DomainResult<()> {
        self.ensure_live()?;
        if self.status != PurchaseOrderStatus::Draft && !self.status.is_terminal() {
            return Err(DomainError::validation(
                "status",
                format!("Purchase order in status {} cannot be deleted", self.status),
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
    use crate::engine::QrSigner;
    use crate::models::NewPurchaseOrderItem;
    use chrono::{Duration, TimeZone, Utc};

    fn signer() -> QrSigner {
        QrSigner::new("test-secret")
    }

    fn ctx(signer: &QrSigner) -> OrderContext<'_> {
        OrderContext::new(
            signer,
            Duration::days(7),
            Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap(),
        )
    }

    fn draft() -> PurchaseOrder {
        PurchaseOrder::draft(
            "PO-202610-0001".to_string(),
            Uuid::new_v4(),
            None,
            vec![NewPurchaseOrderItem {
                stock_item_id: Uuid::new_v4(),
                estimated_unit_price: Decimal::from(100),
                estimated_qty: Decimal::from(10),
            }],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_send_issues_qr_for_this_order() {
        let signer = signer();
        let ctx = ctx(&signer);
        let mut po = draft();

        let qr = po.send(&ctx).unwrap();

        assert_eq!(po.status, PurchaseOrderStatus::Terkirim);
        assert_eq!(po.sent_to_supplier_at, Some(ctx.now));
        assert_eq!(po.qr_code.as_deref(), Some(qr.qr_string.as_str()));
        assert_eq!(qr.reference, po.reference());
    }

    #[test]
    fn test_confirm_supplier_validates_before_writing() {
        let signer = signer();
        let ctx = ctx(&signer);
        let mut po = draft();
        po.send(&ctx).unwrap();
        let item_id = po.items[0].id;

        let zero_qty = [SupplierItemActual {
            item_id,
            actual_unit_price: Decimal::from(110),
            actual_qty: Decimal::ZERO,
        }];
        assert!(po.confirm_supplier(&ctx, &zero_qty).is_err());

        let unknown = [SupplierItemActual {
            item_id: Uuid::new_v4(),
            actual_unit_price: Decimal::from(110),
            actual_qty: Decimal::from(10),
        }];
        assert_eq!(po.confirm_supplier(&ctx, &unknown).unwrap_err().code(), "NOT_FOUND");

        assert_eq!(po.status, PurchaseOrderStatus::Terkirim);
        assert!(po.items[0].actual_qty.is_none());
    }

    #[test]
    fn test_confirm_supplier_writes_actuals() {
        let signer = signer();
        let ctx = ctx(&signer);
        let mut po = draft();
        po.send(&ctx).unwrap();
        let item_id = po.items[0].id;

        po.confirm_supplier(
            &ctx,
            &[SupplierItemActual {
                item_id,
                actual_unit_price: Decimal::from(110),
                actual_qty: Decimal::from(10),
            }],
        )
        .unwrap();

        assert_eq!(po.status, PurchaseOrderStatus::DikonfirmasiSupplier);
        assert_eq!(po.items[0].actual_subtotal, Some(Decimal::from(1100)));
        assert!(po.actual_total.is_none());
    }

    #[test]
    fn test_cancel_requires_reason_and_non_terminal() {
        let signer = signer();
        let ctx = ctx(&signer);
        let ledger = StockLedger::new();
        let mut po = draft();

        assert!(po.cancel(&ctx, "  ", &ledger).is_err());
        po.cancel(&ctx, "Supplier out of stock", &ledger).unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Dibatalkan);
        assert_eq!(po.rejection_reason.as_deref(), Some("Supplier out of stock"));

        let err = po.cancel(&ctx, "again", &ledger).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_cancel_with_orphan_stock_is_integrity_error() {
        let signer = signer();
        let ctx = ctx(&signer);
        let mut po = draft();
        let mut ledger = StockLedger::new();
        ledger
            .receive(
                BatchReceipt {
                    stock_item_id: po.items[0].stock_item_id,
                    qty: Decimal::from(5),
                    unit_cost: Decimal::from(100),
                    expiry_date: None,
                    production_date: None,
                    source: Some(po.reference()),
                },
                ctx.now,
            )
            .unwrap();

        let err = po.cancel(&ctx, "mistake", &ledger).unwrap_err();
        assert_eq!(err.code(), "DATA_INTEGRITY");
        assert_eq!(po.status, PurchaseOrderStatus::Draft);
    }

    #[test]
    fn test_soft_delete_rules() {
        let signer = signer();
        let ctx = ctx(&signer);
        let mut sent = draft();
        sent.send(&ctx).unwrap();
        assert!(sent.soft_delete(&ctx).is_err());

        let mut po = draft();
        po.soft_delete(&ctx).unwrap();
        assert!(po.deleted_at.is_some());
        assert_eq!(po.send(&ctx).unwrap_err().code(), "NOT_FOUND");
    }
}
