//! Stock ledger: batch quantities and allocations per stock item
//!
//! The ledger holds the batches of the stock items touched by one unit of
//! work. Every mutation is appended to a movement journal so the caller can
//! persist exactly what changed. Failed operations leave the ledger untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    AllocationPolicy, BatchAllocation, BatchStatus, MovementKind, Reference, StockBatch,
    StockMovement,
};

#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    batches: Vec<StockBatch>,
    journal: Vec<StockMovement>,
}

/// Receipt parameters for a new batch
#[derive(Debug, Clone)]
pub struct BatchReceipt {
    pub stock_item_id: Uuid,
    pub qty: Decimal,
    pub unit_cost: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub source: Option<Reference>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger from persisted batches (locked by the caller)
    pub fn from_batches(batches: Vec<StockBatch>) -> Self {
        Self {
            batches,
            journal: Vec::new(),
        }
    }

    pub fn batches(&self) -> &[StockBatch] {
        &self.batches
    }

    pub fn batch(&self, batch_id: Uuid) -> Option<&StockBatch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    pub fn batches_for(&self, stock_item_id: Uuid) -> impl Iterator<Item = &StockBatch> {
        self.batches
            .iter()
            .filter(move |b| b.stock_item_id == stock_item_id)
    }

    /// Batches created by receiving the given order
    pub fn batches_sourced_from(&self, reference: &Reference) -> Vec<&StockBatch> {
        self.batches
            .iter()
            .filter(|b| b.source.as_ref() == Some(reference))
            .collect()
    }

    /// Quantity in the available pool for an item (its on-hand stock)
    pub fn available(&self, stock_item_id: Uuid) -> Decimal {
        self.batches_for(stock_item_id)
            .filter(|b| b.is_available())
            .map(|b| b.remaining)
            .sum()
    }

    pub fn journal(&self) -> &[StockMovement] {
        &self.journal
    }

    /// Drain the movements recorded since the last call
    pub fn take_journal(&mut self) -> Vec<StockMovement> {
        std::mem::take(&mut self.journal)
    }

    /// Ids of pre-existing batches touched by journaled movements
    pub fn touched_batch_ids(&self) -> BTreeSet<Uuid> {
        self.journal
            .iter()
            .filter(|m| m.kind != MovementKind::Received)
            .map(|m| m.batch_id)
            .collect()
    }

    /// Create a new available batch
    pub fn receive(&mut self, receipt: BatchReceipt, now: DateTime<Utc>) -> DomainResult<Uuid> {
        if receipt.qty <= Decimal::ZERO {
            return Err(DomainError::validation("qty", "Received quantity must be positive"));
        }
        if receipt.unit_cost < Decimal::ZERO {
            return Err(DomainError::validation("unit_cost", "Unit cost cannot be negative"));
        }
        if let (Some(produced), Some(expires)) = (receipt.production_date, receipt.expiry_date) {
            if expires < produced {
                return Err(DomainError::validation(
                    "expiry_date",
                    "Expiry date cannot precede production date",
                ));
            }
        }

        let sequence = self
            .batches_for(receipt.stock_item_id)
            .map(|b| b.sequence)
            .max()
            .map_or(1, |s| s + 1);

        let batch = StockBatch {
            id: Uuid::new_v4(),
            stock_item_id: receipt.stock_item_id,
            sequence,
            quantity: receipt.qty,
            remaining: receipt.qty,
            unit_cost: receipt.unit_cost,
            expiry_date: receipt.expiry_date,
            production_date: receipt.production_date,
            status: BatchStatus::Available,
            source: receipt.source,
            received_at: now,
        };
        let id = batch.id;

        self.journal.push(StockMovement {
            batch_id: id,
            stock_item_id: batch.stock_item_id,
            kind: MovementKind::Received,
            quantity: batch.quantity,
            reference: receipt.source,
            occurred_at: now,
        });
        self.batches.push(batch);

        Ok(id)
    }

    /// Reserve `qty` of an item from its available batches, all-or-nothing
    pub fn allocate(
        &mut self,
        stock_item_id: Uuid,
        qty: Decimal,
        policy: AllocationPolicy,
        reference: Option<Reference>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<BatchAllocation>> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::validation("qty", "Allocated quantity must be positive"));
        }

        let available = self.available(stock_item_id);
        if available < qty {
            return Err(DomainError::InsufficientStock {
                stock_item_id,
                requested: qty,
                available,
            });
        }

        let order = self.selection_order(stock_item_id, policy);
        let mut needed = qty;
        let mut allocations = Vec::new();

        for idx in order {
            if needed.is_zero() {
                break;
            }
            let batch = &mut self.batches[idx];
            let take = needed.min(batch.remaining);
            batch.remaining -= take;
            if batch.remaining.is_zero() {
                batch.status = BatchStatus::Allocated;
            }
            needed -= take;

            allocations.push(BatchAllocation {
                batch_id: batch.id,
                qty: take,
                unit_cost: batch.unit_cost,
            });
            self.journal.push(StockMovement {
                batch_id: batch.id,
                stock_item_id,
                kind: MovementKind::Allocated,
                quantity: take,
                reference,
                occurred_at: now,
            });
        }

        Ok(allocations)
    }

    /// Return allocated quantities to their original batches
    ///
    /// Fails without changes if any batch is gone or would overflow its
    /// received quantity.
    pub fn release(
        &mut self,
        allocations: &[BatchAllocation],
        reference: Option<Reference>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut staged = self.batches.clone();

        for allocation in allocations {
            let batch = staged
                .iter_mut()
                .find(|b| b.id == allocation.batch_id)
                .ok_or_else(|| DomainError::not_found("stock batch", allocation.batch_id))?;

            batch.remaining += allocation.qty;
            if batch.remaining > batch.quantity {
                return Err(DomainError::DataIntegrity(format!(
                    "Releasing {} to batch {} exceeds its received quantity {}",
                    allocation.qty, batch.id, batch.quantity
                )));
            }
            // Expired batches keep their status; the quantity stays out of the pool
            if batch.status == BatchStatus::Allocated {
                batch.status = BatchStatus::Available;
            }
        }

        self.batches = staged;
        for allocation in allocations {
            let stock_item_id = self
                .batch(allocation.batch_id)
                .map(|b| b.stock_item_id)
                .unwrap_or_default();
            self.journal.push(StockMovement {
                batch_id: allocation.batch_id,
                stock_item_id,
                kind: MovementKind::Released,
                quantity: allocation.qty,
                reference,
                occurred_at: now,
            });
        }

        Ok(())
    }

    /// Mark available batches whose expiry date has passed as expired
    pub fn expire_sweep(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let today = now.date_naive();
        let mut expired = Vec::new();

        for batch in self.batches.iter_mut() {
            let past_expiry = batch.expiry_date.is_some_and(|d| d < today);
            if batch.status == BatchStatus::Available && past_expiry {
                batch.status = BatchStatus::Expired;
                expired.push(batch.id);
                self.journal.push(StockMovement {
                    batch_id: batch.id,
                    stock_item_id: batch.stock_item_id,
                    kind: MovementKind::Expired,
                    quantity: batch.remaining,
                    reference: None,
                    occurred_at: now,
                });
            }
        }

        expired
    }

    /// Indices of available batches for an item in policy order
    fn selection_order(&self, stock_item_id: Uuid, policy: AllocationPolicy) -> Vec<usize> {
        let mut order: Vec<usize> = self
            .batches
            .iter()
            .enumerate()
            .filter(|(_, b)| b.stock_item_id == stock_item_id && b.is_available())
            .map(|(idx, _)| idx)
            .collect();

        match policy {
            AllocationPolicy::FifoByExpiry => {
                order.sort_by_key(|&idx| {
                    let b = &self.batches[idx];
                    (b.expiry_date.is_none(), b.expiry_date, b.sequence)
                });
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receipt(item: Uuid, qty: i64, cost: i64, expiry: Option<NaiveDate>) -> BatchReceipt {
        BatchReceipt {
            stock_item_id: item,
            qty: Decimal::from(qty),
            unit_cost: Decimal::from(cost),
            expiry_date: expiry,
            production_date: None,
            source: None,
        }
    }

    #[test]
    fn test_receive_rejects_non_positive_qty() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        assert!(ledger.receive(receipt(item, 0, 10, None), now()).is_err());
        assert!(ledger.receive(receipt(item, -3, 10, None), now()).is_err());
        assert!(ledger.batches().is_empty());
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn test_receive_assigns_increasing_sequence() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let a = ledger.receive(receipt(item, 5, 10, None), now()).unwrap();
        let b = ledger.receive(receipt(item, 5, 10, None), now()).unwrap();
        assert_eq!(ledger.batch(a).unwrap().sequence, 1);
        assert_eq!(ledger.batch(b).unwrap().sequence, 2);
        assert_eq!(ledger.available(item), Decimal::from(10));
    }

    #[test]
    fn test_allocate_earliest_expiry_first_nulls_last() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let undated = ledger.receive(receipt(item, 4, 9, None), now()).unwrap();
        let late = ledger
            .receive(receipt(item, 4, 11, Some(date(2027, 1, 1))), now())
            .unwrap();
        let early = ledger
            .receive(receipt(item, 4, 10, Some(date(2026, 12, 1))), now())
            .unwrap();

        let allocations = ledger
            .allocate(item, Decimal::from(10), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();

        let picked: Vec<(Uuid, Decimal)> =
            allocations.iter().map(|a| (a.batch_id, a.qty)).collect();
        assert_eq!(
            picked,
            vec![
                (early, Decimal::from(4)),
                (late, Decimal::from(4)),
                (undated, Decimal::from(2)),
            ]
        );
        assert_eq!(ledger.batch(early).unwrap().status, BatchStatus::Allocated);
        assert_eq!(ledger.batch(undated).unwrap().remaining, Decimal::from(2));
        assert_eq!(ledger.available(item), Decimal::from(2));
    }

    #[test]
    fn test_allocate_ties_broken_by_creation_order() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let expiry = Some(date(2026, 12, 1));
        let first = ledger.receive(receipt(item, 3, 10, expiry), now()).unwrap();
        let _second = ledger.receive(receipt(item, 3, 12, expiry), now()).unwrap();

        let allocations = ledger
            .allocate(item, Decimal::from(2), AllocationPolicy::default(), None, now())
            .unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].batch_id, first);
        assert_eq!(allocations[0].unit_cost, Decimal::from(10));
    }

    #[test]
    fn test_allocate_insufficient_is_all_or_nothing() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        ledger.receive(receipt(item, 2, 10, None), now()).unwrap();
        ledger.receive(receipt(item, 1, 10, None), now()).unwrap();
        ledger.take_journal();
        let before = ledger.batches().to_vec();

        let err = ledger
            .allocate(item, Decimal::from(5), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                stock_item_id: item,
                requested: Decimal::from(5),
                available: Decimal::from(3),
            }
        );
        assert_eq!(ledger.batches(), before.as_slice());
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn test_allocate_ignores_other_items_and_expired_batches() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let other = Uuid::new_v4();
        ledger.receive(receipt(other, 50, 1, None), now()).unwrap();
        ledger
            .receive(receipt(item, 5, 1, Some(date(2026, 9, 1))), now())
            .unwrap();
        ledger.expire_sweep(now());

        assert!(ledger
            .allocate(item, Decimal::ONE, AllocationPolicy::FifoByExpiry, None, now())
            .is_err());
    }

    #[test]
    fn test_release_returns_quantity_and_reopens_batch() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let batch = ledger.receive(receipt(item, 3, 10, None), now()).unwrap();
        let allocations = ledger
            .allocate(item, Decimal::from(3), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();
        assert_eq!(ledger.batch(batch).unwrap().status, BatchStatus::Allocated);

        ledger.release(&allocations, None, now()).unwrap();

        let restored = ledger.batch(batch).unwrap();
        assert_eq!(restored.status, BatchStatus::Available);
        assert_eq!(restored.remaining, Decimal::from(3));
        assert_eq!(ledger.available(item), Decimal::from(3));
    }

    #[test]
    fn test_release_of_purged_batch_changes_nothing() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let batch = ledger.receive(receipt(item, 3, 10, None), now()).unwrap();
        let mut allocations = ledger
            .allocate(item, Decimal::from(2), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();
        allocations.push(BatchAllocation {
            batch_id: Uuid::new_v4(),
            qty: Decimal::ONE,
            unit_cost: Decimal::ONE,
        });

        let err = ledger.release(&allocations, None, now()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(ledger.batch(batch).unwrap().remaining, Decimal::ONE);
    }

    #[test]
    fn test_expire_sweep_only_past_dates() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let past = ledger
            .receive(receipt(item, 3, 10, Some(date(2026, 9, 30))), now())
            .unwrap();
        let today = ledger
            .receive(receipt(item, 3, 10, Some(date(2026, 10, 1))), now())
            .unwrap();
        let undated = ledger.receive(receipt(item, 3, 10, None), now()).unwrap();

        let expired = ledger.expire_sweep(now());

        assert_eq!(expired, vec![past]);
        assert_eq!(ledger.batch(past).unwrap().status, BatchStatus::Expired);
        assert_eq!(ledger.batch(today).unwrap().status, BatchStatus::Available);
        assert_eq!(ledger.batch(undated).unwrap().status, BatchStatus::Available);
        assert_eq!(ledger.available(item), Decimal::from(6));
    }

    #[test]
    fn test_touched_batches_exclude_new_receipts() {
        let mut ledger = StockLedger::new();
        let item = Uuid::new_v4();
        let batch = ledger.receive(receipt(item, 3, 10, None), now()).unwrap();
        assert!(ledger.touched_batch_ids().is_empty());

        ledger
            .allocate(item, Decimal::ONE, AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();
        assert_eq!(ledger.touched_batch_ids().into_iter().collect::<Vec<_>>(), vec![batch]);
    }
}
