//! Property tests for the stock ledger, transition tables and finance maths
//!
//! - Allocation is all-or-nothing
//! - Allocations always sum to the approved quantity
//! - Only table edges are accepted
//! - profit = sell − buy, margin = profit / sell (0 when sell = 0)

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::*;
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
}

/// (qty, unit_cost, expiry offset in days or none)
fn batch_strategy() -> impl Strategy<Value = (u32, u32, Option<i64>)> {
    (1u32..50, 0u32..500, prop::option::of(0i64..60))
}

fn ledger_with(item: Uuid, batches: &[(u32, u32, Option<i64>)]) -> StockLedger {
    let base = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
    let mut ledger = StockLedger::new();
    for (qty, cost, expiry) in batches {
        ledger
            .receive(
                BatchReceipt {
                    stock_item_id: item,
                    qty: Decimal::from(*qty),
                    unit_cost: Decimal::from(*cost),
                    expiry_date: expiry.map(|d| base + Duration::days(d)),
                    production_date: None,
                    source: None,
                },
                now(),
            )
            .unwrap();
    }
    ledger.take_journal();
    ledger
}

const PO_STATES: [PurchaseOrderStatus; 6] = [
    PurchaseOrderStatus::Draft,
    PurchaseOrderStatus::Terkirim,
    PurchaseOrderStatus::DikonfirmasiSupplier,
    PurchaseOrderStatus::DikonfirmasiKoperasi,
    PurchaseOrderStatus::Selesai,
    PurchaseOrderStatus::Dibatalkan,
];

const KO_STATES: [KitchenOrderStatus; 5] = [
    KitchenOrderStatus::Draft,
    KitchenOrderStatus::Terkirim,
    KitchenOrderStatus::Diproses,
    KitchenOrderStatus::DiterimaDapur,
    KitchenOrderStatus::Dibatalkan,
];

fn po_edge(from: PurchaseOrderStatus, to: PurchaseOrderStatus) -> bool {
    use PurchaseOrderStatus::*;
    matches!(
        (from, to),
        (Draft, Terkirim)
            | (Terkirim, DikonfirmasiSupplier)
            | (DikonfirmasiSupplier, DikonfirmasiKoperasi)
            | (DikonfirmasiKoperasi, Selesai)
            | (Draft | Terkirim | DikonfirmasiSupplier | DikonfirmasiKoperasi, Dibatalkan)
    )
}

fn ko_edge(from: KitchenOrderStatus, to: KitchenOrderStatus) -> bool {
    use KitchenOrderStatus::*;
    matches!(
        (from, to),
        (Draft, Terkirim)
            | (Terkirim, Diproses)
            | (Diproses, DiterimaDapur)
            | (Draft | Terkirim | Diproses, Dibatalkan)
    )
}

proptest! {
    /// Over-asking leaves every batch exactly as it was
    #[test]
    fn prop_allocation_all_or_nothing(
        batches in prop::collection::vec(batch_strategy(), 0..8),
        extra in 1u32..100,
    ) {
        let item = Uuid::new_v4();
        let mut ledger = ledger_with(item, &batches);
        let before = ledger.batches().to_vec();
        let total: u32 = batches.iter().map(|(q, _, _)| q).sum();

        let result = ledger.allocate(
            item,
            Decimal::from(total + extra),
            AllocationPolicy::FifoByExpiry,
            None,
            now(),
        );

        let is_shortage = matches!(result, Err(DomainError::InsufficientStock { .. }));
        prop_assert!(is_shortage);
        prop_assert_eq!(ledger.batches(), before.as_slice());
        prop_assert!(ledger.journal().is_empty());
    }

    /// Successful allocations sum to the request and conserve stock
    #[test]
    fn prop_allocation_sums_to_request(
        batches in prop::collection::vec(batch_strategy(), 1..8),
        fraction in 1u32..=100,
    ) {
        let item = Uuid::new_v4();
        let mut ledger = ledger_with(item, &batches);
        let total: u32 = batches.iter().map(|(q, _, _)| q).sum();
        let request = std::cmp::max(1, total * fraction / 100);

        let allocations = ledger
            .allocate(item, Decimal::from(request), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();

        let allocated: Decimal = allocations.iter().map(|a| a.qty).sum();
        prop_assert_eq!(allocated, Decimal::from(request));
        prop_assert_eq!(ledger.available(item), Decimal::from(total - request));
        for batch in ledger.batches() {
            prop_assert!(batch.remaining >= Decimal::ZERO);
            prop_assert_eq!(batch.status == BatchStatus::Allocated, batch.remaining.is_zero());
        }
    }

    /// Release undoes allocate exactly
    #[test]
    fn prop_release_restores_batches(
        batches in prop::collection::vec(batch_strategy(), 1..8),
        fraction in 1u32..=100,
    ) {
        let item = Uuid::new_v4();
        let mut ledger = ledger_with(item, &batches);
        let before = ledger.batches().to_vec();
        let total: u32 = batches.iter().map(|(q, _, _)| q).sum();
        let request = std::cmp::max(1, total * fraction / 100);

        let allocations = ledger
            .allocate(item, Decimal::from(request), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();
        ledger.release(&allocations, None, now()).unwrap();

        prop_assert_eq!(ledger.batches(), before.as_slice());
    }

    /// Every processed kitchen order item holds exactly its approved quantity
    #[test]
    fn prop_processed_items_allocations_match_approval(
        batches in prop::collection::vec(batch_strategy(), 1..6),
        requests in prop::collection::vec((1u32..10, 0u32..=100), 1..4),
    ) {
        let item = Uuid::new_v4();
        let mut ledger = ledger_with(item, &batches);
        let signer = QrSigner::new("prop");
        let ctx = OrderContext::new(&signer, Duration::days(1), now());

        let lines = requests
            .iter()
            .map(|(qty, _)| NewKitchenOrderItem {
                stock_item_id: item,
                requested_qty: Decimal::from(*qty),
                unit_price: Decimal::from(100),
            })
            .collect();
        let mut order = KitchenOrder::draft("KO-P".to_string(), Uuid::new_v4(), None, lines, now())
            .unwrap();
        order.send(&ctx).unwrap();

        let approvals: Vec<ItemApproval> = order
            .items
            .iter()
            .zip(&requests)
            .map(|(i, (qty, pct))| ItemApproval {
                item_id: i.id,
                approved_qty: Decimal::from(qty * pct / 100),
            })
            .collect();
        let available_before = ledger.available(item);

        match order.process(&ctx, &approvals, &mut ledger) {
            Ok(()) => {
                prop_assert_eq!(order.status, KitchenOrderStatus::Diproses);
                for order_item in &order.items {
                    prop_assert_eq!(
                        Some(order_item.allocated_qty()),
                        order_item.approved_qty
                    );
                }
            }
            Err(DomainError::InsufficientStock { .. }) => {
                prop_assert_eq!(order.status, KitchenOrderStatus::Terkirim);
                prop_assert_eq!(ledger.available(item), available_before);
                prop_assert!(order.items.iter().all(|i| i.stock_allocations.is_empty()));
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    /// The FIFO-by-expiry order never picks a later expiry before an earlier one
    #[test]
    fn prop_fifo_by_expiry(
        batches in prop::collection::vec(batch_strategy(), 1..8),
    ) {
        let item = Uuid::new_v4();
        let mut ledger = ledger_with(item, &batches);
        let total: u32 = batches.iter().map(|(q, _, _)| q).sum();

        let allocations = ledger
            .allocate(item, Decimal::from(total), AllocationPolicy::FifoByExpiry, None, now())
            .unwrap();

        let keys: Vec<(bool, Option<NaiveDate>, i64)> = allocations
            .iter()
            .map(|a| {
                let b = ledger.batch(a.batch_id).unwrap();
                (b.expiry_date.is_none(), b.expiry_date, b.sequence)
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    #[test]
    fn prop_profit_and_margin(sell in 0i64..1_000_000, buy in 0i64..1_000_000) {
        let (profit, margin) = profit_and_margin(Decimal::from(sell), Decimal::from(buy));
        prop_assert_eq!(profit, Decimal::from(sell - buy));
        if sell == 0 {
            prop_assert_eq!(margin, Decimal::ZERO);
        } else {
            prop_assert_eq!(margin, Decimal::from(sell - buy) / Decimal::from(sell));
        }
    }

    #[test]
    fn prop_po_transitions_follow_table(from in 0usize..6, to in 0usize..6) {
        let (from, to) = (PO_STATES[from], PO_STATES[to]);
        prop_assert_eq!(ensure_transition(from, to).is_ok(), po_edge(from, to));
    }

    #[test]
    fn prop_kitchen_transitions_follow_table(from in 0usize..5, to in 0usize..5) {
        let (from, to) = (KO_STATES[from], KO_STATES[to]);
        prop_assert_eq!(ensure_transition(from, to).is_ok(), ko_edge(from, to));
    }
}

#[test]
fn test_rejected_transition_leaves_order_untouched() {
    let signer = QrSigner::new("prop");
    let ctx = OrderContext::new(&signer, Duration::days(1), now());
    let mut po = PurchaseOrder::draft(
        "PO-X".to_string(),
        Uuid::new_v4(),
        None,
        vec![NewPurchaseOrderItem {
            stock_item_id: Uuid::new_v4(),
            estimated_unit_price: Decimal::from(10),
            estimated_qty: Decimal::from(1),
        }],
        now(),
    )
    .unwrap();
    let before = serde_json::to_value(&po).unwrap();
    let mut ledger = StockLedger::new();

    assert!(po.confirm_koperasi(&ctx).is_err());
    assert!(po
        .receive_goods(&ctx, &[], None, &mut ledger, None)
        .is_err());

    assert_eq!(serde_json::to_value(&po).unwrap(), before);
    assert!(ledger.batches().is_empty());
}
