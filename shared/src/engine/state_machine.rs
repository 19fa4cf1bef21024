//! Generic status-transition evaluator shared by both order types
//!
//! Each status enum supplies its own table of allowed next states; the
//! evaluator is the only place a transition is accepted or rejected.

use std::fmt::{Debug, Display};

use crate::error::{DomainError, DomainResult};
use crate::models::{KitchenOrderStatus, PurchaseOrderStatus};

/// A status enum with an explicit transition table
pub trait TransitionTable: Copy + Eq + Debug + Display + 'static {
    /// Entity name used in error messages
    const ENTITY: &'static str;

    /// States reachable in one step from `self`
    fn allowed_next(self) -> &'static [Self];

    fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }
}

/// Check `from -> to` against the table of `S`
pub fn ensure_transition<S: TransitionTable>(from: S, to: S) -> DomainResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DomainError::InvalidTransition {
            entity: S::ENTITY,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

impl TransitionTable for PurchaseOrderStatus {
    const ENTITY: &'static str = "purchase order";

    fn allowed_next(self) -> &'static [Self] {
        use PurchaseOrderStatus::*;
        match self {
            Draft => &[Terkirim, Dibatalkan],
            Terkirim => &[DikonfirmasiSupplier, Dibatalkan],
            DikonfirmasiSupplier => &[DikonfirmasiKoperasi, Dibatalkan],
            DikonfirmasiKoperasi => &[Selesai, Dibatalkan],
            Selesai | Dibatalkan => &[],
        }
    }
}

impl TransitionTable for KitchenOrderStatus {
    const ENTITY: &'static str = "kitchen order";

    fn allowed_next(self) -> &'static [Self] {
        use KitchenOrderStatus::*;
        match self {
            Draft => &[Terkirim, Dibatalkan],
            Terkirim => &[Diproses, Dibatalkan],
            Diproses => &[DiterimaDapur, Dibatalkan],
            DiterimaDapur | Dibatalkan => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PO_ALL: [PurchaseOrderStatus; 6] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Terkirim,
        PurchaseOrderStatus::DikonfirmasiSupplier,
        PurchaseOrderStatus::DikonfirmasiKoperasi,
        PurchaseOrderStatus::Selesai,
        PurchaseOrderStatus::Dibatalkan,
    ];

    #[test]
    fn test_po_happy_path_edges() {
        use PurchaseOrderStatus::*;
        assert!(ensure_transition(Draft, Terkirim).is_ok());
        assert!(ensure_transition(Terkirim, DikonfirmasiSupplier).is_ok());
        assert!(ensure_transition(DikonfirmasiSupplier, DikonfirmasiKoperasi).is_ok());
        assert!(ensure_transition(DikonfirmasiKoperasi, Selesai).is_ok());
    }

    #[test]
    fn test_po_cancel_from_every_non_terminal() {
        for status in PO_ALL {
            let allowed = ensure_transition(status, PurchaseOrderStatus::Dibatalkan).is_ok();
            assert_eq!(allowed, !status.is_terminal(), "{}", status);
        }
    }

    #[test]
    fn test_po_no_skipping_or_going_back() {
        use PurchaseOrderStatus::*;
        assert!(ensure_transition(Draft, Selesai).is_err());
        assert!(ensure_transition(Terkirim, Draft).is_err());
        assert!(ensure_transition(DikonfirmasiKoperasi, Terkirim).is_err());
        assert!(ensure_transition(Draft, Draft).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(PurchaseOrderStatus::Selesai.is_terminal());
        assert!(PurchaseOrderStatus::Dibatalkan.is_terminal());
        assert!(KitchenOrderStatus::DiterimaDapur.is_terminal());
        assert!(KitchenOrderStatus::Dibatalkan.is_terminal());

        for to in PO_ALL {
            assert!(ensure_transition(PurchaseOrderStatus::Selesai, to).is_err());
        }
    }

    #[test]
    fn test_kitchen_edges() {
        use KitchenOrderStatus::*;
        assert!(ensure_transition(Draft, Terkirim).is_ok());
        assert!(ensure_transition(Terkirim, Diproses).is_ok());
        assert!(ensure_transition(Diproses, DiterimaDapur).is_ok());
        assert!(ensure_transition(Diproses, Dibatalkan).is_ok());
        assert!(ensure_transition(Terkirim, DiterimaDapur).is_err());
        assert!(ensure_transition(DiterimaDapur, Dibatalkan).is_err());
    }

    #[test]
    fn test_error_names_entity_and_states() {
        let err = ensure_transition(KitchenOrderStatus::Draft, KitchenOrderStatus::Diproses)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                entity: "kitchen order",
                from: "draft".to_string(),
                to: "diproses".to_string(),
            }
        );
    }
}
