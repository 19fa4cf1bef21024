//! Order lifecycle and stock reconciliation engine
//!
//! Pure domain logic: every operation stages its changes on copies and
//! commits them only when the whole transition succeeds. Persistence and
//! locking belong to the caller.

mod finance;
mod kitchen_order;
mod ledger;
mod purchase_order;
mod qr;
mod state_machine;

pub use finance::*;
pub use kitchen_order::*;
pub use ledger::*;
pub use purchase_order::*;
pub use qr::*;
pub use state_machine::*;

use chrono::{DateTime, Duration, Utc};

/// Collaborators and clock shared by order transitions
#[derive(Debug, Clone)]
pub struct OrderContext<'a> {
    pub signer: &'a QrSigner,
    /// Lifetime of QR codes minted on "send"
    pub qr_ttl: Duration,
    pub now: DateTime<Utc>,
}

impl<'a> OrderContext<'a> {
    pub fn new(signer: &'a QrSigner, qr_ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            signer,
            qr_ttl,
            now,
        }
    }
}

/// Reject blank cancellation reasons
pub(crate) fn require_reason(reason: &str) -> crate::error::DomainResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(crate::error::DomainError::validation(
            "reason",
            "A cancellation reason is required",
        ));
    }
    Ok(reason.to_string())
}

/// Reject the same order item appearing twice in one payload
pub(crate) fn ensure_unique_items<I>(ids: I) -> crate::error::DomainResult<()>
where
    I: IntoIterator<Item = uuid::Uuid>,
{
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(crate::error::DomainError::validation(
                "items",
                format!("Item {} is listed more than once", id),
            ));
        }
    }
    Ok(())
}
