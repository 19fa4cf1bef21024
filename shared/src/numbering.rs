//! Human-readable document numbers
//!
//! The sequence value itself comes from an atomic counter in the database;
//! these helpers only format it.

use chrono::{DateTime, Datelike, Utc};

/// Counter scopes, each with its own sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    KitchenOrder,
    Dapur,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::KitchenOrder => "KO",
            DocumentKind::Dapur => "DPR",
        }
    }

    /// Sequence scope key used by the counter table
    pub fn scope(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::KitchenOrder => "kitchen_order",
            DocumentKind::Dapur => "dapur",
        }
    }

    /// Counter period: orders restart monthly, dapur codes never restart
    pub fn period(&self, now: DateTime<Utc>) -> String {
        match self {
            DocumentKind::PurchaseOrder | DocumentKind::KitchenOrder => {
                format!("{:04}{:02}", now.year(), now.month())
            }
            DocumentKind::Dapur => "all".to_string(),
        }
    }
}

/// Format a document number: `PO-202610-0001`, `KO-202610-0042`, `DPR-007`
pub fn format_document_number(kind: DocumentKind, period: &str, sequence: i64) -> String {
    match kind {
        DocumentKind::Dapur => format!("{}-{:03}", kind.prefix(), sequence),
        _ => format!("{}-{}-{:04}", kind.prefix(), period, sequence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_numbers_are_monthly() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let period = DocumentKind::PurchaseOrder.period(now);
        assert_eq!(period, "202603");
        assert_eq!(
            format_document_number(DocumentKind::PurchaseOrder, &period, 1),
            "PO-202603-0001"
        );
        assert_eq!(
            format_document_number(DocumentKind::KitchenOrder, &period, 42),
            "KO-202603-0042"
        );
    }

    #[test]
    fn test_dapur_codes() {
        let now = Utc::now();
        let period = DocumentKind::Dapur.period(now);
        assert_eq!(format_document_number(DocumentKind::Dapur, &period, 7), "DPR-007");
        assert_eq!(format_document_number(DocumentKind::Dapur, &period, 1234), "DPR-1234");
    }
}
