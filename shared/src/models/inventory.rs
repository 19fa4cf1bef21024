//! Stock items, batches, allocations and the movement journal

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Reference;
use crate::error::{DomainError, DomainResult};

/// A stock-keeping item (e.g. "BPO-BERAS5")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: Uuid,
    /// Immutable category-prefixed code
    pub code: String,
    pub name: String,
    pub unit: String,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Classify an on-hand quantity against the item's thresholds
    pub fn level(&self, on_hand: Decimal) -> StockLevel {
        if on_hand < self.min_stock {
            StockLevel::BelowMinimum
        } else if self.max_stock.is_some_and(|max| on_hand > max) {
            StockLevel::AboveMaximum
        } else {
            StockLevel::Normal
        }
    }
}

/// Stock level relative to min/max thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    BelowMinimum,
    Normal,
    AboveMaximum,
}

/// Parsed stock item code: `{PREFIX}-{KEY}`
///
/// The prefix names the category; the key must be unique across categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StockItemCode {
    prefix: String,
    key: String,
}

impl StockItemCode {
    pub fn new(prefix: &str, key: &str) -> DomainResult<Self> {
        let prefix_ok = (2..=5).contains(&prefix.len())
            && prefix.chars().all(|c| c.is_ascii_uppercase());
        if !prefix_ok {
            return Err(DomainError::validation(
                "code",
                "Category prefix must be 2-5 uppercase letters",
            ));
        }

        let key_ok = (1..=20).contains(&key.len())
            && key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !key_ok {
            return Err(DomainError::validation(
                "code",
                "Code key must be 1-20 uppercase alphanumeric characters",
            ));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            key: key.to_string(),
        })
    }

    pub fn parse(code: &str) -> DomainResult<Self> {
        let (prefix, key) = code
            .split_once('-')
            .ok_or_else(|| DomainError::validation("code", "Code must look like PREFIX-KEY"))?;
        Self::new(prefix, key)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// A key may only be reused under the category that already owns it
    pub fn conflicts_with(&self, existing: &StockItemCode) -> bool {
        self.key == existing.key && self.prefix != existing.prefix
    }
}

impl std::fmt::Display for StockItemCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.prefix, self.key)
    }
}

/// Batch status; a batch is in exactly one of these at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Has remaining quantity in the available pool
    Available,
    /// Fully consumed by allocations (exhausted, kept for audit)
    Allocated,
    /// Past expiry, removed from the available pool
    Expired,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Available => "available",
            BatchStatus::Allocated => "allocated",
            BatchStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(BatchStatus::Available),
            "allocated" => Some(BatchStatus::Allocated),
            "expired" => Some(BatchStatus::Expired),
            _ => None,
        }
    }
}

/// A discrete lot of stock received at one time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    /// Creation order within the stock item, used as the FIFO tie-break
    pub sequence: i64,
    /// Quantity originally received
    pub quantity: Decimal,
    /// Quantity not yet allocated
    pub remaining: Decimal,
    pub unit_cost: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: Option<NaiveDate>,
    pub status: BatchStatus,
    /// Order whose receipt created this batch
    pub source: Option<Reference>,
    pub received_at: DateTime<Utc>,
}

impl StockBatch {
    pub fn is_available(&self) -> bool {
        self.status == BatchStatus::Available && self.remaining > Decimal::ZERO
    }
}

/// Reservation of a batch quantity against a kitchen order item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_id: Uuid,
    pub qty: Decimal,
    /// Unit cost of the batch at allocation time
    pub unit_cost: Decimal,
}

/// Batch selection policy for allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Earliest expiry first, undated batches last, ties by creation order
    #[default]
    FifoByExpiry,
}

/// Kind of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Received,
    Allocated,
    Released,
    Expired,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Received => "received",
            MovementKind::Allocated => "allocated",
            MovementKind::Released => "released",
            MovementKind::Expired => "expired",
        }
    }

    /// Whether the movement adds to or removes from the available pool
    pub fn direction(&self) -> &'static str {
        match self {
            MovementKind::Received | MovementKind::Released => "in",
            MovementKind::Allocated | MovementKind::Expired => "out",
        }
    }
}

/// One entry of the stock movement journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub batch_id: Uuid,
    pub stock_item_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub reference: Option<Reference>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_parse() {
        let code = StockItemCode::parse("BPO-BERAS5").unwrap();
        assert_eq!(code.prefix(), "BPO");
        assert_eq!(code.key(), "BERAS5");
        assert_eq!(code.to_string(), "BPO-BERAS5");
    }

    #[test]
    fn test_code_rejects_malformed() {
        assert!(StockItemCode::parse("BERAS").is_err());
        assert!(StockItemCode::parse("bpo-BERAS").is_err());
        assert!(StockItemCode::parse("B-BERAS").is_err());
        assert!(StockItemCode::parse("BPO-").is_err());
        assert!(StockItemCode::parse("BPO-ber as").is_err());
    }

    #[test]
    fn test_same_key_other_category_conflicts() {
        let existing = StockItemCode::parse("BPO-GULA").unwrap();
        let other_category = StockItemCode::parse("BMB-GULA").unwrap();
        let same_category = StockItemCode::parse("BPO-GULA").unwrap();

        assert!(other_category.conflicts_with(&existing));
        assert!(!same_category.conflicts_with(&existing));
    }

    #[test]
    fn test_stock_level() {
        let now = Utc::now();
        let item = StockItem {
            id: Uuid::new_v4(),
            code: "BPO-GULA".to_string(),
            name: "Gula".to_string(),
            unit: "kg".to_string(),
            min_stock: Decimal::from(10),
            max_stock: Some(Decimal::from(100)),
            created_at: now,
            updated_at: now,
        };

        assert_eq!(item.level(Decimal::from(5)), StockLevel::BelowMinimum);
        assert_eq!(item.level(Decimal::from(10)), StockLevel::Normal);
        assert_eq!(item.level(Decimal::from(101)), StockLevel::AboveMaximum);
    }

    #[test]
    fn test_movement_direction() {
        assert_eq!(MovementKind::Received.direction(), "in");
        assert_eq!(MovementKind::Released.direction(), "in");
        assert_eq!(MovementKind::Allocated.direction(), "out");
        assert_eq!(MovementKind::Expired.direction(), "out");
    }
}
