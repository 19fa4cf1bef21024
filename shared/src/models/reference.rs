//! Polymorphic back-links from QR codes, stock batches and transactions
//! to the order that produced them

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator stored alongside `reference_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    PurchaseOrder,
    KitchenOrder,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::PurchaseOrder => "purchase_order",
            ReferenceType::KitchenOrder => "kitchen_order",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase_order" => Some(ReferenceType::PurchaseOrder),
            "kitchen_order" => Some(ReferenceType::KitchenOrder),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged reference to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
}

impl Reference {
    pub fn purchase_order(id: Uuid) -> Self {
        Self {
            reference_type: ReferenceType::PurchaseOrder,
            reference_id: id,
        }
    }

    pub fn kitchen_order(id: Uuid) -> Self {
        Self {
            reference_type: ReferenceType::KitchenOrder,
            reference_id: id,
        }
    }

    /// Rebuild a reference from its two persisted columns
    pub fn from_parts(reference_type: &str, reference_id: Uuid) -> Option<Self> {
        ReferenceType::parse(reference_type).map(|reference_type| Self {
            reference_type,
            reference_id,
        })
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.reference_type, self.reference_id)
    }
}
