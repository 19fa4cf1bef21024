//! Business logic services for the Koperasi back office

pub mod dapur;
pub mod finance;
pub mod kitchen_order;
pub mod purchase_order;
pub mod qr;
pub mod sequence;
pub mod stock;

pub use dapur::DapurService;
pub use finance::FinanceService;
pub use kitchen_order::KitchenOrderService;
pub use purchase_order::PurchaseOrderService;
pub use qr::QrService;
pub use stock::StockService;

use serde::Deserialize;
use shared::Pagination;
use validator::Validate;

/// Cancellation payload for either order type
#[derive(Debug, Deserialize, Validate)]
pub struct CancelInput {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Order listing filters
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

impl OrderQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}
