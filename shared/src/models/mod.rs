//! Domain models for the cooperative back office

mod finance;
mod inventory;
mod kitchen_order;
mod purchase_order;
mod qr_code;
mod reference;

pub use finance::*;
pub use inventory::*;
pub use kitchen_order::*;
pub use purchase_order::*;
pub use qr_code::*;
pub use reference::*;
