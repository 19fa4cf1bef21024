//! HTTP handlers

pub mod dapur;
pub mod finance;
pub mod health;
pub mod kitchen_order;
pub mod purchase_order;
pub mod qr;
pub mod stock;

pub use dapur::*;
pub use finance::*;
pub use health::*;
pub use kitchen_order::*;
pub use purchase_order::*;
pub use qr::*;
pub use stock::*;
