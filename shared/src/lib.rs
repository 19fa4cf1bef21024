//! Shared domain engine for the cooperative back office
//!
//! Holds the order lifecycle state machines, the stock ledger and the finance
//! transaction generator. Nothing here performs I/O; the backend loads the
//! relevant rows under lock, runs a transition and persists the result.

pub mod engine;
pub mod error;
pub mod models;
pub mod numbering;
pub mod types;
pub mod validation;

pub use engine::*;
pub use error::*;
pub use models::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
