//! Shared domain types for the stock approval engine
//!
//! Pure code only: roles, record states, the per-workflow transition tables,
//! document numbering and validation helpers. Persistence and transport live
//! in the backend crate.

pub mod models;
pub mod numbering;
pub mod stock;
pub mod types;
pub mod validation;
pub mod workflow;

pub use models::*;
pub use types::*;
pub use validation::*;
