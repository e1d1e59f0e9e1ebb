//! HTTP handlers

pub mod health;
pub mod intake;
pub mod issuance;
pub mod stock;

pub use health::health_check;
pub use intake::*;
pub use issuance::*;
pub use stock::*;
