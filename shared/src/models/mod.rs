//! Domain models for the stock approval engine

mod audit;
mod intake;
mod issuance;
mod movement;
mod product;
mod role;

pub use audit::*;
pub use intake::*;
pub use issuance::*;
pub use movement::*;
pub use product::*;
pub use role::*;
