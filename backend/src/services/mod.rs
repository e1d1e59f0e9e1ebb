//! Business logic services for the stock approval engine

pub mod audit;
pub mod intake;
pub mod issuance;
pub mod ledger;
pub mod sequence;
pub mod stock;

pub use audit::AuditLog;
pub use intake::IntakeService;
pub use issuance::IssuanceService;
pub use ledger::StockLedger;
pub use sequence::SequenceAllocator;
pub use stock::StockService;

use serde::Deserialize;
use shared::{Actor, Role, ScopeFilter};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Free-text notes attached to a workflow step
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepInput {
    pub observations: Option<String>,
}

/// Records an actor may list: structure-bound roles see their structure,
/// the others their ministry, admins everything.
pub fn visible_scope(actor: &Actor) -> AppResult<ScopeFilter> {
    if actor.is_admin {
        return Ok(ScopeFilter::All);
    }
    let missing = || {
        AppError::validation(
            "scope",
            "Your account is not attached to a ministry or structure",
            "Votre compte n'est rattaché à aucun ministère ou structure",
        )
    };
    match actor.role {
        Role::DataEntry | Role::Director => {
            actor.structure_id.map(ScopeFilter::Structure).ok_or_else(missing)
        }
        Role::Admin => Ok(ScopeFilter::All),
        _ => actor.ministry_id.map(ScopeFilter::Ministry).ok_or_else(missing),
    }
}

/// Reject actors acting outside the scope of a record or product
pub fn ensure_scope(actor: &Actor, ministry_id: Uuid, structure_id: Uuid) -> AppResult<()> {
    if actor.covers(ministry_id, structure_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "This record belongs to another ministry or structure".to_string(),
        ))
    }
}

/// Observations are mandatory for some steps
pub(crate) fn required_observations(observations: Option<String>) -> AppResult<String> {
    shared::normalize_optional(observations).ok_or_else(|| {
        AppError::validation(
            "observations",
            "Observations are required",
            "Les observations sont obligatoires",
        )
    })
}
