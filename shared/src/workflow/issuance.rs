//! Issuance approval chain: director, then finance, then head of entity

use crate::models::{IssuanceStatus, Role};

use super::{Effect, Rule, TransitionTable, WorkflowAction};

use IssuanceStatus::*;

static RULES: [Rule<IssuanceStatus>; 6] = [
    // Director bounces the record back to its creator for revision
    Rule {
        action: WorkflowAction::PutOnHold,
        role: Role::Director,
        from: &[Saisie, PendingDirector],
        to: PendingDirector,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::PutOnHold,
        role: Role::HeadOfEntity,
        from: &[ApprovedFinance],
        to: PendingHead,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::Director,
        from: &[Saisie, PendingDirector],
        to: ApprovedDirector,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::Finance,
        from: &[ApprovedDirector],
        to: ApprovedFinance,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::HeadOfEntity,
        from: &[ApprovedFinance, PendingHead],
        to: ApprovedHead,
        effect: Effect::PostStock,
    },
    // Unlike intakes, a rejected issuance is locked
    Rule {
        action: WorkflowAction::Reject,
        role: Role::HeadOfEntity,
        from: &[ApprovedFinance, PendingHead],
        to: Rejected,
        effect: Effect::Lock,
    },
];

pub static TRANSITIONS: TransitionTable<IssuanceStatus> = TransitionTable {
    noun: "issuance",
    rules: &RULES,
    explain,
};

fn explain(action: WorkflowAction, role: Role, current: IssuanceStatus) -> String {
    let reason = match (action, role, current) {
        (_, Role::Director, ApprovedDirector) => {
            "this issuance has already been approved by the director"
        }
        (_, Role::Director, _) => {
            "the director can only act on issuances being entered or pending the director"
        }
        (WorkflowAction::Approve, Role::Finance, ApprovedFinance) => {
            "this issuance has already been approved by finance"
        }
        (WorkflowAction::Approve, Role::Finance, Saisie | PendingDirector) => {
            "this issuance must first be approved by the director"
        }
        (WorkflowAction::Approve, Role::Finance, _) => {
            "finance can only approve issuances approved by the director"
        }
        (_, Role::HeadOfEntity, Saisie | PendingDirector | ApprovedDirector) => {
            "this issuance must first be approved by finance"
        }
        (_, Role::HeadOfEntity, ApprovedHead) => {
            "this issuance has already been approved by the head of entity"
        }
        (_, Role::HeadOfEntity, Rejected) => "this issuance has been rejected",
        (WorkflowAction::PutOnHold, Role::HeadOfEntity, PendingHead) => {
            "this issuance is already pending the head of entity"
        }
        _ => "this action is not available in the current state",
    };
    reason.to_string()
}

/// States in which an issuance may still be edited by its creator
pub const EDITABLE: [IssuanceStatus; 4] = [Saisie, PendingDirector, PendingHead, Rejected];

/// Roles that enter and rework issuances
pub fn may_enter(role: Role) -> bool {
    matches!(role, Role::Purchasing | Role::DataEntry)
}
