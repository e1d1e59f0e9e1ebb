//! Intake approval chain: finance, then director, then head of entity

use crate::models::{IntakeStatus, Role};

use super::{Effect, Rule, TransitionTable, WorkflowAction};

use IntakeStatus::*;

static RULES: [Rule<IntakeStatus>; 6] = [
    // Director sends a finance-approved record back to purchasing
    Rule {
        action: WorkflowAction::PutOnHold,
        role: Role::Director,
        from: &[ApprovedFinance],
        to: PendingFinance,
        effect: Effect::None,
    },
    // Head of entity sends a director-approved record back to the director
    Rule {
        action: WorkflowAction::PutOnHold,
        role: Role::HeadOfEntity,
        from: &[ApprovedDirector],
        to: ApprovedFinance,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::Finance,
        from: &[PendingFinance],
        to: ApprovedFinance,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::Director,
        from: &[ApprovedFinance],
        to: ApprovedDirector,
        effect: Effect::None,
    },
    Rule {
        action: WorkflowAction::Approve,
        role: Role::HeadOfEntity,
        from: &[PendingHead, ApprovedDirector],
        to: ApprovedHead,
        effect: Effect::PostStock,
    },
    // Rejection leaves the record unlocked so purchasing can rework or delete it
    Rule {
        action: WorkflowAction::Reject,
        role: Role::HeadOfEntity,
        from: &[PendingHead, ApprovedDirector],
        to: Rejected,
        effect: Effect::None,
    },
];

pub static TRANSITIONS: TransitionTable<IntakeStatus> = TransitionTable {
    noun: "intake",
    rules: &RULES,
    explain,
};

fn explain(action: WorkflowAction, role: Role, current: IntakeStatus) -> String {
    let reason = match (action, role, current) {
        (WorkflowAction::Approve, Role::Finance, ApprovedFinance) => {
            "this intake has already been approved by finance"
        }
        (WorkflowAction::Approve, Role::Finance, Draft) => "this intake is still being drafted",
        (WorkflowAction::Approve, Role::Finance, _) => {
            "finance can only approve intakes pending finance"
        }
        (WorkflowAction::Approve, Role::Director, PendingFinance)
        | (WorkflowAction::PutOnHold, Role::Director, PendingFinance) => {
            "this intake must first be approved by finance"
        }
        (WorkflowAction::Approve, Role::Director, PendingDirector) => {
            "this intake is on hold; put it on hold to send it back to purchasing"
        }
        (WorkflowAction::Approve, Role::Director, ApprovedDirector)
        | (WorkflowAction::PutOnHold, Role::Director, ApprovedDirector) => {
            "this intake has already been approved by the director"
        }
        (WorkflowAction::Approve, Role::Director, _) => {
            "the director can only approve intakes approved by finance"
        }
        (WorkflowAction::PutOnHold, Role::Director, _) => {
            "the director can only put on hold intakes approved by finance"
        }
        (_, Role::HeadOfEntity, ApprovedFinance) => {
            "this intake must first be approved by the director"
        }
        (_, Role::HeadOfEntity, PendingFinance) => {
            "this intake is being processed by finance"
        }
        (_, Role::HeadOfEntity, ApprovedHead) => {
            "this intake has already been approved by the head of entity"
        }
        (_, Role::HeadOfEntity, Rejected) => "this intake has been rejected",
        (WorkflowAction::PutOnHold, Role::HeadOfEntity, PendingHead) => {
            "this intake is already pending the head of entity"
        }
        (WorkflowAction::PutOnHold, Role::HeadOfEntity, _) => {
            "the head of entity can only put on hold intakes approved by the director"
        }
        (_, Role::HeadOfEntity, _) => {
            "the head of entity can only act on intakes approved by the director or pending head"
        }
        _ => "this action is not available in the current state",
    };
    reason.to_string()
}

/// States in which an intake may still be edited
pub fn editable_states(is_admin: bool) -> &'static [IntakeStatus] {
    if is_admin {
        &[Draft, PendingFinance, ApprovedFinance, Rejected]
    } else {
        &[Draft, PendingFinance, ApprovedFinance]
    }
}

/// States from which a non-admin may delete an intake
pub const DELETABLE_BY_NON_ADMIN: [IntakeStatus; 3] = [Draft, PendingFinance, Rejected];

/// Roles that may edit or delete intakes besides admins
pub fn may_rework(role: Role, is_admin: bool) -> bool {
    is_admin || role == Role::Purchasing
}
