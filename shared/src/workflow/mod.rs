//! Role-gated transition tables for the two approval chains
//!
//! Each workflow declares a static [`TransitionTable`] listing, per action and
//! role, the states a record may leave and the state it lands in. Services ask
//! the table for the next state and never compare role names themselves.

pub mod intake;
pub mod issuance;

use serde::{Deserialize, Serialize};

use crate::models::{AuditAction, Role};

/// Workflow step requested by an approver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    PutOnHold,
    Approve,
    Reject,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 3] = [
        WorkflowAction::PutOnHold,
        WorkflowAction::Approve,
        WorkflowAction::Reject,
    ];

    pub fn audit_action(&self) -> AuditAction {
        match self {
            WorkflowAction::PutOnHold => AuditAction::Hold,
            WorkflowAction::Approve => AuditAction::Approve,
            WorkflowAction::Reject => AuditAction::Reject,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            WorkflowAction::PutOnHold => "put on hold",
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
        }
    }
}

/// Side effect a transition carries besides the state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    None,
    /// Set the lock flag
    Lock,
    /// Post the record to the stock ledger and set the lock flag
    PostStock,
}

impl Effect {
    pub fn locks(&self) -> bool {
        matches!(self, Effect::Lock | Effect::PostStock)
    }
}

/// One row of a transition table
#[derive(Debug)]
pub struct Rule<S: 'static> {
    pub action: WorkflowAction,
    pub role: Role,
    pub from: &'static [S],
    pub to: S,
    pub effect: Effect,
}

/// A transition the table allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
    pub effect: Effect,
}

/// Refusal naming the state the record is actually in
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} (current state: {current_state})")]
pub struct TransitionDenied {
    pub current_state: String,
    pub reason: String,
}

/// Static permission table: (action, role, current state) -> next state
pub struct TransitionTable<S: 'static> {
    pub noun: &'static str,
    pub rules: &'static [Rule<S>],
    /// Explains why a role allowed to perform the action cannot do it from `S`
    pub explain: fn(WorkflowAction, Role, S) -> String,
}

impl<S> TransitionTable<S>
where
    S: Copy + PartialEq + std::fmt::Display,
{
    pub fn next(
        &self,
        action: WorkflowAction,
        role: Role,
        current: S,
    ) -> Result<Transition<S>, TransitionDenied> {
        let mut role_listed = false;

        for rule in self
            .rules
            .iter()
            .filter(|rule| rule.action == action && rule.role == role)
        {
            role_listed = true;
            if rule.from.contains(&current) {
                return Ok(Transition {
                    from: current,
                    to: rule.to,
                    effect: rule.effect,
                });
            }
        }

        let reason = if role_listed {
            (self.explain)(action, role, current)
        } else {
            format!(
                "role {} may not {} {} records",
                role,
                action.verb(),
                self.noun
            )
        };

        Err(TransitionDenied {
            current_state: current.to_string(),
            reason,
        })
    }

    /// Whether any role may perform `action` on a record in `current`
    pub fn allows_from(&self, action: WorkflowAction, current: S) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.action == action && rule.from.contains(&current))
    }
}
