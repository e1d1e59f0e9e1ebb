//! Roles and acting identities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of roles taking part in the approval chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Responsable achats: creates intake records, edits them before approval
    Purchasing,
    /// Agent de saisie: enters issuance records for its structure
    DataEntry,
    /// Responsable / Directeur financier
    Finance,
    /// Directeur de la structure
    Director,
    /// Ordonnateur: the only role whose approval moves stock
    HeadOfEntity,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Purchasing,
        Role::DataEntry,
        Role::Finance,
        Role::Director,
        Role::HeadOfEntity,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Purchasing => "purchasing",
            Role::DataEntry => "data_entry",
            Role::Finance => "finance",
            Role::Director => "director",
            Role::HeadOfEntity => "head_of_entity",
            Role::Admin => "admin",
        }
    }

    /// Display name used in the organisation and recorded in audit entries
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Purchasing => "Responsable achats",
            Role::DataEntry => "Agent de saisie",
            Role::Finance => "Responsable financier",
            Role::Director => "Directeur",
            Role::HeadOfEntity => "Ordonnateur",
            Role::Admin => "Admin",
        }
    }

    /// Every name the organisation uses for this role, lowercase
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Role::Purchasing => &["responsable achats", "purchasing"],
            Role::DataEntry => &["agent de saisie", "data_entry", "dataentry"],
            Role::Finance => &[
                "responsable financier",
                "directeur financier",
                "finance",
            ],
            Role::Director => &[
                "directeur",
                "directeur de structure",
                "directeur de la structure",
                "director",
            ],
            Role::HeadOfEntity => &["ordonnateur", "head_of_entity", "headofentity"],
            Role::Admin => &["admin", "administrateur"],
        }
    }

    /// Resolve a role name as handed over by the identity provider.
    ///
    /// Matching ignores case and surrounding whitespace, so "Directeur Financier"
    /// and "directeur financier" resolve to the same role.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.aliases().contains(&normalized.as_str()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Role name that matches none of the known roles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// The identity on whose behalf a workflow operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub is_admin: bool,
    pub ministry_id: Option<Uuid>,
    pub structure_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            is_admin: role == Role::Admin,
            ministry_id: None,
            structure_id: None,
        }
    }

    pub fn with_scope(mut self, ministry_id: Uuid, structure_id: Uuid) -> Self {
        self.ministry_id = Some(ministry_id);
        self.structure_id = Some(structure_id);
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin || self.role == Role::Admin;
        self
    }

    /// Whether the actor may act on records of the given scope.
    ///
    /// Data entry agents and directors are bound to their structure; the other
    /// roles work across their ministry. Admins see everything.
    pub fn covers(&self, ministry_id: Uuid, structure_id: Uuid) -> bool {
        if self.is_admin {
            return true;
        }
        match self.role {
            Role::DataEntry | Role::Director => self.structure_id == Some(structure_id),
            Role::Admin => true,
            _ => self.ministry_id == Some(ministry_id),
        }
    }
}
