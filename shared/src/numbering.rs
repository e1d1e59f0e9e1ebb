//! Document numbering
//!
//! Intake numbers are scoped per year (`INT-2026-0001`), issuance numbers per
//! ministry, structure and year (`ISS-MSAS-DRS-2026-0001`). The sequence part
//! is zero-padded to four digits and keeps growing past 9999.

use serde::{Deserialize, Serialize};

/// Kind of document a sequence numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Intake,
    Issuance,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Intake => "intake",
            DocumentKind::Issuance => "issuance",
        }
    }
}

/// Counter identity: one independent sequence per (kind, scope, year)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    pub kind: DocumentKind,
    pub scope: String,
    pub year: i32,
    /// Number prefix including the trailing separator
    pub prefix: String,
}

impl SequenceKey {
    pub const GLOBAL_SCOPE: &'static str = "GLOBAL";

    pub fn intake(prefix: &str, year: i32) -> Self {
        Self {
            kind: DocumentKind::Intake,
            scope: Self::GLOBAL_SCOPE.to_string(),
            year,
            prefix: format!("{}-{}-", prefix, year),
        }
    }

    pub fn issuance(prefix: &str, ministry_code: &str, structure_code: &str, year: i32) -> Self {
        let ministry_code = normalize_code(ministry_code);
        let structure_code = normalize_code(structure_code);
        Self {
            kind: DocumentKind::Issuance,
            scope: format!("{}-{}", ministry_code, structure_code),
            year,
            prefix: format!("{}-{}-{}-{}-", prefix, ministry_code, structure_code, year),
        }
    }

    pub fn format(&self, sequence: i64) -> String {
        format!("{}{:04}", self.prefix, sequence)
    }

    /// Sequence value of a number issued under this key, if it is one
    pub fn parse(&self, number: &str) -> Option<i64> {
        let digits = number.strip_prefix(&self.prefix)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Uppercase an abbreviation and drop characters that would break the format
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}
