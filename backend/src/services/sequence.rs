//! Document number allocation

use std::sync::Arc;

use chrono::{Datelike, Utc};
use shared::numbering::{normalize_code, SequenceKey};
use shared::Structure;

use crate::config::NumberingConfig;
use crate::error::AppResult;
use crate::store::WorkflowStore;

/// Hands out document numbers from the store's per-key counters
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn WorkflowStore>,
    numbering: NumberingConfig,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn WorkflowStore>, numbering: NumberingConfig) -> Self {
        Self { store, numbering }
    }

    pub fn current_year() -> i32 {
        Utc::now().year()
    }

    /// Key of the global intake sequence for `year`
    pub fn intake_key(&self, year: i32) -> SequenceKey {
        SequenceKey::intake(&self.numbering.intake_prefix, year)
    }

    /// Key of the issuance sequence of a structure for `year`.
    ///
    /// Missing abbreviations, or ones with nothing left after normalization, fall back to the configured default codes.
    pub fn issuance_key(&self, structure: &Structure, year: i32) -> SequenceKey {
        let ministry_code = code_or(
            structure.ministry_abbreviation.as_deref(),
            &self.numbering.default_ministry_code,
        );
        let structure_code = code_or(
            structure.abbreviation.as_deref(),
            &self.numbering.default_structure_code,
        );

        SequenceKey::issuance(
            &self.numbering.issuance_prefix,
            &ministry_code,
            &structure_code,
            year,
        )
    }

    pub async fn allocate(&self, key: &SequenceKey) -> AppResult<String> {
        let sequence = self.store.next_sequence(key).await?;
        let number = key.format(sequence);
        tracing::debug!(numero = %number, scope = %key.scope, "allocated document number");
        Ok(number)
    }

    pub async fn next_intake_number(&self) -> AppResult<String> {
        self.allocate(&self.intake_key(Self::current_year())).await
    }

    pub async fn next_issuance_number(&self, structure: &Structure) -> AppResult<String> {
        self.allocate(&self.issuance_key(structure, Self::current_year()))
            .await
    }
}

/// Normalized abbreviation, or the default when nothing usable is left
fn code_or(abbreviation: Option<&str>, default: &str) -> String {
    abbreviation
        .map(normalize_code)
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| normalize_code(default))
}
