//! Append-only remediation history for one engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{FailureCategory, RiskLevel};
use crate::error::Result;
use crate::healer::Modification;

/// One diagnose-and-heal pass as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    #[serde(rename = "failure_type")]
    pub category: FailureCategory,
    pub root_cause: String,
    pub confidence: u8,
    pub evidence: Vec<String>,
    pub modifications: Vec<Modification>,
    /// Which strategy ran and how sure the diagnosis was.
    pub healing_rationale: String,
    /// Derived from the category.
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of remediation actions.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<RemediationAction>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action. Entries are never reordered or removed.
    pub(crate) fn append(&mut self, action: RemediationAction) {
        tracing::debug!(
            failure_type = %action.category,
            risk = %action.risk_level,
            modifications = action.modifications.len(),
            "audit entry recorded"
        );
        self.entries.push(action);
    }

    /// Entries in the order they were recorded.
    pub fn entries(&self) -> &[RemediationAction] {
        &self.entries
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exports the trail as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}
