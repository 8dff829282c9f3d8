//! OptimizationSuggestion — the AI collaborator's boundary type.
//!
//! The suggestion engine is external; govhub only accepts its candidates and
//! funnels them into the approval workflow as MODIFICATION requests under an
//! AI requester identity. Nothing here scores or generates suggestions.

use serde::{Deserialize, Serialize};

use crate::error::{GovError, ValidationError};

/// What kind of change the suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Adjust a schedule or trigger window.
    Schedule,
    /// Reduce energy usage.
    Energy,
    /// Remove or merge redundant behavior.
    Simplification,
    /// React to an observed reliability problem.
    Reliability,
}

/// Expected blast radius of applying the suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// A candidate optimization produced by the external suggestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    pub description: String,
    /// Model confidence, 0–100.
    pub confidence: u8,
    pub impact: ImpactLevel,
    /// The proposed replacement configuration.
    pub proposed_config: serde_json::Value,
}

impl OptimizationSuggestion {
    /// Check boundary invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Validation`] when `confidence` exceeds 100 or the
    /// description is empty.
    pub fn validate(&self) -> Result<(), GovError> {
        if self.confidence > 100 {
            return Err(ValidationError::ConfidenceOutOfRange(self.confidence).into());
        }
        if self.description.is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }
        Ok(())
    }

    /// The payload submitted into the approval workflow.
    #[must_use]
    pub fn to_submission_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "config": self.proposed_config,
            "suggestion": {
                "kind": self.kind,
                "description": self.description,
                "confidence": self.confidence,
                "impact": self.impact,
            },
        })
    }
}
