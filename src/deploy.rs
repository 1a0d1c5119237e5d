//! Deploy collaborator boundary.
//!
//! The engine never talks to a cluster itself. It hands each document to a
//! [`Deployer`] and reads back the outcome.

use serde::{Deserialize, Serialize};

/// Result of one deploy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub success: bool,
    /// Status token reported by the platform, e.g. `CrashLoopBackOff`.
    pub status_label: Option<String>,
    /// Error output captured from the attempt.
    pub error_text: String,
}

impl DeployOutcome {
    /// A successful deploy.
    pub fn succeeded() -> Self {
        Self {
            success: true,
            status_label: None,
            error_text: String::new(),
        }
    }

    /// A failed deploy with its status label and error output.
    pub fn failed(status_label: Option<&str>, error_text: impl Into<String>) -> Self {
        Self {
            success: false,
            status_label: status_label.map(str::to_string),
            error_text: error_text.into(),
        }
    }
}

/// Submits a document and reports what happened.
pub trait Deployer {
    fn deploy(&mut self, document: &str) -> DeployOutcome;
}

impl<F> Deployer for F
where
    F: FnMut(&str) -> DeployOutcome,
{
    fn deploy(&mut self, document: &str) -> DeployOutcome {
        self(document)
    }
}

/// Replays a fixed list of outcomes and records every submitted document.
///
/// Once the script runs out, the last outcome repeats.
#[derive(Debug, Clone)]
pub struct ScriptedDeployer {
    outcomes: Vec<DeployOutcome>,
    submitted: Vec<String>,
}

impl ScriptedDeployer {
    /// Creates a deployer that returns `outcomes` in order.
    pub fn new(outcomes: Vec<DeployOutcome>) -> Self {
        Self {
            outcomes,
            submitted: Vec::new(),
        }
    }

    /// A deployer that fails every time with the same evidence.
    pub fn always_failing(status_label: Option<&str>, error_text: &str) -> Self {
        Self::new(vec![DeployOutcome::failed(status_label, error_text)])
    }

    /// Number of deploy calls so far.
    pub fn calls(&self) -> usize {
        self.submitted.len()
    }

    /// Documents in the order they were submitted.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }
}

impl Deployer for ScriptedDeployer {
    fn deploy(&mut self, document: &str) -> DeployOutcome {
        let index = self.submitted.len().min(self.outcomes.len().saturating_sub(1));
        self.submitted.push(document.to_string());
        self.outcomes
            .get(index)
            .cloned()
            .unwrap_or_else(|| DeployOutcome::failed(None, "no scripted outcome"))
    }
}
