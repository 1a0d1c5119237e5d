//! Failure taxonomy and static risk levels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Recognized deployment failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Container exceeded its memory limit.
    #[serde(rename = "OOMKilled")]
    OutOfMemory,
    /// Container keeps exiting and being restarted.
    #[serde(rename = "CrashLoopBackOff")]
    CrashLoop,
    /// Container image could not be pulled.
    #[serde(rename = "ImagePullBackOff")]
    ImagePullFailure,
    /// Pod could not be scheduled.
    #[serde(rename = "Pending")]
    Pending,
    /// Liveness, readiness or startup probe failing.
    #[serde(rename = "ProbeFailure")]
    ProbeFailure,
    /// The node hosting the pod is unavailable.
    #[serde(rename = "NodeNotReady")]
    NodeNotReady,
    /// No signature matched.
    #[serde(rename = "UnknownFailure")]
    Unknown,
}

impl FailureCategory {
    /// All concrete categories in detection priority order.
    pub const DETECTABLE: [FailureCategory; 6] = [
        FailureCategory::OutOfMemory,
        FailureCategory::ImagePullFailure,
        FailureCategory::CrashLoop,
        FailureCategory::Pending,
        FailureCategory::ProbeFailure,
        FailureCategory::NodeNotReady,
    ];

    /// The status token an external system reports for this category.
    pub fn canonical_label(&self) -> &'static str {
        match self {
            FailureCategory::OutOfMemory => "OOMKilled",
            FailureCategory::CrashLoop => "CrashLoopBackOff",
            FailureCategory::ImagePullFailure => "ImagePullBackOff",
            FailureCategory::Pending => "Pending",
            FailureCategory::ProbeFailure => "ProbeFailure",
            FailureCategory::NodeNotReady => "NodeNotReady",
            FailureCategory::Unknown => "UnknownFailure",
        }
    }

    /// Returns the risk level for this category.
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::for_category(*self)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_label())
    }
}

/// Severity label attached to every remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Static mapping from category to risk. Never chosen independently.
    pub fn for_category(category: FailureCategory) -> Self {
        match category {
            FailureCategory::OutOfMemory | FailureCategory::ImagePullFailure => RiskLevel::Critical,
            FailureCategory::CrashLoop
            | FailureCategory::Pending
            | FailureCategory::NodeNotReady => RiskLevel::High,
            FailureCategory::ProbeFailure => RiskLevel::Medium,
            FailureCategory::Unknown => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_follow_category() {
        assert_eq!(FailureCategory::OutOfMemory.risk_level(), RiskLevel::Critical);
        assert_eq!(FailureCategory::ImagePullFailure.risk_level(), RiskLevel::Critical);
        assert_eq!(FailureCategory::CrashLoop.risk_level(), RiskLevel::High);
        assert_eq!(FailureCategory::Pending.risk_level(), RiskLevel::High);
        assert_eq!(FailureCategory::NodeNotReady.risk_level(), RiskLevel::High);
        assert_eq!(FailureCategory::ProbeFailure.risk_level(), RiskLevel::Medium);
        assert_eq!(FailureCategory::Unknown.risk_level(), RiskLevel::Low);
    }

    #[test]
    fn category_serializes_as_canonical_label() {
        let json = serde_json::to_string(&FailureCategory::OutOfMemory).unwrap();
        assert_eq!(json, "\"OOMKilled\"");

        let parsed: FailureCategory = serde_json::from_str("\"CrashLoopBackOff\"").unwrap();
        assert_eq!(parsed, FailureCategory::CrashLoop);
    }

    #[test]
    fn risk_level_serializes_uppercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
    }
}
