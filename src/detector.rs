//! Failure detection.
//!
//! Matches error text and an optional status label against every catalog
//! signature and ranks the candidate categories by confidence.

use std::cmp::Reverse;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::PatternCatalog;
use crate::category::FailureCategory;

/// Confidence once a single signature matched.
const FIRST_MATCH: u32 = 50;
/// Confidence added per additional distinct signature.
const EXTRA_MATCH: u32 = 15;
/// Confidence added when the status label is the canonical label.
const LABEL_MATCH: u32 = 10;
const MAX_CONFIDENCE: u32 = 100;

/// One ranked candidate category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub category: FailureCategory,
    /// 0-100.
    pub confidence: u8,
    /// Patterns of the signatures that matched.
    pub matched_signatures: Vec<String>,
}

impl DetectionResult {
    /// The fallback result when nothing matched.
    pub fn unknown() -> Self {
        Self {
            category: FailureCategory::Unknown,
            confidence: 0,
            matched_signatures: Vec::new(),
        }
    }
}

/// Classifies failure evidence against a shared catalog.
#[derive(Debug, Clone)]
pub struct FailureDetector {
    catalog: Arc<PatternCatalog>,
}

impl Default for FailureDetector {
    fn default() -> Self {
        Self::new(Arc::new(PatternCatalog::default()))
    }
}

impl FailureDetector {
    /// Creates a detector over `catalog`.
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Ranks candidate categories for the evidence.
    ///
    /// Never empty: when no signature matches, the single result is
    /// `Unknown` with confidence 0.
    pub fn detect(&self, error_text: &str, status_label: Option<&str>) -> Vec<DetectionResult> {
        let label = status_label.map(str::trim).filter(|l| !l.is_empty());

        let mut ranked: Vec<(u8, DetectionResult)> = self
            .catalog
            .entries()
            .iter()
            .filter_map(|entry| {
                let matched: Vec<String> = entry
                    .signatures
                    .iter()
                    .filter(|sig| sig.is_match(error_text) || label.is_some_and(|l| sig.is_match(l)))
                    .map(|sig| sig.pattern().to_string())
                    .collect();
                if matched.is_empty() {
                    return None;
                }

                let mut confidence = FIRST_MATCH + EXTRA_MATCH * (matched.len() as u32 - 1);
                if status_label == Some(entry.canonical_label) {
                    confidence += LABEL_MATCH;
                }
                let confidence = confidence.min(MAX_CONFIDENCE) as u8;

                Some((
                    entry.priority,
                    DetectionResult {
                        category: entry.category,
                        confidence,
                        matched_signatures: matched,
                    },
                ))
            })
            .collect();

        if ranked.is_empty() {
            tracing::debug!("no failure signature matched");
            return vec![DetectionResult::unknown()];
        }

        // Stable: equal confidence and priority keep registration order.
        ranked.sort_by_key(|(priority, result)| (Reverse(result.confidence), *priority));

        let results: Vec<DetectionResult> = ranked.into_iter().map(|(_, result)| result).collect();
        tracing::debug!(
            top = %results[0].category,
            confidence = results[0].confidence,
            candidates = results.len(),
            "failure detected"
        );
        results
    }

    /// The highest-ranked candidate.
    pub fn detect_top(&self, error_text: &str, status_label: Option<&str>) -> DetectionResult {
        self.detect(error_text, status_label)
            .into_iter()
            .next()
            .unwrap_or_else(DetectionResult::unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One text per built-in signature, in catalog order, that triggers only it.
    const SAMPLES: &[(FailureCategory, &[&str])] = &[
        (
            FailureCategory::OutOfMemory,
            &[
                "Last State: OOMKilled",
                "OutOfMemory",
                "process ran out of memory",
                "memory exhausted",
                "exit code 137",
                "container exceeded its memory limit",
                "java heap space",
                "container terminated: exit 137",
            ],
        ),
        (
            FailureCategory::ImagePullFailure,
            &[
                "ImagePullBackOff",
                "ErrImagePull",
                "Failed to pull image \"nginx:1.99\"",
                "image not found",
                "no such image",
                "pull access denied",
                "manifest unknown",
                "401 Unauthorized",
                "image pull error",
                "not found: manifest",
            ],
        ),
        (
            FailureCategory::CrashLoop,
            &[
                "CrashLoopBackOff",
                "Back-off restarting failed container",
                "exit code 1",
                "panic: runtime error",
                "segmentation fault",
                "core dumped",
                "application failed to start",
                "NullPointerException",
                "fatal error: all goroutines are asleep",
                "exit 1",
                "ERROR during startup",
            ],
        ),
        (
            FailureCategory::Pending,
            &[
                "pod is pending",
                "FailedScheduling",
                "0/3 nodes: insufficient cpu",
                "no nodes available to schedule pods",
                "2 node(s) didn't match node selector",
                "1 node(s) had untolerated taint",
                "pod has unbound immediate PersistentVolumeClaims",
                "3 node(s) had taint {dedicated: gpu}, that the pod didn't tolerate",
                "PersistentVolumeClaim data-0 is not bound",
            ],
        ),
        (
            FailureCategory::ProbeFailure,
            &[
                "Liveness probe failed",
                "Readiness probe failed",
                "Startup probe failed",
                "container is unhealthy",
                "health check failed",
                "probe timed out",
                "dial tcp 10.0.0.1:8080: connection refused",
                "HTTP probe failed with statuscode: 500",
                "timeout waiting for probe",
            ],
        ),
        (
            FailureCategory::NodeNotReady,
            &[
                "NodeNotReady",
                "node worker-1 is not ready",
                "Kubelet stopped posting node status",
                "taint node.kubernetes.io/unreachable",
                "node.kubernetes.io/not-ready:NoExecute",
            ],
        ),
    ];

    fn detector() -> FailureDetector {
        FailureDetector::default()
    }

    #[test]
    fn samples_cover_every_signature() {
        let catalog = PatternCatalog::default();
        for (category, samples) in SAMPLES {
            let entry = catalog.entry(*category).unwrap();
            assert_eq!(entry.signatures.len(), samples.len(), "{category}");
            for (sig, sample) in entry.signatures.iter().zip(samples.iter()) {
                assert!(sig.is_match(sample), "{} should match {sample:?}", sig.pattern());
            }
        }
    }

    #[test]
    fn each_signature_alone_selects_its_category() {
        let detector = detector();
        for (category, samples) in SAMPLES {
            for sample in *samples {
                let top = detector.detect_top(sample, None);
                assert_eq!(top.category, *category, "sample {sample:?}");
                assert!(top.confidence >= 50, "sample {sample:?}");
            }
        }
    }

    #[test]
    fn empty_evidence_is_unknown() {
        let results = detector().detect("", None);
        assert_eq!(results, vec![DetectionResult::unknown()]);
    }

    #[test]
    fn unmatched_evidence_is_unknown() {
        let results = detector().detect("everything is fine", Some("Running"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, FailureCategory::Unknown);
        assert_eq!(results[0].confidence, 0);
    }

    #[test]
    fn confidence_grows_with_distinct_matches() {
        let detector = detector();
        let texts = [
            "OOMKilled",
            "OOMKilled out of memory",
            "OOMKilled out of memory exit code 137",
            "OOMKilled out of memory exit code 137 java heap space",
            "OOMKilled out of memory exit code 137 java heap space memory exhausted",
        ];
        let mut previous = 0;
        for text in texts {
            let top = detector.detect_top(text, None);
            assert_eq!(top.category, FailureCategory::OutOfMemory);
            assert!(top.confidence >= previous);
            assert!(top.confidence <= 100);
            previous = top.confidence;
        }
        assert_eq!(previous, 100);
    }

    #[test]
    fn canonical_label_adds_bonus() {
        let detector = detector();
        let without = detector.detect_top("container restarted, CrashLoopBackOff", None);
        let with = detector.detect_top(
            "container restarted, CrashLoopBackOff",
            Some("CrashLoopBackOff"),
        );
        assert_eq!(without.confidence, 50);
        assert_eq!(with.confidence, 60);
    }

    #[test]
    fn padded_label_gets_no_bonus() {
        let top = detector().detect_top("", Some(" OOMKilled "));
        assert_eq!(top.category, FailureCategory::OutOfMemory);
        assert_eq!(top.confidence, 50);
    }

    #[test]
    fn label_alone_is_matched() {
        let top = detector().detect_top("", Some("ImagePullBackOff"));
        assert_eq!(top.category, FailureCategory::ImagePullFailure);
        assert_eq!(top.confidence, 60);
    }

    #[test]
    fn ties_break_by_priority() {
        let results = detector().detect("OOMKilled after CrashLoopBackOff", None);
        assert_eq!(results[0].category, FailureCategory::OutOfMemory);
        assert_eq!(results[1].category, FailureCategory::CrashLoop);
        assert_eq!(results[0].confidence, results[1].confidence);
    }

    #[test]
    fn heap_exhaustion_scenario() {
        let top = detector().detect_top("OutOfMemoryError: Java heap space, Exit Code: 137", None);
        assert_eq!(top.category, FailureCategory::OutOfMemory);
        assert!(top.confidence >= 80);
        assert_eq!(top.matched_signatures.len(), 3);
    }
}
