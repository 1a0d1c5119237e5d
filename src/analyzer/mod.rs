//! Root-cause analysis for detected failures.
//!
//! The analyzer evaluates the category's rule list from the pattern catalog
//! against the error text and (when it parses) the manifest. Every satisfied
//! rule contributes one piece of evidence and raises confidence; the root
//! cause is the explanation of the highest-priority satisfied rule.

pub mod rules;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::catalog::PatternCatalog;
use crate::category::{FailureCategory, RiskLevel};
use crate::manifest::{self, ContainerRef, ImageRef};

pub use rules::{FixSuggestion, Rule, RuleAngle};

/// Confidence before any rule fires.
const BASE_CONFIDENCE: u8 = 50;
/// Confidence added per satisfied rule.
const RULE_CONFIDENCE: u8 = 10;
/// Root causes are inferred, never certain.
pub const MAX_CONFIDENCE: u8 = 95;

static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)exit(?:ed)?(?: with)?(?: code)?\s*[:=]?\s*(\d{1,3})\b")
        .expect("exit code pattern is valid")
});

static IMAGE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)image:?\s+["']?([a-z0-9][a-z0-9._/:-]*[a-z0-9](?:@sha256:[a-f0-9]+)?)"#,
    )
    .expect("image mention pattern is valid")
});

/// Result of root-cause analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// The analyzed category.
    pub category: FailureCategory,
    /// Explanation of why the failure happened.
    pub root_cause: String,
    /// Confidence in the explanation, 0-95.
    pub confidence: u8,
    /// Severity of the failure, fixed per category.
    pub severity: RiskLevel,
    /// Supporting evidence, one entry per satisfied rule.
    pub evidence: Vec<String>,
    /// Ranked remediation suggestions consistent with the evidence.
    pub fix_suggestions: Vec<String>,
    /// Image references mentioned in the error text.
    #[serde(default)]
    pub referenced_images: Vec<String>,
}

impl Diagnosis {
    /// Diagnosis used when no signature matched.
    pub fn undiagnosed(error_text: &str) -> Self {
        let context = AnalysisContext::new(error_text, None);
        Self {
            category: FailureCategory::Unknown,
            root_cause: "No known failure signature matched the evidence".to_string(),
            confidence: 0,
            severity: RiskLevel::for_category(FailureCategory::Unknown),
            evidence: Vec::new(),
            fix_suggestions: vec!["Inspect pod events and container logs manually".to_string()],
            referenced_images: context.referenced_images,
        }
    }
}

/// Evidence available to analysis rules.
pub struct AnalysisContext<'a> {
    error_text: &'a str,
    lowered: String,
    document: Option<Value>,
    exit_codes: Vec<u16>,
    referenced_images: Vec<String>,
}

impl<'a> AnalysisContext<'a> {
    /// Builds a context. A document that fails to parse is treated as absent.
    pub fn new(error_text: &'a str, document: Option<&str>) -> Self {
        let document = document.and_then(|doc| match manifest::parse(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "skipping manifest checks");
                None
            }
        });

        let exit_codes = EXIT_CODE
            .captures_iter(error_text)
            .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
            .collect();

        let mut referenced_images: Vec<String> = Vec::new();
        for caps in IMAGE_MENTION.captures_iter(error_text) {
            let Some(reference) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let looks_like_image = reference.contains([':', '/', '@']);
            if looks_like_image
                && ImageRef::parse(reference).is_some()
                && !referenced_images.iter().any(|r| r == reference)
            {
                referenced_images.push(reference.to_string());
            }
        }

        Self {
            error_text,
            lowered: error_text.to_lowercase(),
            document,
            exit_codes,
            referenced_images,
        }
    }

    /// The raw error text.
    pub fn text(&self) -> &str {
        self.error_text
    }

    /// True when any needle occurs in the error text (case-insensitive).
    pub fn mentions(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lowered.contains(&n.to_lowercase()))
    }

    /// Total occurrences of all needles in the error text (case-insensitive).
    pub fn count(&self, needles: &[&str]) -> usize {
        needles
            .iter()
            .map(|n| self.lowered.matches(&n.to_lowercase()).count())
            .sum()
    }

    /// The parsed manifest, if it parsed.
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Containers of the parsed manifest.
    pub fn containers(&self) -> Vec<ContainerRef<'_>> {
        self.document.as_ref().map(manifest::containers).unwrap_or_default()
    }

    /// The pod spec of the parsed manifest.
    pub fn pod_spec(&self) -> Option<&Mapping> {
        self.document.as_ref().and_then(manifest::pod_spec)
    }

    /// Exit codes reported in the error text.
    pub fn exit_codes(&self) -> &[u16] {
        &self.exit_codes
    }

    /// Image references mentioned in the error text.
    pub fn referenced_images(&self) -> &[String] {
        &self.referenced_images
    }
}

/// Explains detected failures using the catalog's rule tables.
#[derive(Debug, Clone)]
pub struct RootCauseAnalyzer {
    catalog: Arc<PatternCatalog>,
}

impl RootCauseAnalyzer {
    /// Creates an analyzer over a shared catalog.
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Analyzes a failure of `category`.
    ///
    /// `Unknown` (or a category missing from the catalog) yields the
    /// zero-confidence undiagnosed result. A malformed document only disables
    /// the manifest-based rules.
    pub fn analyze(&self, category: FailureCategory, error_text: &str, document: &str) -> Diagnosis {
        let Some(entry) = self
            .catalog
            .entry(category)
            .filter(|_| category != FailureCategory::Unknown)
        else {
            return Diagnosis::undiagnosed(error_text);
        };

        let context = AnalysisContext::new(error_text, Some(document));

        let mut evidence = Vec::new();
        let mut root_cause = None;
        for rule in &entry.rules {
            if let Some(found) = (rule.check)(&context) {
                tracing::debug!(rule = rule.name, evidence = %found, "rule satisfied");
                evidence.push(format!("{}: {}", rule.name, found));
                root_cause.get_or_insert(rule.explanation);
            }
        }

        let confidence = (evidence.len() as u32 * RULE_CONFIDENCE as u32 + BASE_CONFIDENCE as u32)
            .min(MAX_CONFIDENCE as u32) as u8;

        let fix_suggestions = entry
            .suggestions
            .iter()
            .filter(|s| (s.applies)(&context))
            .map(|s| s.text.to_string())
            .collect();

        Diagnosis {
            category,
            root_cause: root_cause.unwrap_or(entry.typical_cause).to_string(),
            confidence,
            severity: RiskLevel::for_category(category),
            evidence,
            fix_suggestions,
            referenced_images: context.referenced_images,
        }
    }
}
