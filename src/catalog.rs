//! Pattern catalog.
//!
//! Static tables that map each failure category to its textual signatures,
//! canonical status label, detection priority, diagnostic rules and ranked
//! fix suggestions. The detector and analyzer only read from it.

use regex::{Regex, RegexBuilder};

use crate::analyzer::rules::{self, FixSuggestion, Rule};
use crate::category::FailureCategory;

/// A compiled, case-insensitive failure signature.
#[derive(Debug, Clone)]
pub struct Signature {
    pattern: &'static str,
    regex: Regex,
}

impl Signature {
    /// Compiles a signature. Returns `None` when the pattern is invalid.
    pub fn new(pattern: &'static str) -> Option<Self> {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Some(Self { pattern, regex }),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "dropping invalid signature");
                None
            }
        }
    }

    /// The source pattern.
    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    /// True when the signature occurs anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Everything the engine knows about one category.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub category: FailureCategory,
    /// Status token reported for this category.
    pub canonical_label: &'static str,
    /// Lower sorts first on confidence ties.
    pub priority: u8,
    pub signatures: Vec<Signature>,
    pub rules: Vec<Rule>,
    pub suggestions: Vec<FixSuggestion>,
    /// Fallback root cause when no rule fires.
    pub typical_cause: &'static str,
}

impl CatalogEntry {
    /// Builds an entry with the built-in rules and suggestions for `category`.
    pub fn new(category: FailureCategory, priority: u8, patterns: &[&'static str]) -> Self {
        Self {
            category,
            canonical_label: category.canonical_label(),
            priority,
            signatures: patterns.iter().filter_map(|p| Signature::new(*p)).collect(),
            rules: rules::rules_for(category),
            suggestions: rules::suggestions_for(category),
            typical_cause: rules::typical_cause(category),
        }
    }
}

/// Signature patterns per category.
fn builtin_patterns(category: FailureCategory) -> &'static [&'static str] {
    match category {
        FailureCategory::OutOfMemory => &[
            r"OOMKilled",
            r"OutOfMemory",
            r"out of memory",
            r"memory exhausted",
            r"exit code:?\s*137\b",
            r"exceeded (?:its |the )?memory limit",
            r"java heap space",
            r"\bexit\s+137\b",
        ],
        FailureCategory::ImagePullFailure => &[
            r"ImagePullBackOff",
            r"ErrImagePull",
            r"failed to pull image",
            r"image not found",
            r"no such image",
            r"pull access denied",
            r"manifest unknown",
            r"\bunauthorized\b",
            r"image pull error",
            r"not found: manifest",
        ],
        FailureCategory::CrashLoop => &[
            r"CrashLoopBackOff",
            r"back-?off restarting failed container",
            r"exit code:?\s*(?:[1-9]|[1-9][0-9]|1[01][0-9]|12[0-8])\b",
            r"\bpanic",
            r"segmentation fault",
            r"core dumped",
            r"(?:application|app) (?:failed to start|startup failed)",
            r"exception",
            r"fatal error",
            r"\bexit\s+(?:[1-9]|[1-9][0-9]|1[01][0-9]|12[0-8])\b",
            r"error.*startup",
        ],
        FailureCategory::Pending => &[
            r"\bpending\b",
            r"FailedScheduling",
            r"insufficient (?:memory|cpu)",
            r"no nodes available",
            r"didn't match (?:pod's )?node (?:selector|affinity)",
            r"untolerated taint",
            r"unbound (?:immediate )?persistentvolumeclaims?",
            r"taint.*(?:toleration|didn't tolerate)",
            r"persistentvolumeclaim.*not bound",
        ],
        FailureCategory::ProbeFailure => &[
            r"liveness probe failed",
            r"readiness probe failed",
            r"startup probe failed",
            r"\bunhealthy\b",
            r"health check.*fail",
            r"probe.*timed? ?out",
            r"connection refused",
            r"probe.*fail",
            r"timeout waiting for probe",
        ],
        FailureCategory::NodeNotReady => &[
            r"NodeNotReady",
            r"node(?: \S+)? (?:is )?not ready",
            r"kubelet stopped posting node status",
            r"node\.kubernetes\.io/unreachable",
            r"node\.kubernetes\.io/not-ready",
        ],
        FailureCategory::Unknown => &[],
    }
}

/// Ordered, read-only collection of catalog entries.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternCatalog {
    /// A catalog with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The built-in catalog covering every detectable category.
    pub fn builtin() -> Self {
        FailureCategory::DETECTABLE
            .iter()
            .enumerate()
            .fold(Self::empty(), |catalog, (priority, category)| {
                catalog.register(CatalogEntry::new(
                    *category,
                    priority as u8,
                    builtin_patterns(*category),
                ))
            })
    }

    /// Adds an entry, replacing any existing entry for the same category in place.
    pub fn register(mut self, entry: CatalogEntry) -> Self {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.category == entry.category)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks up the entry for a category.
    pub fn entry(&self, category: FailureCategory) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.category == category)
    }
}
