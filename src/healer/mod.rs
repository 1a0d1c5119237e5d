//! Manifest healing strategies.
//!
//! Each strategy edits the parsed manifest in place and reports one
//! [`Modification`] per changed field. Strategies are registered in a
//! [`StrategyTable`] keyed by category; the healer parses the document, runs
//! the strategy and serializes the result.

mod image;
mod probes;
mod resources;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::analyzer::Diagnosis;
use crate::category::FailureCategory;
use crate::error::{Error, Result};
use crate::manifest;

pub use image::image_pull;
pub use probes::{crash_loop, probe_failure};
pub use resources::{out_of_memory, pending};

/// One field-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    /// Dotted, indexed path of the changed field.
    #[serde(rename = "field")]
    pub field_path: String,
    /// Value before the change; `null` when the field was absent.
    pub old_value: Value,
    pub new_value: Value,
    /// Container (and probe) the change applies to.
    pub target: String,
}

/// A healed document with the changes that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Healed {
    pub document: String,
    pub modifications: Vec<Modification>,
}

/// A healing strategy: edits `document` in place and returns the changes.
pub type Strategy = fn(&mut Value, &Diagnosis) -> Vec<Modification>;

/// Makes no changes. Used where no safe automatic fix exists.
pub fn conservative(_document: &mut Value, _diagnosis: &Diagnosis) -> Vec<Modification> {
    Vec::new()
}

/// Maps categories to their healing strategy.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    strategies: HashMap<FailureCategory, Strategy>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::empty()
            .register(FailureCategory::OutOfMemory, out_of_memory)
            .register(FailureCategory::CrashLoop, crash_loop)
            .register(FailureCategory::ImagePullFailure, image_pull)
            .register(FailureCategory::Pending, pending)
            .register(FailureCategory::ProbeFailure, probe_failure)
            .register(FailureCategory::NodeNotReady, conservative)
            .register(FailureCategory::Unknown, conservative)
    }
}

impl StrategyTable {
    /// A table with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registers (or replaces) the strategy for `category`.
    pub fn register(mut self, category: FailureCategory, strategy: Strategy) -> Self {
        self.strategies.insert(category, strategy);
        self
    }

    /// Looks up the strategy for `category`.
    pub fn get(&self, category: FailureCategory) -> Option<Strategy> {
        self.strategies.get(&category).copied()
    }
}

/// Applies healing strategies to YAML documents.
#[derive(Debug, Clone, Default)]
pub struct ManifestHealer {
    strategies: StrategyTable,
}

impl ManifestHealer {
    /// Creates a healer with a custom strategy table.
    pub fn new(strategies: StrategyTable) -> Self {
        Self { strategies }
    }

    /// Heals `document` with the strategy registered for `category`.
    pub fn heal(&self, category: FailureCategory, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        let strategy = self
            .strategies
            .get(category)
            .ok_or(Error::UnsupportedCategory(category))?;
        apply(strategy, document, diagnosis)
    }

    /// Doubles container memory.
    pub fn heal_out_of_memory(&self, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        apply(out_of_memory, document, diagnosis)
    }

    /// Delays liveness/readiness probes and adds a startup probe.
    pub fn heal_crash_loop(&self, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        apply(crash_loop, document, diagnosis)
    }

    /// Pins mutable image tags to a reference seen in the evidence.
    pub fn heal_image_pull(&self, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        apply(image_pull, document, diagnosis)
    }

    /// Halves resource requests.
    pub fn heal_pending(&self, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        apply(pending, document, diagnosis)
    }

    /// Relaxes probe timing.
    pub fn heal_probe_failure(&self, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
        apply(probe_failure, document, diagnosis)
    }
}

fn apply(strategy: Strategy, document: &str, diagnosis: &Diagnosis) -> Result<Healed> {
    let mut value = manifest::parse(document)?;
    let modifications = strategy(&mut value, diagnosis);
    if modifications.is_empty() {
        return Ok(Healed {
            document: document.to_string(),
            modifications,
        });
    }
    Ok(Healed {
        document: manifest::to_yaml(&value)?,
        modifications,
    })
}

/// Writes `new` into `map[key]`, recording the change unless the value is unchanged.
fn set_field(
    map: &mut Mapping,
    key: &str,
    new: Value,
    field_path: String,
    target: &str,
    modifications: &mut Vec<Modification>,
) {
    let old = map.get(key).cloned().unwrap_or(Value::Null);
    if old == new {
        return;
    }
    map.insert(Value::String(key.to_string()), new.clone());
    modifications.push(Modification {
        field_path,
        old_value: old,
        new_value: new,
        target: target.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn diagnosis(category: FailureCategory) -> Diagnosis {
        Diagnosis {
            category,
            root_cause: String::new(),
            confidence: 50,
            severity: category.risk_level(),
            evidence: Vec::new(),
            fix_suggestions: Vec::new(),
            referenced_images: Vec::new(),
        }
    }

    const MANIFEST: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
  labels:
    app: api
spec:
  replicas: 2
  template:
    spec:
      containers:
      - name: app
        image: api:1.0.0
        resources:
          limits:
            memory: 512Mi
"#;

    #[test]
    fn unsupported_category_is_an_error() {
        let healer = ManifestHealer::new(StrategyTable::empty());
        let err = healer
            .heal(FailureCategory::OutOfMemory, MANIFEST, &diagnosis(FailureCategory::OutOfMemory))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCategory(FailureCategory::OutOfMemory)));
    }

    #[test]
    fn conservative_categories_leave_document_untouched() {
        let healer = ManifestHealer::default();
        for category in [FailureCategory::NodeNotReady, FailureCategory::Unknown] {
            let healed = healer.heal(category, MANIFEST, &diagnosis(category)).unwrap();
            assert_eq!(healed.document, MANIFEST);
            assert!(healed.modifications.is_empty());
        }
    }

    #[test]
    fn malformed_document_is_reported() {
        let healer = ManifestHealer::default();
        let err = healer
            .heal_out_of_memory("a: [b", &diagnosis(FailureCategory::OutOfMemory))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
    }

    #[test]
    fn only_targeted_paths_change() {
        let healer = ManifestHealer::default();
        let healed = healer
            .heal(FailureCategory::OutOfMemory, MANIFEST, &diagnosis(FailureCategory::OutOfMemory))
            .unwrap();
        let baseline = manifest::to_yaml(&manifest::parse(MANIFEST).unwrap()).unwrap();

        let changed: Vec<(&str, &str)> = baseline
            .lines()
            .zip(healed.document.lines())
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.trim(), b.trim()))
            .collect();
        assert_eq!(changed, vec![("memory: 512Mi", "memory: 1024Mi")]);

        // The added request is the only extra content.
        let extra = healed.document.lines().count() - baseline.lines().count();
        assert_eq!(extra, 2);
    }

    #[test]
    fn custom_strategy_can_be_registered() {
        fn label(document: &mut Value, _: &Diagnosis) -> Vec<Modification> {
            let mut mods = Vec::new();
            if let Some(map) = document.as_mapping_mut() {
                set_field(map, "healed", Value::Bool(true), "healed".into(), "document", &mut mods);
            }
            mods
        }
        let healer = ManifestHealer::new(StrategyTable::default().register(FailureCategory::NodeNotReady, label));
        let healed = healer
            .heal(FailureCategory::NodeNotReady, MANIFEST, &diagnosis(FailureCategory::NodeNotReady))
            .unwrap();
        assert_eq!(healed.modifications.len(), 1);
        assert_eq!(healed.modifications[0].old_value, Value::Null);
        assert!(healed.document.contains("healed: true"));
    }

    #[test]
    fn modification_serializes_field_name() {
        let m = Modification {
            field_path: "spec.replicas".into(),
            old_value: Value::Null,
            new_value: Value::Number(3.into()),
            target: "api".into(),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["field"], "spec.replicas");
        assert_eq!(json["old_value"], serde_json::Value::Null);
        assert_eq!(json["new_value"], 3);
    }
}
