//! Structured access to workload manifests.
//!
//! Documents are parsed with `serde_yaml` into a [`Value`] tree, edited in
//! place, and serialized back. Containers are located at the conventional pod
//! spec paths for controllers, cron jobs and bare pods.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Pod spec locations, most specific first.
const POD_SPEC_PATHS: &[&[&str]] = &[
    &["spec", "jobTemplate", "spec", "template", "spec"],
    &["spec", "template", "spec"],
    &["spec"],
];

/// Probe fields on a container.
pub const PROBE_KINDS: [&str; 3] = ["livenessProbe", "readinessProbe", "startupProbe"];

/// Parses a manifest. The root must be a mapping.
pub fn parse(document: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(document)?;
    match value {
        Value::Mapping(_) => Ok(value),
        other => Err(Error::MalformedDocument(format!(
            "expected a mapping at the document root, found {}",
            kind_name(&other)
        ))),
    }
}

/// Serializes a manifest back to YAML.
pub fn to_yaml(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Walks `path` through nested mappings.
pub fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

fn get_path_mut<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter().try_fold(value, |node, key| node.get_mut(*key))
}

fn pod_spec_path(doc: &Value) -> Option<&'static [&'static str]> {
    POD_SPEC_PATHS.iter().copied().find(|path| {
        get_path(doc, path)
            .and_then(|spec| spec.get("containers"))
            .is_some_and(Value::is_sequence)
    })
}

/// Returns the pod spec mapping holding the containers.
pub fn pod_spec(doc: &Value) -> Option<&Mapping> {
    pod_spec_path(doc)
        .and_then(|path| get_path(doc, path))
        .and_then(Value::as_mapping)
}

/// A parsed container image reference: `registry/repo[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    /// Splits an image reference into repository, tag and digest.
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (reference, None),
        };
        let slash = name.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match name[slash..].rfind(':') {
            Some(i) => (&name[..slash + i], Some(name[slash + i + 1..].to_string())),
            None => (name, None),
        };
        if repository.is_empty() {
            return None;
        }
        Some(Self {
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// True when the reference can silently change: `:latest` or no tag and no digest.
    pub fn is_mutable(&self) -> bool {
        self.digest.is_none()
            && self
                .tag
                .as_deref()
                .map_or(true, |tag| tag.eq_ignore_ascii_case("latest"))
    }

    /// Rank used to pick the most specific reference: digests first, then
    /// tags with more version components.
    pub fn specificity(&self) -> usize {
        if self.digest.is_some() {
            return usize::MAX;
        }
        match self.tag.as_deref() {
            Some(tag) if !tag.eq_ignore_ascii_case("latest") => {
                1 + tag.split(['.', '-', '_']).filter(|part| !part.is_empty()).count()
            }
            _ => 0,
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// A read-only view of one container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerRef<'a> {
    pub index: usize,
    pub name: &'a str,
    pub fields: &'a Mapping,
}

impl<'a> ContainerRef<'a> {
    /// Looks up `resources.<section>.<key>`.
    pub fn resource(&self, section: &str, key: &str) -> Option<&'a Value> {
        self.fields
            .get("resources")
            .and_then(|r| r.get(section))
            .and_then(|s| s.get(key))
    }

    /// Returns a probe mapping, if declared.
    pub fn probe(&self, kind: &str) -> Option<&'a Mapping> {
        self.fields.get(kind).and_then(Value::as_mapping)
    }

    /// Image reference, if declared.
    pub fn image(&self) -> Option<&'a str> {
        self.fields.get("image").and_then(Value::as_str)
    }
}

/// Lists the containers of a parsed manifest.
pub fn containers(doc: &Value) -> Vec<ContainerRef<'_>> {
    let Some(path) = pod_spec_path(doc) else {
        return Vec::new();
    };
    get_path(doc, path)
        .and_then(|spec| spec.get("containers"))
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let fields = item.as_mapping()?;
                    Some(ContainerRef {
                        index,
                        name: fields.get("name").and_then(Value::as_str).unwrap_or("unnamed"),
                        fields,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A mutable handle to one container with its dotted path prefix.
pub struct ContainerMut<'a> {
    pub path: String,
    pub name: String,
    pub fields: &'a mut Mapping,
}

/// Lists mutable container handles of a parsed manifest.
pub fn containers_mut(doc: &mut Value) -> Vec<ContainerMut<'_>> {
    let Some(path) = pod_spec_path(doc) else {
        return Vec::new();
    };
    let prefix = format!("{}.containers", path.join("."));
    let Some(items) = get_path_mut(doc, path)
        .and_then(|spec| spec.get_mut("containers"))
        .and_then(Value::as_sequence_mut)
    else {
        return Vec::new();
    };

    items
        .iter_mut()
        .enumerate()
        .filter_map(|(index, item)| {
            let fields = item.as_mapping_mut()?;
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unnamed")
                .to_string();
            Some(ContainerMut {
                path: format!("{prefix}[{index}]"),
                name,
                fields,
            })
        })
        .collect()
}

/// Returns the child mapping under `key`, creating it when `create` is set.
///
/// A `null` child counts as absent. Any other non-mapping child yields `None`
/// so callers never overwrite unexpected structure.
pub fn child_mapping<'a>(map: &'a mut Mapping, key: &str, create: bool) -> Option<&'a mut Mapping> {
    let absent = matches!(map.get(key), None | Some(Value::Null));
    if absent {
        if !create {
            return None;
        }
        map.insert(Value::String(key.to_string()), Value::Mapping(Mapping::new()));
    }
    map.get_mut(key).and_then(Value::as_mapping_mut)
}

/// Reads a scalar as text (`"512Mi"`, `4`, `0.5`).
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Builds a quantity value, keeping numeric form when the original was numeric.
pub fn quantity_value(text: String, numeric: bool) -> Value {
    if numeric {
        if let Ok(n) = text.parse::<u64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(text)
}

/// Reads an integer field.
pub fn int_field(map: &Mapping, key: &str) -> Option<i64> {
    map.get(key).and_then(Value::as_i64)
}

/// Builds an integer value.
pub fn int_value(n: i64) -> Value {
    Value::Number(n.into())
}
