//! Resource request and limit strategies.

use std::fmt;

use serde_yaml::{Mapping, Value};

use super::{set_field, Modification};
use crate::analyzer::Diagnosis;
use crate::manifest::{self, ContainerMut};
use crate::quantity::{ByteQuantity, ByteUnit, CpuQuantity};

const SECTIONS: [&str; 2] = ["requests", "limits"];

/// A parsed resource amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Amount {
    Cpu(CpuQuantity),
    Bytes(ByteQuantity),
}

impl Amount {
    fn parse(resource: &str, value: &Value) -> Option<Self> {
        let text = manifest::scalar_text(value)?;
        if resource == "cpu" {
            CpuQuantity::parse(&text).map(Amount::Cpu)
        } else {
            ByteQuantity::parse(&text).map(Amount::Bytes)
        }
    }

    fn halved(self) -> Self {
        match self {
            Amount::Cpu(q) => Amount::Cpu(q.halved()),
            Amount::Bytes(q) => Amount::Bytes(q.halved()),
        }
    }

    fn floor(resource: &str) -> Self {
        match resource {
            "cpu" => Amount::Cpu(CpuQuantity::from_millis(100)),
            _ => Amount::Bytes(ByteQuantity::new(256, ByteUnit::Mi)),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Cpu(q) => fmt::Display::fmt(q, f),
            Amount::Bytes(q) => fmt::Display::fmt(q, f),
        }
    }
}

fn memory_in(resources: &Mapping, section: &str) -> Option<(ByteQuantity, bool)> {
    let value = resources.get(section)?.get("memory")?;
    let quantity = ByteQuantity::parse(&manifest::scalar_text(value)?)?;
    Some((quantity, value.is_number()))
}

/// Doubles container memory, never below 128Mi.
///
/// The base is the limit when set, else the request. Both the request and the
/// limit are set to the new amount. Containers without memory settings (or
/// with unparseable ones) are left alone.
pub fn out_of_memory(document: &mut Value, _diagnosis: &Diagnosis) -> Vec<Modification> {
    let floor = ByteQuantity::new(128, ByteUnit::Mi);
    let mut modifications = Vec::new();

    for ContainerMut { path, name, fields } in manifest::containers_mut(document) {
        let Some(resources) = manifest::child_mapping(fields, "resources", false) else {
            continue;
        };
        let Some((old, numeric)) =
            memory_in(resources, "limits").or_else(|| memory_in(resources, "requests"))
        else {
            continue;
        };

        let new = old.scaled(2).max(floor);
        let new_value = manifest::quantity_value(new.to_string(), numeric);
        tracing::debug!(container = %name, old = %old, new = %new, "raising memory");

        for section in SECTIONS {
            let Some(target) = manifest::child_mapping(resources, section, true) else {
                continue;
            };
            set_field(
                target,
                "memory",
                new_value.clone(),
                format!("{path}.resources.{section}.memory"),
                &name,
                &mut modifications,
            );
        }
    }
    modifications
}

/// Halves cpu, memory and ephemeral-storage requests.
///
/// Floors are 100m CPU and 256Mi for memory and storage; a floor never raises
/// a request above its old value. A limit is raised only when it ends up
/// below the new request.
pub fn pending(document: &mut Value, _diagnosis: &Diagnosis) -> Vec<Modification> {
    let mut modifications = Vec::new();

    for ContainerMut { path, name, fields } in manifest::containers_mut(document) {
        let Some(resources) = manifest::child_mapping(fields, "resources", false) else {
            continue;
        };

        for resource in ["cpu", "memory", "ephemeral-storage"] {
            let Some(requests) = manifest::child_mapping(resources, "requests", false) else {
                break;
            };
            let Some(old_value) = requests.get(resource) else {
                continue;
            };
            let Some(old) = Amount::parse(resource, old_value) else {
                tracing::warn!(container = %name, resource, "unparseable request left unchanged");
                continue;
            };
            let numeric = old_value.is_number();

            let new = old.halved().max(Amount::floor(resource).min(old));
            if new == old {
                continue;
            }
            set_field(
                requests,
                resource,
                manifest::quantity_value(new.to_string(), numeric),
                format!("{path}.resources.requests.{resource}"),
                &name,
                &mut modifications,
            );

            let Some(limits) = manifest::child_mapping(resources, "limits", false) else {
                continue;
            };
            let Some(limit_value) = limits.get(resource) else {
                continue;
            };
            let below = Amount::parse(resource, limit_value).is_some_and(|limit| limit < new);
            if below {
                let numeric = limit_value.is_number();
                set_field(
                    limits,
                    resource,
                    manifest::quantity_value(new.to_string(), numeric),
                    format!("{path}.resources.limits.{resource}"),
                    &name,
                    &mut modifications,
                );
            }
        }
    }
    modifications
}
