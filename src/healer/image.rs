//! Image reference strategy.

use serde_yaml::Value;

use super::{set_field, Modification};
use crate::analyzer::Diagnosis;
use crate::manifest::{self, ContainerMut, ImageRef};

/// Replaces mutable image tags with the most specific reference to the same
/// repository found in the evidence.
///
/// Digests beat tags and tags with more version components beat shorter
/// ones. Pinned images and images without a better candidate are untouched.
pub fn image_pull(document: &mut Value, diagnosis: &Diagnosis) -> Vec<Modification> {
    let candidates: Vec<ImageRef> = diagnosis
        .referenced_images
        .iter()
        .filter_map(|r| ImageRef::parse(r))
        .filter(|r| !r.is_mutable())
        .collect();
    let mut modifications = Vec::new();

    for ContainerMut { path, name, fields } in manifest::containers_mut(document) {
        let Some(current) = fields
            .get("image")
            .and_then(Value::as_str)
            .and_then(ImageRef::parse)
        else {
            continue;
        };
        if !current.is_mutable() {
            continue;
        }

        // First candidate wins on equal specificity.
        let best = candidates
            .iter()
            .filter(|c| c.repository == current.repository)
            .rev()
            .max_by_key(|c| c.specificity());
        let Some(best) = best else {
            tracing::warn!(container = %name, image = %current, "no pinned reference in evidence");
            continue;
        };

        set_field(
            fields,
            "image",
            Value::String(best.to_string()),
            format!("{path}.image"),
            &name,
            &mut modifications,
        );
    }
    modifications
}
