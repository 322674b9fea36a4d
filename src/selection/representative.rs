use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{PolicyGroupError, Result};
use crate::model::{ClassId, ModelId};
use crate::TARGET_SELECTION;

/// The model chosen for one equivalence class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Representative {
    pub model_id: ModelId,
    pub coverage: f64,
    pub class_size: usize,
}

/// Picks the best-covering model of every equivalence class.
///
/// Ties on coverage go to the lexicographically lowest model id, so the
/// choice does not depend on the order members are listed in.
///
/// # Arguments
/// * `classes` - Member models of every class
/// * `coverage` - Fraction of items in some group, per model
///
/// # Returns
/// * `Err(EmptyClass)` - A class lists no models
/// * `Err(UnknownKey)` - A member has no coverage value
/// * `Err(InvalidCoverage)` - A coverage value is not a finite number in [0, 1]
pub fn select_representatives(
    classes: &BTreeMap<ClassId, Vec<ModelId>>,
    coverage: &BTreeMap<ModelId, f64>,
) -> Result<BTreeMap<ClassId, Representative>> {
    let mut selected = BTreeMap::new();

    for (&class, members) in classes {
        let mut best: Option<(&ModelId, f64)> = None;

        for model in members {
            let value = *coverage
                .get(model)
                .ok_or_else(|| PolicyGroupError::unknown_key(model))?;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PolicyGroupError::InvalidCoverage {
                    model: model.clone(),
                    coverage: value,
                });
            }

            let better = match best {
                None => true,
                Some((current, current_value)) => {
                    value > current_value || (value == current_value && model < current)
                }
            };
            if better {
                best = Some((model, value));
            }
        }

        let (model_id, value) = best.ok_or(PolicyGroupError::EmptyClass { class })?;
        debug!(
            target: TARGET_SELECTION,
            "Class {} ({} models): selected {} with coverage {:.3}",
            class,
            members.len(),
            model_id,
            value
        );

        selected.insert(
            class,
            Representative {
                model_id: model_id.clone(),
                coverage: value,
                class_size: members.len(),
            },
        );
    }

    Ok(selected)
}
