//! Recompute Scheduler.
//!
//! Features are replayed in [`Model::order`]. A feature is executed when it
//! was edited, has never been computed, or depends on a feature that changed
//! earlier in the same pass; every other feature keeps its previous output.
//! Each feature runs at most once per pass, and a failure only affects the
//! features downstream of it.

use std::collections::{BTreeSet, HashMap, HashSet};

use modeling_ops::KernelBundle;
use topo_naming::{parse_name, ROOT_DOCUMENT};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::document::{Feature, Model};
use crate::expr;
use crate::filters::FilterRegistry;
use crate::kinds::{ExecContext, KindRegistry};
use crate::resolve::{ModelView, Scope};
use crate::results::FeatureOutput;
use crate::types::{FeatureError, FeatureId, FeatureStatus};

/// Outputs and statuses of the last recompute.
#[derive(Debug, Clone, Default)]
pub struct RebuildState {
    pub outputs: HashMap<FeatureId, FeatureOutput>,
    pub status: HashMap<FeatureId, FeatureStatus>,
    /// Features each feature consulted during its last execution.
    pub recorded: HashMap<FeatureId, BTreeSet<FeatureId>>,
}

/// Features that must be executed in the next pass.
#[derive(Debug, Clone, Default)]
pub struct Dirty {
    pub features: HashSet<FeatureId>,
    /// Recompute everything (structural edits, load, activation).
    pub all: bool,
}

impl Dirty {
    pub fn mark(&mut self, id: FeatureId) {
        self.features.insert(id);
    }

    pub fn mark_all(&mut self) {
        self.all = true;
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.features.is_empty()
    }

    pub fn clear(&mut self) {
        self.features.clear();
        self.all = false;
    }
}

/// A feature named by the attributes of another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub doc: usize,
    pub index: usize,
    /// Identifier or variable that names it.
    pub identifier: String,
}

/// Every feature the attributes of `feature` (in document `doc`) refer to,
/// through selection names or expression variables.
pub fn references(model: &Model, doc: usize, position: usize, feature: &Feature) -> Vec<Reference> {
    let mut out: Vec<Reference> = Vec::new();
    let mut push = |r: Reference| {
        if !out.contains(&r) {
            out.push(r);
        }
    };
    for (_, value) in feature.attributes.iter() {
        for name in value.selection_names() {
            let Ok(parsed) = parse_name(name) else {
                continue;
            };
            for (document, ident) in parsed.contexts() {
                let target = match document.as_deref() {
                    Some(ROOT_DOCUMENT) => 0,
                    Some(other) => model.document_index(other).unwrap_or(doc),
                    None => doc,
                };
                let found = model.documents[target]
                    .owner_of_identifier(&ident)
                    .map(|(index, _)| (target, index))
                    .or_else(|| {
                        // Part documents also see the part set.
                        (target != 0)
                            .then(|| model.root().owner_of_identifier(&ident))
                            .flatten()
                            .map(|(index, _)| (0, index))
                    });
                if let Some((doc, index)) = found {
                    push(Reference {
                        doc,
                        index,
                        identifier: ident,
                    });
                }
            }
        }
        for expression in value.expressions() {
            let Ok(variables) = expr::variables(expression) else {
                continue;
            };
            for variable in variables {
                let document = &model.documents[doc];
                let found = document
                    .parameter_before(position, &variable)
                    .or_else(|| document.parameter_before(document.features.len(), &variable))
                    .map(|(index, _)| (doc, index))
                    .or_else(|| {
                        (doc != 0)
                            .then(|| model.root().parameter_before(model.root().features.len(), &variable))
                            .flatten()
                            .map(|(index, _)| (0, index))
                    });
                if let Some((doc, index)) = found {
                    push(Reference {
                        doc,
                        index,
                        identifier: variable,
                    });
                }
            }
        }
    }
    out
}

/// First reference of `feature` (at `position` in `doc`) to itself or to a
/// feature that is not before it.
pub fn forward_reference(model: &Model, doc: usize, position: usize, feature: &Feature) -> Option<Reference> {
    let limit = |target: usize| -> usize {
        if target == doc {
            position
        } else if target == 0 {
            model.owner_of(doc).map_or(0, |(index, _)| index)
        } else {
            0
        }
    };
    references(model, doc, position, feature)
        .into_iter()
        .find(|r| r.index >= limit(r.doc))
}

/// Everything the scheduler reads besides the kernel and the state.
pub struct RebuildInputs<'a> {
    pub model: &'a Model,
    pub registry: &'a KindRegistry,
    pub filters: &'a FilterRegistry,
    pub config: &'a EngineConfig,
    pub active_parts: &'a BTreeSet<String>,
}

/// Counts from one recompute pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Run one recompute pass.
pub fn rebuild(
    inputs: &RebuildInputs<'_>,
    kernel: &mut dyn KernelBundle,
    state: &mut RebuildState,
    dirty: &Dirty,
) -> RebuildSummary {
    let model = inputs.model;
    let order = model.order();
    let live: HashSet<FeatureId> = order
        .iter()
        .map(|&(d, i)| model.documents[d].features[i].id)
        .collect();
    state.outputs.retain(|id, _| live.contains(id));
    state.status.retain(|id, _| live.contains(id));
    state.recorded.retain(|id, _| live.contains(id));

    let mut changed: HashSet<FeatureId> = HashSet::new();
    let mut summary = RebuildSummary::default();

    for (doc, index) in order {
        let document = &model.documents[doc];
        let feature = &document.features[index];
        let declared: Vec<FeatureId> = references(model, doc, index, feature)
            .into_iter()
            .map(|r| model.documents[r.doc].features[r.index].id)
            .filter(|id| *id != feature.id)
            .collect();

        let previous = state.status.get(&feature.id).cloned();
        let needs_run = dirty.all
            || dirty.features.contains(&feature.id)
            || matches!(previous, None | Some(FeatureStatus::NotComputed))
            || declared.iter().any(|d| changed.contains(d))
            || state
                .recorded
                .get(&feature.id)
                .is_some_and(|deps| deps.iter().any(|d| changed.contains(d)));
        if !needs_run {
            continue;
        }

        let part_active = doc == 0 || inputs.active_parts.contains(&document.name);
        let enabled = document.is_enabled(index)
            && (doc == 0
                || model
                    .owner_of(doc)
                    .is_some_and(|(owner, _)| model.root().is_enabled(owner)));

        let status = if !part_active {
            state.outputs.remove(&feature.id);
            FeatureStatus::NotComputed
        } else if !enabled {
            state.outputs.remove(&feature.id);
            FeatureStatus::Disabled
        } else if let Some(failed) = declared
            .iter()
            .find(|d| matches!(state.status.get(d), Some(FeatureStatus::Error(_))))
        {
            state.outputs.remove(&feature.id);
            let upstream = model
                .feature(*failed)
                .map(|f| f.name.clone())
                .unwrap_or_default();
            let error = FeatureError::UpstreamFailed { feature: upstream };
            warn!(feature = %feature.name, %error, "feature not computed");
            summary.failed += 1;
            FeatureStatus::Error(error.to_string())
        } else {
            summary.executed += 1;
            match execute(inputs, kernel, state, doc, index, feature) {
                Ok(output) => {
                    state.outputs.insert(feature.id, output);
                    FeatureStatus::Valid
                }
                Err(error) => {
                    warn!(feature = %feature.name, %error, "feature failed");
                    state.outputs.remove(&feature.id);
                    summary.failed += 1;
                    FeatureStatus::Error(error.to_string())
                }
            }
        };

        let reran = status.is_valid();
        if reran || previous.as_ref() != Some(&status) {
            changed.insert(feature.id);
        }
        state.status.insert(feature.id, status);
    }
    debug!(executed = summary.executed, failed = summary.failed, "recompute finished");
    summary
}

fn execute(
    inputs: &RebuildInputs<'_>,
    kernel: &mut dyn KernelBundle,
    state: &mut RebuildState,
    doc: usize,
    index: usize,
    feature: &Feature,
) -> Result<FeatureOutput, FeatureError> {
    let kind = inputs
        .registry
        .get(&feature.kind)
        .ok_or_else(|| FeatureError::Invalid {
            reason: format!("unknown feature kind {}", feature.kind),
        })?;
    kind.validate(&feature.attributes)?;
    debug!(feature = %feature.name, kind = %feature.kind, "executing");

    let view = ModelView {
        model: inputs.model,
        outputs: &state.outputs,
        status: &state.status,
        active_parts: inputs.active_parts,
        registry: inputs.registry,
    };
    let scope = Scope {
        doc,
        position: index,
    };
    let mut ctx = ExecContext::new(feature, scope, &view, kernel, inputs.config, inputs.filters);
    let result = kind.execute(&mut ctx);
    let (dependencies, warnings) = ctx.finish();
    state.recorded.insert(feature.id, dependencies);

    let mut output = result?;
    for warning in warnings {
        if !output.warnings.contains(&warning) {
            output.warnings.push(warning);
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttrValue, AttributeStore, SelectionList};
    use crate::document::Document;
    use shape_types::{Selection, ShapeType};

    fn add(doc: &mut Document, kind: &str, attrs: AttributeStore) -> FeatureId {
        let name = doc.next_name(kind);
        let feature = Feature::new(kind, name, attrs);
        let id = feature.id;
        doc.insert_feature(feature);
        id
    }

    fn parameter(variable: &str, expression: &str) -> AttributeStore {
        let mut attrs = AttributeStore::new();
        attrs.set("variable", AttrValue::Text(variable.into()));
        attrs.set("expression", AttrValue::Scalar(expression.into()));
        attrs
    }

    #[test]
    fn references_follow_names_and_variables() {
        let mut doc = Document::new("Part_1");
        add(&mut doc, "Parameter", parameter("h", "10"));
        add(&mut doc, "Box", AttributeStore::new());
        let mut attrs = AttributeStore::new();
        attrs.set(
            "base",
            AttrValue::SelectionList(SelectionList::new(
                ShapeType::Face,
                vec![Selection::new(ShapeType::Face, "Box_1_1/Top")],
            )),
        );
        attrs.set("size", AttrValue::Scalar("2 * h".into()));
        add(&mut doc, "Extrusion", attrs);
        let model = Model::new(doc);
        let refs = references(&model, 0, 2, &model.root().features[2]);
        let found: Vec<(usize, &str)> = refs.iter().map(|r| (r.index, r.identifier.as_str())).collect();
        assert_eq!(found, vec![(1, "Box_1_1"), (0, "h")]);
        assert!(forward_reference(&model, 0, 2, &model.root().features[2]).is_none());
    }

    #[test]
    fn later_and_self_references_are_forward() {
        let mut doc = Document::new("Part_1");
        let mut attrs = AttributeStore::new();
        attrs.set("size", AttrValue::Scalar("w".into()));
        add(&mut doc, "Box", attrs);
        add(&mut doc, "Parameter", parameter("w", "3"));
        let model = Model::new(doc);
        let forward = forward_reference(&model, 0, 0, &model.root().features[0]).unwrap();
        assert_eq!(forward.identifier, "w");
        assert_eq!(forward.index, 1);

        let mut doc = Document::new("Part_1");
        let mut attrs = AttributeStore::new();
        attrs.set("edge", AttrValue::Selection(Selection::new(ShapeType::Edge, "Axis_1")));
        add(&mut doc, "Axis", attrs);
        let model = Model::new(doc);
        assert!(forward_reference(&model, 0, 0, &model.root().features[0]).is_some());
    }

    #[test]
    fn part_features_see_earlier_part_set_features() {
        let mut root = Document::new("PartSet");
        add(&mut root, "Plane", AttributeStore::new());
        let mut part = Feature::new("Part", "Part_1", AttributeStore::new());
        part.document = Some("Part_1".into());
        root.insert_feature(part);
        add(&mut root, "Plane", AttributeStore::new());
        let mut model = Model::new(root);

        let mut doc = Document::new("Part_1");
        let mut attrs = AttributeStore::new();
        attrs.set("plane", AttrValue::Selection(Selection::new(ShapeType::Face, "PartSet/Plane_1")));
        add(&mut doc, "Sketch", attrs);
        let mut attrs = AttributeStore::new();
        attrs.set("plane", AttrValue::Selection(Selection::new(ShapeType::Face, "PartSet/Plane_2")));
        add(&mut doc, "Sketch", attrs);
        model.documents.push(doc);

        let part = &model.documents[1];
        assert!(forward_reference(&model, 1, 0, &part.features[0]).is_none());
        let forward = forward_reference(&model, 1, 1, &part.features[1]).unwrap();
        assert_eq!((forward.doc, forward.index), (0, 2));
    }
}
