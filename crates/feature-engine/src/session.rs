//! The explicit registry of open documents and the only writer of the model.
//!
//! Every edit happens inside an operation bracket. Nested brackets flatten
//! into the outermost one; finishing the outermost bracket recomputes and
//! records one undo step.

use std::collections::BTreeSet;

use geom_kernel::{KernelIntrospect, MockKernel, ShapeType};
use modeling_ops::KernelBundle;
use shape_types::{Color, Selection};
use tracing::{debug, info, warn};

use crate::attributes::{AttrValue, AttributeStore};
use crate::config::EngineConfig;
use crate::document::{Document, Feature, Model, ResultMeta, SubShapeColor};
use crate::filters::{Filter, FilterRegistry};
use crate::kinds::{FeatureKind, KindRegistry};
use crate::rebuild::{forward_reference, rebuild, references, Dirty, RebuildInputs, RebuildState, RebuildSummary};
use crate::resolve::{ModelView, ResolvedShape};
use crate::results::{FeatureOutput, GroupMember, ResultEntry};
use crate::types::{EngineError, FeatureId, FeatureStatus, Unresolved};
use crate::undo::{Snapshot, UndoStack};
use topo_naming::ROOT_DOCUMENT;

/// Attribute holding the members of a group.
pub const GROUP_LIST: &str = "group_list";

struct OpenOperation {
    name: String,
    depth: usize,
    snapshot: Model,
}

/// A modelling session: the documents, their last recompute, and the history.
pub struct Session {
    config: EngineConfig,
    kernel: Box<dyn KernelBundle>,
    registry: KindRegistry,
    filters: FilterRegistry,
    model: Model,
    state: RebuildState,
    dirty: Dirty,
    active_parts: BTreeSet<String>,
    history: UndoStack,
    operation: Option<OpenOperation>,
    warnings: Vec<String>,
}

impl Session {
    /// A session with an empty part set, seeded with the standard
    /// construction features when the config asks for it.
    pub fn new(config: EngineConfig, kernel: Box<dyn KernelBundle>) -> Self {
        let model = Model::new(part_set(&config));
        Self::from_model(config, kernel, model)
    }

    /// A session over the deterministic mock kernel.
    pub fn with_mock(config: EngineConfig) -> Self {
        Self::new(config, Box::new(MockKernel::new()))
    }

    /// A session over an existing model (a loaded file). Parts start inactive.
    pub fn from_model(config: EngineConfig, kernel: Box<dyn KernelBundle>, model: Model) -> Self {
        let history = UndoStack::new(config.undo_limit);
        let mut session = Self {
            config,
            kernel,
            registry: KindRegistry::with_builtins(),
            filters: FilterRegistry::with_builtins(),
            model,
            state: RebuildState::default(),
            dirty: Dirty::default(),
            active_parts: BTreeSet::new(),
            history,
            operation: None,
            warnings: Vec::new(),
        };
        session.dirty.mark_all();
        session.flush();
        session
    }

    /// Register an additional feature kind.
    pub fn register_kind(&mut self, kind: Box<dyn FeatureKind>) {
        self.registry.register(kind);
    }

    /// Register an additional filter.
    pub fn register_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.register(filter);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn kernel(&self) -> &dyn KernelIntrospect {
        self.kernel.as_introspect()
    }

    /// Drop every document and start over with a fresh part set.
    pub fn close_all(&mut self) {
        info!("closing all documents");
        self.model = Model::new(part_set(&self.config));
        self.state = RebuildState::default();
        self.active_parts.clear();
        self.history.clear();
        self.operation = None;
        self.warnings.clear();
        self.dirty.mark_all();
        self.flush();
    }

    // ── Operations ──────────────────────────────────────────────────────

    pub fn start_operation(&mut self, name: &str) {
        match &mut self.operation {
            Some(open) => open.depth += 1,
            None => {
                info!(operation = name, "operation started");
                self.warnings.clear();
                self.operation = Some(OpenOperation {
                    name: name.to_string(),
                    depth: 1,
                    snapshot: self.model.clone(),
                });
            }
        }
    }

    /// Close the innermost bracket; the outermost one recomputes and records an undo step.
    pub fn finish_operation(&mut self) -> Result<RebuildSummary, EngineError> {
        let open = self.operation.as_mut().ok_or(EngineError::NoOpenOperation)?;
        open.depth -= 1;
        if open.depth > 0 {
            return Ok(RebuildSummary::default());
        }
        let Some(open) = self.operation.take() else {
            return Err(EngineError::NoOpenOperation);
        };
        let summary = self.flush();
        if open.snapshot != self.model {
            self.history.push(Snapshot {
                name: open.name.clone(),
                model: open.snapshot,
            });
        }
        info!(operation = %open.name, executed = summary.executed, failed = summary.failed, "operation finished");
        Ok(summary)
    }

    /// Discard every change made since the outermost `start_operation`.
    pub fn abort_operation(&mut self) -> Result<(), EngineError> {
        let open = self.operation.take().ok_or(EngineError::NoOpenOperation)?;
        info!(operation = %open.name, "operation aborted");
        self.model = open.snapshot;
        self.refresh();
        Ok(())
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        self.ensure_closed()?;
        let snapshot = self.history.pop_undo().ok_or(EngineError::NothingToUndo)?;
        info!(operation = %snapshot.name, "undo");
        let current = std::mem::replace(&mut self.model, snapshot.model);
        self.history.push_redo(Snapshot {
            name: snapshot.name,
            model: current,
        });
        self.refresh();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EngineError> {
        self.ensure_closed()?;
        let snapshot = self.history.pop_redo().ok_or(EngineError::NothingToRedo)?;
        info!(operation = %snapshot.name, "redo");
        let current = std::mem::replace(&mut self.model, snapshot.model);
        self.history.push_undo_only(Snapshot {
            name: snapshot.name,
            model: current,
        });
        self.refresh();
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_operation_open(&self) -> bool {
        self.operation.is_some()
    }

    /// Recompute everything edited since the last recompute.
    pub fn flush(&mut self) -> RebuildSummary {
        if self.dirty.is_empty() {
            return RebuildSummary::default();
        }
        let inputs = RebuildInputs {
            model: &self.model,
            registry: &self.registry,
            filters: &self.filters,
            config: &self.config,
            active_parts: &self.active_parts,
        };
        let summary = rebuild(&inputs, self.kernel.as_mut(), &mut self.state, &self.dirty);
        self.dirty.clear();
        summary
    }

    /// Re-execute every feature.
    pub fn recompute_all(&mut self) -> RebuildSummary {
        self.dirty.mark_all();
        self.flush()
    }

    /// Warnings raised by edits of the current (or last) operation.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Recompute everything after the model was replaced wholesale.
    fn refresh(&mut self) {
        self.dirty.mark_all();
        self.flush();
    }

    fn ensure_closed(&self) -> Result<(), EngineError> {
        match &self.operation {
            Some(open) => Err(EngineError::OperationOpen {
                name: open.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.operation.is_none() {
            return Err(EngineError::NoOpenOperation);
        }
        Ok(())
    }

    // ── Documents ───────────────────────────────────────────────────────

    /// Add a part to the part set and activate it. Returns the `Part` feature.
    pub fn add_part(&mut self) -> Result<FeatureId, EngineError> {
        self.ensure_open()?;
        let root = &mut self.model.documents[0];
        let name = root.next_name("Part");
        let mut feature = Feature::new("Part", name.clone(), AttributeStore::new());
        feature.document = Some(name.clone());
        let id = feature.id;
        root.insert_feature(feature);
        self.model.documents.push(Document::new(name.clone()));
        self.active_parts.insert(name.clone());
        self.dirty.mark(id);
        debug!(part = %name, "part added");
        Ok(id)
    }

    /// Activate or deactivate a part and recompute.
    pub fn activate(&mut self, part: &str, active: bool) -> Result<(), EngineError> {
        let doc = self
            .model
            .document_index(part)
            .filter(|d| *d != 0)
            .ok_or_else(|| EngineError::DocumentNotFound { name: part.into() })?;
        let changed = if active {
            self.active_parts.insert(self.model.documents[doc].name.clone())
        } else {
            self.active_parts.remove(part)
        };
        if changed {
            info!(part, active, "part activation changed");
            self.dirty.mark_all();
            if self.operation.is_none() {
                self.flush();
            }
        }
        Ok(())
    }

    pub fn is_active(&self, part: &str) -> bool {
        part == ROOT_DOCUMENT || self.active_parts.contains(part)
    }

    // ── Editing ─────────────────────────────────────────────────────────

    /// Create a feature of `kind` in document `doc` after its current feature.
    pub fn add_feature(&mut self, doc: &str, kind: &str, attrs: AttributeStore) -> Result<FeatureId, EngineError> {
        self.ensure_open()?;
        if kind == "Part" {
            return self.add_part();
        }
        let doc_index = self
            .model
            .document_index(doc)
            .ok_or_else(|| EngineError::DocumentNotFound { name: doc.into() })?;
        let feature_kind = self
            .registry
            .get(kind)
            .ok_or_else(|| EngineError::UnknownKind { kind: kind.into() })?;

        let mut attributes = AttributeStore::new();
        let mut notes = Vec::new();
        for (name, value) in attrs.iter() {
            let mut value = value.clone();
            check_attribute(feature_kind, name, &value)?;
            notes.extend(feature_kind.on_attribute_set(name, &mut value));
            attributes.set(name.clone(), value);
        }

        let document = &self.model.documents[doc_index];
        let position = document.insertion_point();
        let feature = Feature::new(kind, document.peek_name(kind), attributes);
        if let Some(forward) = forward_reference(&self.model, doc_index, position, &feature) {
            return Err(EngineError::ForwardReference {
                feature: feature.name,
                referenced: forward.identifier,
            });
        }

        let document = &mut self.model.documents[doc_index];
        document.next_name(kind);
        let id = feature.id;
        debug!(feature = %feature.name, document = doc, "feature added");
        document.insert_feature(feature);
        self.warnings.extend(notes);
        self.dirty.mark(id);
        Ok(id)
    }

    /// Assign one attribute of a feature.
    pub fn set_attribute(&mut self, id: FeatureId, name: &str, value: AttrValue) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (doc, index) = self.model.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        let feature = &self.model.documents[doc].features[index];
        let kind = self
            .registry
            .get(&feature.kind)
            .ok_or_else(|| EngineError::UnknownKind {
                kind: feature.kind.clone(),
            })?;
        let mut value = value;
        check_attribute(kind, name, &value)?;
        let note = kind.on_attribute_set(name, &mut value);

        let mut edited = feature.clone();
        edited.attributes.set(name, value);
        if let Some(forward) = forward_reference(&self.model, doc, index, &edited) {
            return Err(EngineError::ForwardReference {
                feature: edited.name,
                referenced: forward.identifier,
            });
        }
        self.model.documents[doc].features[index] = edited;
        self.warnings.extend(note);
        self.dirty.mark(id);
        Ok(())
    }

    /// Move a feature right after `after`, or to the top with `None`.
    ///
    /// Always accepted: selections are re-resolved at the new position and
    /// fail there if what they name is no longer visible.
    pub fn move_feature(&mut self, id: FeatureId, after: Option<FeatureId>) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (doc, old) = self.model.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        let new_pos = match after {
            None => 0,
            Some(a) if a == id => {
                return Err(EngineError::InvalidMove {
                    reason: "a feature cannot follow itself".into(),
                })
            }
            Some(a) => {
                let (a_doc, a_index) = self.model.locate(a).ok_or(EngineError::FeatureNotFound { id: a })?;
                if a_doc != doc {
                    return Err(EngineError::InvalidMove {
                        reason: "features can only move within their document".into(),
                    });
                }
                if a_index < old {
                    a_index + 1
                } else {
                    a_index
                }
            }
        };
        self.model.documents[doc].reorder_feature(id, new_pos)?;
        debug!(%id, from = old, to = new_pos, "feature moved");
        self.dirty.mark_all();
        Ok(())
    }

    /// Remove a feature that nothing references. Removing a part removes its document.
    pub fn remove_feature(&mut self, id: FeatureId) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (doc, index) = self.model.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        let mut dependents = Vec::new();
        for (d, document) in self.model.documents.iter().enumerate() {
            for (i, feature) in document.features.iter().enumerate() {
                if feature.id == id {
                    continue;
                }
                if references(&self.model, d, i, feature)
                    .iter()
                    .any(|r| r.doc == doc && r.index == index)
                {
                    dependents.push(feature.name.clone());
                }
            }
        }
        let feature = &self.model.documents[doc].features[index];
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents {
                feature: feature.name.clone(),
                dependents,
            });
        }
        let removed = self.model.documents[doc].remove_feature(id)?;
        if let Some(part) = removed.document {
            self.model.documents.retain(|d| d.name != part);
        }
        debug!(feature = %removed.name, "feature removed");
        self.dirty.mark_all();
        Ok(())
    }

    /// Rename a feature and rewrite every selection that mentions its results.
    pub fn rename_feature(&mut self, id: FeatureId, new_name: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (doc, index) = self.model.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        let old_name = self.model.documents[doc].features[index].name.clone();
        if old_name == new_name {
            return Ok(());
        }
        if self.model.documents[doc].feature_by_name(new_name).is_some() {
            return Err(EngineError::DuplicateName {
                name: new_name.into(),
            });
        }
        let rewrite = |name: &str| rename_identifier(name, &old_name, new_name);
        for document in &mut self.model.documents {
            for feature in &mut document.features {
                for value in feature.attributes.values_mut() {
                    value.rewrite_names(&rewrite);
                }
            }
            for meta in document.metadata.values_mut() {
                for sub in &mut meta.sub_colors {
                    if !sub.selection.is_empty() {
                        sub.selection.name = rewrite(&sub.selection.name);
                    }
                }
            }
        }
        let document = &mut self.model.documents[doc];
        document.metadata = std::mem::take(&mut document.metadata)
            .into_iter()
            .map(|(key, meta)| (rewrite(&key), meta))
            .collect();
        let feature = &mut document.features[index];
        feature.name = new_name.to_string();
        if let Some(part) = feature.document.as_mut() {
            // A part and its document share a name.
            let old_part = std::mem::replace(part, new_name.to_string());
            if let Some(d) = self.model.documents.iter_mut().find(|d| d.name == old_part) {
                d.name = new_name.to_string();
            }
            if self.active_parts.remove(&old_part) {
                self.active_parts.insert(new_name.to_string());
            }
        }
        debug!(from = %old_name, to = new_name, "feature renamed");
        self.dirty.mark_all();
        Ok(())
    }

    pub fn set_suppressed(&mut self, id: FeatureId, suppressed: bool) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (doc, _) = self.model.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        self.model.documents[doc].set_suppressed(id, suppressed)?;
        self.dirty.mark_all();
        Ok(())
    }

    /// Roll the history of `doc` back to `current`; `None` enables every feature.
    pub fn set_current(&mut self, doc: &str, current: Option<FeatureId>) -> Result<(), EngineError> {
        self.ensure_open()?;
        let document = self.model.document_mut(doc)?;
        if let Some(id) = current {
            if document.feature_index(id).is_none() {
                return Err(EngineError::FeatureNotFound { id });
            }
        }
        document.current = current;
        self.dirty.mark_all();
        Ok(())
    }

    pub fn set_in_history(&mut self, id: FeatureId, in_history: bool) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.model.feature_mut(id)?.in_history = in_history;
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────

    fn view(&self) -> ModelView<'_> {
        ModelView {
            model: &self.model,
            outputs: &self.state.outputs,
            status: &self.state.status,
            active_parts: &self.active_parts,
            registry: &self.registry,
        }
    }

    fn doc_index(&self, doc: &str) -> Result<usize, EngineError> {
        self.model
            .document_index(doc)
            .ok_or_else(|| EngineError::DocumentNotFound { name: doc.into() })
    }

    pub fn feature(&self, id: FeatureId) -> Result<&Feature, EngineError> {
        self.model.feature(id)
    }

    pub fn feature_id(&self, doc: &str, name: &str) -> Result<FeatureId, EngineError> {
        self.model
            .document(doc)?
            .feature_by_name(name)
            .map(|f| f.id)
            .ok_or_else(|| EngineError::FeatureNameNotFound {
                document: doc.into(),
                name: name.into(),
            })
    }

    pub fn status(&self, id: FeatureId) -> FeatureStatus {
        self.state.status.get(&id).cloned().unwrap_or_default()
    }

    /// Diagnostic text of a feature; empty when it is valid.
    pub fn error(&self, id: FeatureId) -> String {
        self.status(id).message().to_string()
    }

    pub fn validate(&self, id: FeatureId) -> bool {
        self.status(id).is_valid()
    }

    pub fn output(&self, id: FeatureId) -> Option<&FeatureOutput> {
        self.state.outputs.get(&id)
    }

    /// Top-level results of a feature.
    pub fn results(&self, id: FeatureId) -> &[ResultEntry] {
        self.output(id).map_or(&[], |o| o.results.as_slice())
    }

    /// The latest result (at any depth) named `name` in document `doc`.
    pub fn result(&self, doc: &str, name: &str) -> Result<&ResultEntry, EngineError> {
        self.model
            .document(doc)?
            .features
            .iter()
            .rev()
            .find_map(|f| self.output(f.id).and_then(|o| o.find(name)))
            .ok_or_else(|| EngineError::ResultNotFound { name: name.into() })
    }

    /// Names of the top-level results of `doc` that no later feature consumed.
    pub fn visible_results(&self, doc: &str) -> Result<Vec<String>, EngineError> {
        let d = self.doc_index(doc)?;
        let view = self.view();
        Ok(view
            .visible_results(view.end_of(d))
            .into_iter()
            .filter(|h| !view.is_construction(h.feature))
            .map(|h| h.entry.name.clone())
            .collect())
    }

    /// Resolve a selection as seen from the end of document `doc`; exactly one shape.
    pub fn resolve(&self, doc: &str, selection: &Selection) -> Result<ResolvedShape, EngineError> {
        let mut shapes = self.resolve_inner(doc, selection, false)?;
        shapes.pop().ok_or_else(|| {
            EngineError::Unresolved(Unresolved {
                name: selection.name.clone(),
                requested_by: doc.into(),
                reason: crate::types::UnresolvedReason::Orphaned,
            })
        })
    }

    /// Resolve a selection that may name several shapes.
    pub fn resolve_all(&self, doc: &str, selection: &Selection) -> Result<Vec<ResolvedShape>, EngineError> {
        self.resolve_inner(doc, selection, true)
    }

    fn resolve_inner(&self, doc: &str, selection: &Selection, allow_many: bool) -> Result<Vec<ResolvedShape>, EngineError> {
        let d = self.doc_index(doc)?;
        let view = self.view();
        let resolution = view.resolve(self.kernel(), view.end_of(d), selection, doc, allow_many)?;
        Ok(resolution.shapes)
    }

    fn group_output(&self, id: FeatureId) -> Result<&FeatureOutput, EngineError> {
        let feature = self.model.feature(id)?;
        if feature.kind != "Group" {
            return Err(EngineError::WrongKind {
                feature: feature.name.clone(),
                expected: "Group",
            });
        }
        self.output(id).ok_or_else(|| EngineError::ResultNotFound {
            name: feature.name.clone(),
        })
    }

    /// Members of a group from the last recompute.
    pub fn group_members(&self, id: FeatureId) -> Result<&[GroupMember], EngineError> {
        Ok(&self.group_output(id)?.members)
    }

    pub fn group_size(&self, id: FeatureId) -> Result<usize, EngineError> {
        Ok(self.group_members(id)?.len())
    }

    /// Declared filter names of a group, in order.
    pub fn group_filters(&self, id: FeatureId) -> Result<Vec<String>, EngineError> {
        let feature = self.model.feature(id)?;
        Ok(feature
            .attributes
            .selection_list(GROUP_LIST)
            .map(|list| list.filters.names().into_iter().map(String::from).collect())
            .unwrap_or_default())
    }

    /// Selection arguments of the group filter `filter`.
    pub fn group_filter_selections(&self, id: FeatureId, filter: &str) -> Result<Vec<Selection>, EngineError> {
        let feature = self.model.feature(id)?;
        Ok(feature
            .attributes
            .selection_list(GROUP_LIST)
            .and_then(|list| list.filters.args_of(filter))
            .map(|args| args.iter().flat_map(|a| a.selections()).cloned().collect())
            .unwrap_or_default())
    }

    /// Filters of a group skipped in the last recompute because an argument resolved to nothing.
    pub fn dropped_filters(&self, id: FeatureId) -> Result<&[String], EngineError> {
        Ok(&self.group_output(id)?.dropped_filters)
    }

    // ── Measurements ────────────────────────────────────────────────────

    pub fn volume(&self, doc: &str, result: &str) -> Result<f64, EngineError> {
        let entry = self.result(doc, result)?;
        Ok(self.kernel().volume(entry.shape)?)
    }

    pub fn area(&self, doc: &str, result: &str) -> Result<f64, EngineError> {
        let entry = self.result(doc, result)?;
        Ok(self.kernel().area(entry.shape)?)
    }

    pub fn sub_shape_count(&self, doc: &str, result: &str, shape_type: ShapeType) -> Result<usize, EngineError> {
        let entry = self.result(doc, result)?;
        Ok(self.kernel().sub_shapes(entry.shape, shape_type)?.len())
    }

    // ── Result metadata ─────────────────────────────────────────────────

    fn meta_mut(&mut self, doc: &str, result: &str) -> Result<&mut ResultMeta, EngineError> {
        self.ensure_open()?;
        self.result(doc, result)?;
        Ok(self
            .model
            .document_mut(doc)?
            .metadata
            .entry(result.to_string())
            .or_default())
    }

    pub fn set_result_color(&mut self, doc: &str, result: &str, color: Color) -> Result<(), EngineError> {
        self.meta_mut(doc, result)?.color = Some(color);
        Ok(())
    }

    pub fn set_transparency(&mut self, doc: &str, result: &str, transparency: f64) -> Result<(), EngineError> {
        self.meta_mut(doc, result)?.transparency = Some(transparency.clamp(0.0, 1.0));
        Ok(())
    }

    pub fn set_display_name(&mut self, doc: &str, result: &str, display_name: &str) -> Result<(), EngineError> {
        self.meta_mut(doc, result)?.display_name = Some(display_name.to_string());
        Ok(())
    }

    /// Colour one sub-shape of `result`; the selection must resolve now.
    pub fn set_sub_shape_color(
        &mut self,
        doc: &str,
        result: &str,
        selection: Selection,
        color: Color,
    ) -> Result<(), EngineError> {
        self.resolve(doc, &selection)?;
        let meta = self.meta_mut(doc, result)?;
        meta.sub_colors.retain(|s| s.selection != selection);
        meta.sub_colors.push(SubShapeColor { selection, color });
        Ok(())
    }

    pub fn result_meta(&self, doc: &str, result: &str) -> Option<&ResultMeta> {
        self.model.document(doc).ok()?.metadata.get(result)
    }

    /// Colour of a result, inherited from the result it re-exposes when it has none.
    pub fn result_color(&self, doc: &str, result: &str) -> Option<Color> {
        let mut name = result.to_string();
        for _ in 0..16 {
            if let Some(color) = self.result_meta(doc, &name).and_then(|m| m.color) {
                return Some(color);
            }
            name = self.result(doc, &name).ok()?.source.clone()?;
        }
        None
    }

    /// Colour stored for the sub-shape `selection` resolves to, if any.
    pub fn sub_shape_color(&self, doc: &str, selection: &Selection) -> Option<Color> {
        let target = match self.resolve(doc, selection) {
            Ok(shape) => shape,
            Err(error) => {
                warn!(%error, "sub-shape colour lookup failed");
                return None;
            }
        };
        let document = self.model.document(doc).ok()?;
        for meta in document.metadata.values() {
            for sub in &meta.sub_colors {
                if self
                    .resolve(doc, &sub.selection)
                    .is_ok_and(|s| s.shape == target.shape)
                {
                    return Some(sub.color);
                }
            }
        }
        None
    }
}

/// Standard part set contents.
fn part_set(config: &EngineConfig) -> Document {
    let mut root = Document::new(ROOT_DOCUMENT);
    if !config.seed_constructions {
        return root;
    }
    let scalar = |pairs: &[(&str, f64)]| {
        let mut attrs = AttributeStore::new();
        for (name, value) in pairs {
            attrs.set(*name, AttrValue::scalar(value));
        }
        attrs
    };
    let seeds = [
        ("Point", "Origin", scalar(&[("x", 0.0), ("y", 0.0), ("z", 0.0)])),
        ("Axis", "OX", scalar(&[("dx", 1.0)])),
        ("Axis", "OY", scalar(&[("dy", 1.0)])),
        ("Axis", "OZ", scalar(&[("dz", 1.0)])),
        ("Plane", "YOZ", scalar(&[("nx", 1.0), ("nz", 0.0)])),
        ("Plane", "XOZ", scalar(&[("ny", 1.0), ("nz", 0.0)])),
        ("Plane", "XOY", scalar(&[("nz", 1.0)])),
    ];
    for (kind, name, attrs) in seeds {
        let mut feature = Feature::new(kind, name, attrs);
        feature.in_history = false;
        root.insert_feature(feature);
    }
    root
}

fn check_attribute(kind: &dyn FeatureKind, name: &str, value: &AttrValue) -> Result<(), EngineError> {
    let spec = kind
        .attributes()
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| EngineError::UnknownAttribute {
            kind: kind.kind().into(),
            attribute: name.into(),
        })?;
    if value.kind() != spec.kind {
        return Err(EngineError::AttributeType {
            attribute: name.into(),
            expected: spec.kind.as_str(),
        });
    }
    Ok(())
}

/// Replace the identifier `old` by `new` wherever it appears as a whole
/// token of a selection name (`Box_1`, `Box_1_2`, `all-in-Box_1`, `[Box_1_1/Top]`),
/// leaving longer identifiers such as `Box_12` alone.
pub fn rename_identifier(name: &str, old: &str, new: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = String::with_capacity(name.len());
    let mut last = 0;
    for (start, _) in name.match_indices(old) {
        if start < last {
            continue;
        }
        let end = start + old.len();
        let before_ok = start == 0 || matches!(bytes[start - 1], b'/' | b'[' | b'&' | b'-');
        let after_ok = match bytes.get(end) {
            None | Some(b'/' | b'&' | b']') => true,
            Some(b'_') => bytes.get(end + 1).is_some_and(u8::is_ascii_digit),
            Some(_) => false,
        };
        if before_ok && after_ok {
            out.push_str(&name[last..start]);
            out.push_str(new);
            last = end;
        }
    }
    out.push_str(&name[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_matches_whole_identifiers_only() {
        assert_eq!(rename_identifier("Box_1_1/Top", "Box_1", "Block"), "Block_1/Top");
        assert_eq!(rename_identifier("Box_12_1/Top", "Box_1", "Block"), "Box_12_1/Top");
        assert_eq!(rename_identifier("all-in-Box_1", "Box_1", "Block"), "all-in-Block");
        assert_eq!(
            rename_identifier("[Box_1_1/Top][Box_1_1/Front]", "Box_1", "Block"),
            "[Block_1/Top][Block_1/Front]"
        );
        assert_eq!(
            rename_identifier("Fuse_1_1/Modified_Face&Box_1_1/Top", "Box_1", "B"),
            "Fuse_1_1/Modified_Face&B_1/Top"
        );
        assert_eq!(rename_identifier("Box_1_1/Box_1", "Box_1", "B"), "B_1/B");
    }

    #[test]
    fn seeded_part_set_has_construction_results() {
        let session = Session::with_mock(EngineConfig::default());
        for name in ["Origin", "OX", "OY", "OZ", "YOZ", "XOZ", "XOY"] {
            let id = session.feature_id(ROOT_DOCUMENT, name).unwrap();
            assert!(session.validate(id), "{name}: {}", session.error(id));
            let entry = session.result(ROOT_DOCUMENT, name).unwrap();
            assert_eq!(entry.table.weak_entries().count(), 0, "{name}");
        }
        let start = Selection::new(ShapeType::Vertex, "OX/Start");
        assert!(session.resolve(ROOT_DOCUMENT, &start).is_ok());
        assert!(!session.can_undo());
    }

    #[test]
    fn edits_need_an_open_operation() {
        let mut session = Session::with_mock(EngineConfig::bare());
        assert!(matches!(session.add_part(), Err(EngineError::NoOpenOperation)));
        assert!(matches!(session.finish_operation(), Err(EngineError::NoOpenOperation)));
    }

    #[test]
    fn nested_operations_flatten_into_one_undo_step() {
        let mut session = Session::with_mock(EngineConfig::bare());
        session.start_operation("outer");
        session.add_part().unwrap();
        session.start_operation("inner");
        assert!(matches!(session.undo(), Err(EngineError::OperationOpen { .. })));
        session.finish_operation().unwrap();
        assert!(session.is_operation_open());
        session.finish_operation().unwrap();
        assert_eq!(session.history.undo_names(), vec!["outer"]);
    }

    #[test]
    fn abort_restores_the_snapshot() {
        let mut session = Session::with_mock(EngineConfig::bare());
        session.start_operation("add");
        session.add_part().unwrap();
        session.abort_operation().unwrap();
        assert_eq!(session.model().documents.len(), 1);
        assert!(!session.can_undo());
    }
}
