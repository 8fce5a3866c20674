//! Selection Resolver: maps stored names to live kernel shapes.
//!
//! A name is first looked up literally in the naming tables of the results
//! visible at the requesting position (latest first). Names whose result has
//! been consumed by a later feature are mapped forward through the kernel
//! history of every consumer until visible shapes are reached.

use std::collections::{BTreeSet, HashMap, HashSet};

use geom_kernel::{KernelIntrospect, ShapeId, ShapeType};
use shape_types::Selection;
use topo_naming::{adjacency, parse_name, NameExpr, ParsedName, ROOT_DOCUMENT};
use tracing::trace;

use crate::document::{Feature, Model};
use crate::kinds::KindRegistry;
use crate::results::{FeatureOutput, ResultEntry};
use crate::types::{FeatureId, FeatureStatus, Unresolved, UnresolvedReason};

/// A position in a document: features before `position` are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub doc: usize,
    pub position: usize,
}

/// A shape found by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedShape {
    pub shape: ShapeId,
    pub shape_type: ShapeType,
    /// Name of the shape in the visible result holding it.
    pub name: String,
    /// Feature owning the visible result.
    pub holder: FeatureId,
    /// Visible result holding the shape.
    pub result: String,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub shapes: Vec<ResolvedShape>,
    /// Features whose results were consulted.
    pub dependencies: BTreeSet<FeatureId>,
}

/// A visible result together with its owner.
#[derive(Debug, Clone, Copy)]
pub struct Holder<'a> {
    pub feature: &'a Feature,
    pub index: usize,
    pub entry: &'a ResultEntry,
}

/// Read-only view of the model and its last recompute.
pub struct ModelView<'a> {
    pub model: &'a Model,
    pub outputs: &'a HashMap<FeatureId, FeatureOutput>,
    pub status: &'a HashMap<FeatureId, FeatureStatus>,
    pub active_parts: &'a BTreeSet<String>,
    pub registry: &'a KindRegistry,
}

impl<'a> ModelView<'a> {
    /// Scope of the part set seen from `scope`: everything before the owning `Part`.
    pub fn root_scope(&self, scope: Scope) -> Scope {
        if scope.doc == 0 {
            return scope;
        }
        match self.model.owner_of(scope.doc) {
            Some((index, _)) => Scope {
                doc: 0,
                position: index,
            },
            None => Scope {
                doc: 0,
                position: 0,
            },
        }
    }

    /// Scope at the end of a document.
    pub fn end_of(&self, doc: usize) -> Scope {
        Scope {
            doc,
            position: self.model.documents.get(doc).map_or(0, |d| d.features.len()),
        }
    }

    pub fn is_active(&self, doc: usize) -> bool {
        doc == 0
            || self
                .model
                .documents
                .get(doc)
                .is_some_and(|d| self.active_parts.contains(&d.name))
    }

    /// Feature at `index` when it computed successfully.
    pub fn computed(&self, doc: usize, index: usize) -> Option<(&'a Feature, &'a FeatureOutput)> {
        let feature = self.model.documents.get(doc)?.features.get(index)?;
        if !self.status.get(&feature.id).is_some_and(FeatureStatus::is_valid) {
            return None;
        }
        self.outputs.get(&feature.id).map(|o| (feature, o))
    }

    pub fn is_construction(&self, feature: &Feature) -> bool {
        self.registry
            .get(&feature.kind)
            .is_some_and(|k| k.is_construction())
    }

    /// Result names consumed by features before the scope position.
    pub fn concealed(&self, scope: Scope) -> HashSet<&'a str> {
        (0..scope.position)
            .filter_map(|i| self.computed(scope.doc, i))
            .flat_map(|(_, o)| o.concealed.iter().map(String::as_str))
            .collect()
    }

    /// Visible leaf results (no sub-results of their own) in feature order.
    pub fn visible_leaves(&self, scope: Scope) -> Vec<Holder<'a>> {
        fn collect<'b>(
            feature: &'b Feature,
            index: usize,
            entry: &'b ResultEntry,
            concealed: &HashSet<&str>,
            out: &mut Vec<Holder<'b>>,
        ) {
            if concealed.contains(entry.name.as_str()) {
                return;
            }
            if entry.parts.is_empty() {
                out.push(Holder {
                    feature,
                    index,
                    entry,
                });
            }
            for part in &entry.parts {
                collect(feature, index, part, concealed, out);
            }
        }
        let concealed = self.concealed(scope);
        let mut out = Vec::new();
        for i in 0..scope.position {
            if let Some((feature, output)) = self.computed(scope.doc, i) {
                for entry in &output.results {
                    collect(feature, i, entry, &concealed, &mut out);
                }
            }
        }
        out
    }

    /// Top-level results that are not concealed, in feature order.
    pub fn visible_results(&self, scope: Scope) -> Vec<Holder<'a>> {
        let concealed = self.concealed(scope);
        let mut out = Vec::new();
        for i in 0..scope.position {
            if let Some((feature, output)) = self.computed(scope.doc, i) {
                for entry in &output.results {
                    if !concealed.contains(entry.name.as_str()) {
                        out.push(Holder {
                            feature,
                            index: i,
                            entry,
                        });
                    }
                }
            }
        }
        out
    }

    /// A result (at any depth) named `name` before the scope position, with its visibility.
    fn find_entry(&self, scope: Scope, name: &str) -> Option<(Holder<'a>, bool)> {
        fn locate<'b>(
            entries: &'b [ResultEntry],
            name: &str,
            concealed: &HashSet<&str>,
            hidden: bool,
        ) -> Option<(&'b ResultEntry, bool)> {
            for entry in entries {
                let hidden = hidden || concealed.contains(entry.name.as_str());
                if entry.name == name {
                    let leaves_visible = entry.parts.is_empty()
                        || entry
                            .walk()
                            .iter()
                            .any(|e| e.parts.is_empty() && !concealed.contains(e.name.as_str()));
                    return Some((entry, !hidden && leaves_visible));
                }
                if let Some(found) = locate(&entry.parts, name, concealed, hidden) {
                    return Some(found);
                }
            }
            None
        }
        let concealed = self.concealed(scope);
        (0..scope.position).rev().find_map(|i| {
            let (feature, output) = self.computed(scope.doc, i)?;
            locate(&output.results, name, &concealed, false).map(|(entry, visible)| {
                (
                    Holder {
                        feature,
                        index: i,
                        entry,
                    },
                    visible,
                )
            })
        })
    }

    /// Feature owning identifier `ident` (a feature or result name), anywhere in the document.
    pub fn owner_of_identifier(&self, doc: usize, ident: &str) -> Option<(usize, &'a Feature)> {
        self.model.documents.get(doc)?.owner_of_identifier(ident)
    }

    /// Value of parameter `variable` visible from `scope`, with its feature.
    pub fn parameter(&self, scope: Scope, variable: &str) -> Option<(FeatureId, f64)> {
        let local = (0..scope.position).rev().find_map(|i| {
            let (feature, output) = self.computed(scope.doc, i)?;
            (feature.kind == "Parameter" && feature.attributes.text("variable") == Some(variable))
                .then_some(())
                .and(output.value.map(|v| (feature.id, v)))
        });
        match local {
            Some(found) => Some(found),
            None if scope.doc != 0 => self.parameter(self.root_scope(scope), variable),
            None => None,
        }
    }

    /// Resolve a selection for the feature named `requester`.
    ///
    /// With `allow_many`, names that map to several shapes (whole results,
    /// split faces) yield all of them; otherwise exactly one shape is required.
    pub fn resolve(
        &self,
        kernel: &dyn KernelIntrospect,
        scope: Scope,
        selection: &Selection,
        requester: &str,
        allow_many: bool,
    ) -> Result<Resolution, Unresolved> {
        let fail = |reason| Unresolved {
            name: selection.name.clone(),
            requested_by: requester.to_string(),
            reason,
        };
        if selection.is_empty() {
            return Err(fail(UnresolvedReason::Empty));
        }
        let parsed = parse_name(&selection.name).map_err(|e| fail(UnresolvedReason::Malformed(e.to_string())))?;
        let mut resolution = Resolution::default();
        let result = self.resolve_parsed(
            kernel,
            scope,
            &selection.name,
            &parsed,
            selection.shape_type,
            allow_many,
            &mut resolution.dependencies,
        );
        let shapes = result.map_err(fail)?;
        trace!(name = %selection.name, count = shapes.len(), "resolved");
        resolution.shapes = shapes;
        Ok(resolution)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_parsed(
        &self,
        kernel: &dyn KernelIntrospect,
        scope: Scope,
        full: &str,
        parsed: &ParsedName,
        shape_type: Option<ShapeType>,
        allow_many: bool,
        deps: &mut BTreeSet<FeatureId>,
    ) -> Result<Vec<ResolvedShape>, UnresolvedReason> {
        let (scope, body) = match parsed.document.as_deref() {
            Some(doc) if doc == ROOT_DOCUMENT => (
                self.root_scope(scope),
                full.strip_prefix(ROOT_DOCUMENT)
                    .and_then(|s| s.strip_prefix('/'))
                    .unwrap_or(full),
            ),
            _ => (scope, full),
        };
        if !self.is_active(scope.doc) {
            return Err(UnresolvedReason::PartDeactivated(
                self.model.documents[scope.doc].name.clone(),
            ));
        }
        match self.resolve_body(kernel, scope, body, &parsed.expr, shape_type, allow_many, deps) {
            // Part documents also see the part set.
            Err(UnresolvedReason::NotFound(_)) if scope.doc != 0 => self.resolve_body(
                kernel,
                self.root_scope(scope),
                body,
                &parsed.expr,
                shape_type,
                allow_many,
                deps,
            ),
            other => other,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_body(
        &self,
        kernel: &dyn KernelIntrospect,
        scope: Scope,
        body: &str,
        expr: &NameExpr,
        shape_type: Option<ShapeType>,
        allow_many: bool,
        deps: &mut BTreeSet<FeatureId>,
    ) -> Result<Vec<ResolvedShape>, UnresolvedReason> {
        let leaves = self.visible_leaves(scope);

        // Literal lookup in visible naming tables, latest first.
        for holder in leaves.iter().rev() {
            if let Some(shape) = holder.entry.table.shape_of(body) {
                deps.insert(holder.feature.id);
                let found = vec![self.resolved(kernel, holder, shape, body.to_string())?];
                return self.typed(kernel, found, shape_type, allow_many, false, &leaves);
            }
        }

        match expr {
            NameExpr::AllIn { feature } => {
                let doc = &self.model.documents[scope.doc];
                let index = doc
                    .features
                    .iter()
                    .position(|f| &f.name == feature)
                    .ok_or_else(|| UnresolvedReason::NotFound(feature.clone()))?;
                if index >= scope.position {
                    return Err(UnresolvedReason::Later(feature.clone()));
                }
                let (owner, output) = self
                    .computed(scope.doc, index)
                    .ok_or_else(|| UnresolvedReason::NotVisible(feature.clone()))?;
                deps.insert(owner.id);
                let mut found = Vec::new();
                for entry in &output.results {
                    found.extend(self.follow(kernel, scope, index, entry, entry.shape, deps)?);
                }
                self.typed(kernel, found, shape_type, true, true, &leaves)
            }
            NameExpr::Context { context } => {
                let (holder, _) = self.entry_or_missing(scope, context)?;
                deps.insert(holder.feature.id);
                let found = self.follow(kernel, scope, holder.index, holder.entry, holder.entry.shape, deps)?;
                self.typed(kernel, found, shape_type, allow_many, true, &leaves)
            }
            NameExpr::Local { context, .. } => {
                let (holder, _) = self.entry_or_missing(scope, context)?;
                deps.insert(holder.feature.id);
                let shape = holder
                    .entry
                    .table
                    .shape_of(body)
                    .ok_or(UnresolvedReason::Orphaned)?;
                let found = self.follow(kernel, scope, holder.index, holder.entry, shape, deps)?;
                self.typed(kernel, found, shape_type, allow_many, false, &leaves)
            }
            NameExpr::Adjacency { items, weak } => {
                let Some(shape_type) = shape_type else {
                    return Err(UnresolvedReason::Malformed(
                        "an adjacency name needs a shape type".into(),
                    ));
                };
                let mut sets = Vec::new();
                for item in items {
                    let parsed = parse_name(item).map_err(|e| UnresolvedReason::Malformed(e.to_string()))?;
                    let shapes = self.resolve_parsed(kernel, scope, item, &parsed, None, true, deps)?;
                    sets.push(shapes.into_iter().map(|s| s.shape).collect::<Vec<_>>());
                }
                // The latest visible result touching every listed shape.
                let holder = leaves
                    .iter()
                    .rev()
                    .find(|h| {
                        sets.iter()
                            .all(|set| set.iter().any(|s| kernel.contains(h.entry.shape, *s)))
                    })
                    .ok_or(UnresolvedReason::Orphaned)?;
                let matches = adjacency::intersect(kernel, &[holder.entry.shape], &sets, shape_type)
                    .map_err(|e| UnresolvedReason::Kernel(e.to_string()))?;
                let found_count = matches.len();
                let picked: Vec<ShapeId> = match (weak, allow_many) {
                    (None, true) => matches,
                    _ => adjacency::pick(&matches, *weak).into_iter().collect(),
                };
                if picked.is_empty() {
                    return Err(match found_count {
                        0 => UnresolvedReason::Orphaned,
                        n => UnresolvedReason::Ambiguous(n),
                    });
                }
                deps.insert(holder.feature.id);
                let found = picked
                    .into_iter()
                    .map(|s| {
                        let name = holder
                            .entry
                            .table
                            .name_of(s)
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| body.to_string());
                        self.resolved(kernel, holder, s, name)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.typed(kernel, found, Some(shape_type), allow_many, false, &leaves)
            }
        }
    }

    fn entry_or_missing(&self, scope: Scope, context: &str) -> Result<(Holder<'a>, bool), UnresolvedReason> {
        if let Some(found) = self.find_entry(scope, context) {
            return Ok(found);
        }
        match self.owner_of_identifier(scope.doc, context) {
            Some((index, _)) if index < scope.position => {
                Err(UnresolvedReason::NotVisible(context.to_string()))
            }
            Some(_) => Err(UnresolvedReason::Later(context.to_string())),
            None => Err(UnresolvedReason::NotFound(context.to_string())),
        }
    }

    fn resolved(
        &self,
        kernel: &dyn KernelIntrospect,
        holder: &Holder<'_>,
        shape: ShapeId,
        name: String,
    ) -> Result<ResolvedShape, UnresolvedReason> {
        Ok(ResolvedShape {
            shape,
            shape_type: kernel
                .shape_type(shape)
                .map_err(|e| UnresolvedReason::Kernel(e.to_string()))?,
            name,
            holder: holder.feature.id,
            result: holder.entry.name.clone(),
        })
    }

    /// Map `shape` of result `entry` (owned by the feature at `index`) forward
    /// to the visible shapes that continue it.
    fn follow(
        &self,
        kernel: &dyn KernelIntrospect,
        scope: Scope,
        index: usize,
        entry: &'a ResultEntry,
        shape: ShapeId,
        deps: &mut BTreeSet<FeatureId>,
    ) -> Result<Vec<ResolvedShape>, UnresolvedReason> {
        let leaves = self.visible_leaves(scope);
        // Still visible where it was defined.
        if let Some((holder, true)) = self.find_entry(scope, &entry.name) {
            if holder.entry.parts.is_empty() || holder.entry.shape == shape {
                let name = holder
                    .entry
                    .table
                    .name_of(shape)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| entry.name.clone());
                return Ok(vec![self.resolved(kernel, &holder, shape, name)?]);
            }
        }

        let mut current = vec![shape];
        for i in index + 1..scope.position {
            let Some((feature, output)) = self.computed(scope.doc, i) else {
                continue;
            };
            let consumes = |s: ShapeId| {
                output
                    .provenance
                    .consumed
                    .iter()
                    .any(|root| kernel.contains(*root, s))
            };
            if !current.iter().any(|s| consumes(*s)) {
                continue;
            }
            deps.insert(feature.id);
            let mut next = Vec::new();
            for s in current {
                let successors = if consumes(s) {
                    let successors = output.provenance.successors(s);
                    if successors.is_empty() && output.results.iter().any(|r| kernel.contains(r.shape, s)) {
                        vec![s]
                    } else {
                        successors
                    }
                } else {
                    vec![s]
                };
                for succ in successors {
                    if !next.contains(&succ) {
                        next.push(succ);
                    }
                }
            }
            current = next;
        }

        let mut found = Vec::new();
        for s in current {
            if let Some(holder) = leaves.iter().rev().find(|h| kernel.contains(h.entry.shape, s)) {
                deps.insert(holder.feature.id);
                let name = holder
                    .entry
                    .table
                    .name_of(s)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| holder.entry.name.clone());
                found.push(self.resolved(kernel, holder, s, name)?);
            }
        }
        if found.is_empty() {
            return Err(UnresolvedReason::NotVisible(entry.name.clone()));
        }
        Ok(found)
    }

    /// Enforce the requested type and cardinality.
    ///
    /// Whole results of a containing type are expanded to their sub-shapes of
    /// the requested type when `expand` is set.
    fn typed(
        &self,
        kernel: &dyn KernelIntrospect,
        found: Vec<ResolvedShape>,
        shape_type: Option<ShapeType>,
        allow_many: bool,
        expand: bool,
        leaves: &[Holder<'a>],
    ) -> Result<Vec<ResolvedShape>, UnresolvedReason> {
        let mut out: Vec<ResolvedShape> = Vec::new();
        for shape in found {
            match shape_type {
                None => out.push(shape),
                Some(t) if t == shape.shape_type => out.push(shape),
                Some(t) if expand && shape.shape_type.can_contain(t) => {
                    let subs = kernel
                        .sub_shapes(shape.shape, t)
                        .map_err(|e| UnresolvedReason::Kernel(e.to_string()))?;
                    for sub in subs {
                        let holder = leaves
                            .iter()
                            .rev()
                            .find(|h| h.entry.table.contains_shape(sub));
                        let name = holder
                            .and_then(|h| h.entry.table.name_of(sub))
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| shape.name.clone());
                        out.push(ResolvedShape {
                            shape: sub,
                            shape_type: t,
                            name,
                            holder: holder.map_or(shape.holder, |h| h.feature.id),
                            result: holder.map_or(shape.result.clone(), |h| h.entry.name.clone()),
                        });
                    }
                }
                Some(t) => {
                    return Err(UnresolvedReason::WrongType {
                        expected: t,
                        found: shape.shape_type,
                    })
                }
            }
        }
        let mut seen = HashSet::new();
        out.retain(|s| seen.insert(s.shape));
        match out.len() {
            0 => Err(UnresolvedReason::Orphaned),
            1 => Ok(out),
            n if !allow_many => Err(UnresolvedReason::Ambiguous(n)),
            _ => Ok(out),
        }
    }
}
