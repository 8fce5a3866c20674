//! Feature kinds and the context they execute in.
//!
//! Every kind is looked up by name in a [`KindRegistry`]. A kind declares its
//! attributes, checks them, and turns them into results through an
//! [`ExecContext`], which resolves selections and evaluates expressions on
//! its behalf while recording what the feature depended on.

mod construction;
mod group;
mod operations;
mod primitives;
mod sketch;

use std::collections::{BTreeSet, HashMap};

use geom_kernel::{KernelIntrospect, Origin, ShapeId, ShapeType};
use modeling_ops::{KernelBundle, OpResult};
use shape_types::Selection;
use topo_naming::NamingTable;

use crate::attributes::{AttrSpec, AttrValue, AttributeStore};
use crate::config::EngineConfig;
use crate::document::Feature;
use crate::expr;
use crate::filters::FilterRegistry;
use crate::resolve::{ModelView, ResolvedShape, Scope};
use crate::results::{FeatureOutput, ResultEntry};
use crate::types::{FeatureError, FeatureId, Unresolved};

pub use construction::{AxisKind, ParameterKind, PartKind, PlaneKind, PointKind};
pub use group::GroupKind;
pub use operations::{CompoundKind, ExtrusionKind, FilletKind, FuseKind, PartitionKind};
pub use primitives::{BoxKind, CylinderKind};
pub use sketch::SketchKind;

/// Behaviour of one kind of feature.
pub trait FeatureKind: Send + Sync {
    /// Registry key, also the prefix of default feature names.
    fn kind(&self) -> &'static str;

    /// Attribute slots the kind accepts.
    fn attributes(&self) -> &'static [AttrSpec];

    /// Construction results (points, axes, planes, sketches) are never group candidates.
    fn is_construction(&self) -> bool {
        false
    }

    /// Check the stored attributes before execution.
    fn validate(&self, attrs: &AttributeStore) -> Result<(), FeatureError> {
        for spec in self.attributes() {
            match attrs.get(spec.name) {
                None if spec.required => {
                    return Err(FeatureError::MissingAttribute {
                        name: spec.name.to_string(),
                    })
                }
                Some(value) if value.kind() != spec.kind => {
                    return Err(FeatureError::Invalid {
                        reason: format!("attribute {} must be a {}", spec.name, spec.kind.as_str()),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Adjust a value as it is assigned. Returns a warning to report.
    fn on_attribute_set(&self, _name: &str, _value: &mut AttrValue) -> Option<String> {
        None
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError>;
}

/// Feature kinds keyed by name.
pub struct KindRegistry {
    kinds: HashMap<String, Box<dyn FeatureKind>>,
}

impl KindRegistry {
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registry with every built-in kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ParameterKind));
        registry.register(Box::new(PointKind));
        registry.register(Box::new(AxisKind));
        registry.register(Box::new(PlaneKind));
        registry.register(Box::new(PartKind));
        registry.register(Box::new(BoxKind));
        registry.register(Box::new(CylinderKind));
        registry.register(Box::new(SketchKind));
        registry.register(Box::new(ExtrusionKind));
        registry.register(Box::new(PartitionKind));
        registry.register(Box::new(FuseKind));
        registry.register(Box::new(FilletKind));
        registry.register(Box::new(CompoundKind));
        registry.register(Box::new(GroupKind));
        registry
    }

    pub fn register(&mut self, kind: Box<dyn FeatureKind>) {
        self.kinds.insert(kind.kind().to_string(), kind);
    }

    pub fn get(&self, kind: &str) -> Option<&dyn FeatureKind> {
        self.kinds.get(kind).map(|k| k.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Everything a feature may use while executing.
pub struct ExecContext<'a> {
    pub feature: &'a Feature,
    /// Position of the feature: only earlier features are visible.
    pub scope: Scope,
    pub view: &'a ModelView<'a>,
    pub kernel: &'a mut dyn KernelBundle,
    pub config: &'a EngineConfig,
    pub filters: &'a FilterRegistry,
    /// Features consulted so far.
    pub dependencies: BTreeSet<FeatureId>,
    pub warnings: Vec<String>,
    /// Names of the input shapes, used to name the outputs.
    sources: HashMap<ShapeId, String>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        feature: &'a Feature,
        scope: Scope,
        view: &'a ModelView<'a>,
        kernel: &'a mut dyn KernelBundle,
        config: &'a EngineConfig,
        filters: &'a FilterRegistry,
    ) -> Self {
        Self {
            feature,
            scope,
            view,
            kernel,
            config,
            filters,
            dependencies: BTreeSet::new(),
            warnings: Vec::new(),
            sources: HashMap::new(),
        }
    }

    pub fn attrs(&self) -> &'a AttributeStore {
        &self.feature.attributes
    }

    pub fn introspect(&self) -> &dyn KernelIntrospect {
        self.kernel.as_introspect()
    }

    /// Consume the context, returning the dependencies and warnings collected.
    pub fn finish(self) -> (BTreeSet<FeatureId>, Vec<String>) {
        (self.dependencies, self.warnings)
    }

    /// Evaluate an expression against the parameters visible here.
    pub fn eval(&mut self, expression: &str) -> Result<f64, FeatureError> {
        let mut values = HashMap::new();
        for variable in expr::variables(expression)? {
            if let Some((id, value)) = self.view.parameter(self.scope, &variable) {
                self.dependencies.insert(id);
                values.insert(variable, value);
            }
        }
        Ok(expr::evaluate(expression, |v| values.get(v).copied())?)
    }

    /// Value of a required scalar attribute.
    pub fn scalar(&mut self, attr: &str) -> Result<f64, FeatureError> {
        let expression = self
            .attrs()
            .expression(attr)
            .ok_or_else(|| FeatureError::MissingAttribute { name: attr.into() })?;
        self.eval(expression)
    }

    /// Value of an optional scalar attribute.
    pub fn scalar_or(&mut self, attr: &str, default: f64) -> Result<f64, FeatureError> {
        match self.attrs().expression(attr) {
            Some(expression) => self.eval(expression),
            None => Ok(default),
        }
    }

    /// Resolve a selection for this feature and remember the names of what it found.
    pub fn resolve(&mut self, selection: &Selection, allow_many: bool) -> Result<Vec<ResolvedShape>, Unresolved> {
        let resolution = self.view.resolve(
            self.kernel.as_introspect(),
            self.scope,
            selection,
            &self.feature.name,
            allow_many,
        )?;
        self.dependencies.extend(resolution.dependencies);
        for shape in &resolution.shapes {
            self.remember(shape);
        }
        Ok(resolution.shapes)
    }

    /// The single shape of a required selection attribute.
    pub fn selection(&mut self, attr: &str) -> Result<ResolvedShape, FeatureError> {
        let selection = self
            .attrs()
            .selection(attr)
            .ok_or_else(|| FeatureError::MissingAttribute { name: attr.into() })?;
        let mut shapes = self.resolve(selection, false)?;
        shapes.pop().ok_or_else(|| FeatureError::Invalid {
            reason: format!("{attr} resolved to nothing"),
        })
    }

    /// The shape of an optional selection attribute; an empty selection is `None`.
    pub fn optional_selection(&mut self, attr: &str) -> Result<Option<ResolvedShape>, FeatureError> {
        match self.attrs().selection(attr) {
            Some(selection) if !selection.is_empty() => self.selection(attr).map(Some),
            _ => Ok(None),
        }
    }

    /// Every shape of a selection list attribute, in declaration order.
    pub fn selection_list(&mut self, attr: &str) -> Result<Vec<ResolvedShape>, FeatureError> {
        let list = self
            .attrs()
            .selection_list(attr)
            .ok_or_else(|| FeatureError::MissingAttribute { name: attr.into() })?;
        let mut out: Vec<ResolvedShape> = Vec::new();
        for item in &list.items {
            for shape in self.resolve(item, true)? {
                if !out.iter().any(|s| s.shape == shape.shape) {
                    out.push(shape);
                }
            }
        }
        if out.is_empty() {
            return Err(FeatureError::Invalid {
                reason: format!("{attr} holds no selection"),
            });
        }
        Ok(out)
    }

    fn remember(&mut self, shape: &ResolvedShape) {
        self.sources
            .entry(shape.shape)
            .or_insert_with(|| shape.name.clone());
        let entry = self
            .view
            .outputs
            .get(&shape.holder)
            .and_then(|o| o.find(&shape.result));
        if let Some(entry) = entry {
            for named in entry.table.entries() {
                self.sources
                    .entry(named.shape)
                    .or_insert_with(|| named.name.to_string());
            }
        }
    }

    /// Name the bodies of `op` after this feature and package them.
    ///
    /// Results are named `<feature>_<k>`, sub-results `<feature>_<k>_<j>`.
    /// With `feature_named`, a single result takes the feature name itself.
    pub fn name_results(&mut self, op: OpResult, feature_named: bool) -> Result<FeatureOutput, FeatureError> {
        let introspect = self.kernel.as_introspect();
        let history = &op.provenance.history;
        let mut results = Vec::new();
        for (k, body) in op.outputs.iter().enumerate() {
            let name = if feature_named && op.outputs.len() == 1 {
                self.feature.name.clone()
            } else {
                format!("{}_{}", self.feature.name, k + 1)
            };
            let shape_type = introspect.shape_type(body.shape)?;
            if body.parts.is_empty() {
                results.push(ResultEntry {
                    table: NamingTable::derive(&name, body.shape, history, &self.sources, introspect)?,
                    name,
                    shape: body.shape,
                    shape_type,
                    parts: Vec::new(),
                    source: None,
                });
                continue;
            }
            let mut parts = Vec::new();
            for (j, part) in body.parts.iter().enumerate() {
                let part_name = format!("{name}_{}", j + 1);
                // A part re-exposing a whole input result keeps a link to it.
                let source = match history.origin_of(*part) {
                    Some(Origin::Unchanged { source }) => self.sources.get(source).cloned(),
                    _ => None,
                };
                parts.push(ResultEntry {
                    table: NamingTable::derive(&part_name, *part, history, &self.sources, introspect)?,
                    name: part_name,
                    shape: *part,
                    shape_type: introspect.shape_type(*part)?,
                    parts: Vec::new(),
                    source,
                });
            }
            let tables: Vec<NamingTable> = parts.iter().map(|p| p.table.clone()).collect();
            results.push(ResultEntry {
                table: NamingTable::compose(&name, body.shape, shape_type, &tables),
                name,
                shape: body.shape,
                shape_type,
                parts,
                source: None,
            });
        }

        let mut concealed = Vec::new();
        for holder in self.view.visible_results(self.scope) {
            for entry in holder.entry.walk() {
                if op.provenance.consumed.contains(&entry.shape) && !concealed.contains(&entry.name) {
                    concealed.push(entry.name.clone());
                }
            }
        }
        // A result whose sub-results are all consumed disappears with them.
        let earlier = self.view.concealed(self.scope);
        for holder in self.view.visible_results(self.scope) {
            let entry = holder.entry;
            if !entry.parts.is_empty()
                && !concealed.contains(&entry.name)
                && entry
                    .parts
                    .iter()
                    .all(|p| concealed.contains(&p.name) || earlier.contains(p.name.as_str()))
            {
                concealed.push(entry.name.clone());
            }
        }

        Ok(FeatureOutput {
            results,
            concealed,
            warnings: op.diagnostics.warnings.clone(),
            provenance: op.provenance,
            ..FeatureOutput::default()
        })
    }
}

/// Shape type of a resolved shape, required to be `expected`.
pub(crate) fn expect_type(shape: &ResolvedShape, expected: ShapeType) -> Result<(), FeatureError> {
    if shape.shape_type != expected {
        return Err(FeatureError::Invalid {
            reason: format!("{} is a {}, expected a {}", shape.name, shape.shape_type, expected),
        });
    }
    Ok(())
}
