//! Filter Engine: named predicates over candidate shapes.
//!
//! Filters are looked up by name in a [`FilterRegistry`]; new predicates are
//! added by registering another [`Filter`] implementation.

mod geometric;
mod topological;

use std::collections::HashMap;

use geom_kernel::{KernelError, KernelIntrospect, ShapeId, ShapeType};
use shape_types::FilterDecl;
use tracing::trace;

pub use geometric::{HorizontalFaces, OnLine, OnPlane, VerticalFaces};
pub use topological::{BelongsTo, ExternalFaces, OppositeToEdge, TopoConnectedFaces};

/// Errors raised while preparing or applying a filter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("unknown filter {name}")]
    Unknown { name: String },

    #[error("filter {filter} does not apply to {shape_type} shapes")]
    Unsupported {
        filter: String,
        shape_type: ShapeType,
    },

    #[error("filter {filter}: {reason}")]
    InvalidArgument { filter: String, reason: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// A filter argument after selection resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArg {
    Shapes(Vec<ShapeId>),
    Bool(bool),
    Real(f64),
    Text(String),
}

impl ResolvedArg {
    pub fn shapes(&self) -> &[ShapeId] {
        match self {
            ResolvedArg::Shapes(shapes) => shapes,
            _ => &[],
        }
    }
}

/// What a filter may consult while preparing its predicate.
pub struct FilterContext<'a> {
    pub kernel: &'a dyn KernelIntrospect,
    /// Root shapes of the results the candidates were drawn from.
    pub scope: Vec<ShapeId>,
    pub linear_tolerance: f64,
    pub angular_tolerance: f64,
}

impl FilterContext<'_> {
    /// Every sub-shape of `shape_type` in the scope, without duplicates.
    pub fn all_of(&self, shape_type: ShapeType) -> Result<Vec<ShapeId>, KernelError> {
        let mut out = Vec::new();
        for root in &self.scope {
            for shape in self.kernel.sub_shapes(*root, shape_type)? {
                if !out.contains(&shape) {
                    out.push(shape);
                }
            }
        }
        Ok(out)
    }
}

/// Membership test produced by a prepared filter.
pub type Predicate<'a> = Box<dyn Fn(ShapeId) -> bool + 'a>;

/// A named predicate over shapes.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shape types the filter can judge.
    fn supports(&self, shape_type: ShapeType) -> bool;

    /// Build the predicate once per evaluation from the resolved arguments.
    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError>;
}

/// Filters keyed by name.
pub struct FilterRegistry {
    filters: HashMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Registry with every built-in filter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(BelongsTo));
        registry.register(Box::new(OnPlane));
        registry.register(Box::new(OnLine));
        registry.register(Box::new(HorizontalFaces));
        registry.register(Box::new(VerticalFaces));
        registry.register(Box::new(TopoConnectedFaces));
        registry.register(Box::new(OppositeToEdge));
        registry.register(Box::new(ExternalFaces));
        registry
    }

    pub fn register(&mut self, filter: Box<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|f| f.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Keep the candidates accepted by every filter, applied in declaration order.
///
/// An `exclude` declaration inverts its predicate. Evaluation stops as soon
/// as nothing is left.
pub fn evaluate(
    registry: &FilterRegistry,
    ctx: &FilterContext<'_>,
    shape_type: ShapeType,
    filters: &[(&FilterDecl, Vec<ResolvedArg>)],
    candidates: &[ShapeId],
) -> Result<Vec<ShapeId>, FilterError> {
    let mut accepted = candidates.to_vec();
    for (decl, args) in filters {
        if accepted.is_empty() {
            break;
        }
        let filter = registry.get(&decl.name).ok_or_else(|| FilterError::Unknown {
            name: decl.name.clone(),
        })?;
        if !filter.supports(shape_type) {
            return Err(FilterError::Unsupported {
                filter: decl.name.clone(),
                shape_type,
            });
        }
        let predicate = filter.prepare(ctx, args)?;
        accepted.retain(|s| predicate(*s) != decl.exclude);
        trace!(filter = %decl.name, left = accepted.len(), "filter applied");
    }
    Ok(accepted)
}
