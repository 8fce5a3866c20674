use geom_kernel::{KernelOutput, Origin, ShapeHistory, ShapeId, ShapeType};

/// What an operation hands back to the engine: the bodies it built and
/// the history needed to name their sub-shapes.
#[derive(Debug, Clone)]
pub struct OpResult {
    /// One entry per feature result.
    pub outputs: Vec<BodyOutput>,
    pub provenance: Provenance,
    pub diagnostics: Diagnostics,
}

impl OpResult {
    /// Single-output result straight from a kernel call.
    pub fn single(output: KernelOutput, parts_are_subresults: bool) -> Self {
        let parts = if parts_are_subresults && output.parts.len() > 1 {
            output.parts
        } else {
            Vec::new()
        };
        Self {
            outputs: vec![BodyOutput {
                shape: output.shape,
                parts,
            }],
            provenance: Provenance {
                history: output.history,
                ..Provenance::default()
            },
            diagnostics: Diagnostics::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyOutput {
    /// Never persisted; rebuilt on every recompute.
    pub shape: ShapeId,
    /// Sub-results, when the result is a compound of separately named bodies.
    pub parts: Vec<ShapeId>,
}

/// How the input topology fed into the output.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Kernel-reported origin of output sub-shapes.
    pub history: ShapeHistory,
    /// Entities that exist in the result but not in the inputs.
    pub created: Vec<EntityRecord>,
    /// Entities that existed in the inputs but not in the result.
    pub deleted: Vec<EntityRecord>,
    /// Whole input shapes consumed by the operation.
    pub consumed: Vec<ShapeId>,
}

impl Provenance {
    /// Output shapes that continue `source` (same shape or modified from it).
    pub fn successors(&self, source: ShapeId) -> Vec<ShapeId> {
        self.history
            .records
            .iter()
            .filter(|(_, origin)| match origin {
                Origin::Unchanged { source: s } => *s == source,
                Origin::Modified { sources } => sources.contains(&source),
                _ => false,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_deleted(&self, shape: ShapeId) -> bool {
        self.history.is_deleted(shape) || self.deleted.iter().any(|r| r.shape == shape)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub shape: ShapeId,
    pub kind: ShapeType,
}

/// Problems that did not stop the operation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpError {
    #[error("kernel error: {0}")]
    Kernel(#[from] geom_kernel::KernelError),

    #[error("no profiles available for operation")]
    NoProfiles,

    #[error("{operation} needs at least one input shape")]
    EmptyInput { operation: String },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}
