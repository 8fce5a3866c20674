use geom_kernel::{ShapeId, ShapeType};
use tracing::debug;

use crate::diff;
use crate::kernel_ext::KernelBundle;
use crate::types::{BodyOutput, OpError, OpResult};

/// Execute an extrusion.
///
/// Each entry of `bases` becomes one output body. A base holding several faces
/// (a sketch compound) becomes a compound result with one sub-result per face.
pub fn execute_extrude(
    kb: &mut dyn KernelBundle,
    bases: &[ShapeId],
    direction: [f64; 3],
    size: f64,
) -> Result<OpResult, OpError> {
    if bases.is_empty() {
        return Err(OpError::EmptyInput {
            operation: "extrusion".into(),
        });
    }
    if !size.is_finite() || size <= 0.0 {
        return Err(OpError::InvalidParameter {
            reason: format!("extrusion size must be positive, got {size}"),
        });
    }
    let before = kb.snapshot(bases)?;

    let mut result = OpResult {
        outputs: Vec::new(),
        provenance: Default::default(),
        diagnostics: Default::default(),
    };
    for base in bases {
        let faces = kb.sub_shapes(*base, ShapeType::Face)?;
        if faces.is_empty() {
            return Err(OpError::NoProfiles);
        }
        let mut solids = Vec::new();
        for face in &faces {
            let output = kb.extrude(*face, direction, size)?;
            for (id, origin) in output.history.records {
                result.provenance.history.record(id, origin);
            }
            solids.push(output.shape);
        }
        let body = if let [solid] = solids.as_slice() {
            BodyOutput {
                shape: *solid,
                parts: Vec::new(),
            }
        } else {
            let compound = kb.compound(&solids)?;
            BodyOutput {
                shape: compound.shape,
                parts: solids,
            }
        };
        result.outputs.push(body);
        result.provenance.consumed.push(*base);
    }

    let shapes: Vec<ShapeId> = result.outputs.iter().map(|o| o.shape).collect();
    let after = kb.snapshot(&shapes)?;
    let d = diff::diff(&before, &after);
    result.provenance.created = d.created;
    result.provenance.deleted = d.deleted;
    debug!(bodies = result.outputs.len(), size, "extrusion");
    Ok(result)
}
