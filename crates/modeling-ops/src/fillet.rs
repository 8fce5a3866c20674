use geom_kernel::ShapeId;

use crate::diff;
use crate::kernel_ext::KernelBundle;
use crate::types::{OpError, OpResult};

/// Execute a fillet operation on specified edges of a solid.
pub fn execute_fillet(
    kb: &mut dyn KernelBundle,
    solid: ShapeId,
    edges: &[ShapeId],
    radius: f64,
) -> Result<OpResult, OpError> {
    if edges.is_empty() {
        return Err(OpError::EmptyInput {
            operation: "fillet".into(),
        });
    }
    // Snapshot before
    let before = kb.snapshot(&[solid])?;

    // Non-positive radii are reported by the kernel as a fillet failure.
    let output = kb.fillet(solid, edges, radius)?;

    let after = kb.snapshot(&[output.shape])?;
    let d = diff::diff(&before, &after);
    let mut result = OpResult::single(output, false);
    result.provenance.created = d.created;
    result.provenance.deleted = d.deleted;
    result.provenance.consumed = vec![solid];
    Ok(result)
}
