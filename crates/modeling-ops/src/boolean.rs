use geom_kernel::ShapeId;
use tracing::debug;

use crate::diff;
use crate::kernel_ext::KernelBundle;
use crate::types::{OpError, OpResult};

fn finish(
    kb: &dyn KernelBundle,
    mut result: OpResult,
    inputs: &[ShapeId],
) -> Result<OpResult, OpError> {
    let before = kb.snapshot(inputs)?;
    let shapes: Vec<ShapeId> = result.outputs.iter().map(|o| o.shape).collect();
    let after = kb.snapshot(&shapes)?;
    let d = diff::diff(&before, &after);
    result.provenance.created = d.created;
    result.provenance.deleted = d.deleted;
    result.provenance.consumed = inputs.to_vec();
    Ok(result)
}

/// Split `objects` by `tools`. The result is a compsolid whose pieces are sub-results.
pub fn execute_partition(
    kb: &mut dyn KernelBundle,
    objects: &[ShapeId],
    tools: &[ShapeId],
) -> Result<OpResult, OpError> {
    if objects.is_empty() {
        return Err(OpError::EmptyInput {
            operation: "partition".into(),
        });
    }
    let output = kb.partition(objects, tools)?;
    debug!(pieces = output.parts.len(), "partition");
    let mut inputs = objects.to_vec();
    inputs.extend_from_slice(tools);
    let mut result = OpResult::single(output, true);
    if result.outputs[0].parts.is_empty() {
        result
            .diagnostics
            .warnings
            .push("partition tools do not cut any object".into());
    }
    finish(kb, result, &inputs)
}

/// Fuse `objects` into one body (or a compound of the disconnected bodies).
pub fn execute_fuse(kb: &mut dyn KernelBundle, objects: &[ShapeId]) -> Result<OpResult, OpError> {
    if objects.len() < 2 {
        return Err(OpError::InvalidParameter {
            reason: "fuse needs at least two objects".into(),
        });
    }
    let output = kb.fuse(objects)?;
    let result = OpResult::single(output, false);
    finish(kb, result, objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom_kernel::{Kernel, KernelIntrospect, MockKernel, ShapeType};

    #[test]
    fn partition_reports_pieces_as_subresults() {
        let mut kernel = MockKernel::new();
        let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
        let plane = kernel.make_plane([0.0, 0.0, 4.0], [0.0, 0.0, 1.0]).unwrap();
        let result = execute_partition(&mut kernel, &[body.shape], &[plane.shape]).unwrap();
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].parts.len(), 2);
        assert_eq!(
            kernel.shape_type(result.outputs[0].shape).unwrap(),
            ShapeType::CompSolid
        );
        assert_eq!(result.provenance.consumed.len(), 2);
    }

    #[test]
    fn fuse_needs_two_objects() {
        let mut kernel = MockKernel::new();
        let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
        assert!(matches!(
            execute_fuse(&mut kernel, &[body.shape]),
            Err(OpError::InvalidParameter { .. })
        ));
    }
}
