use geom_kernel::ShapeId;

use crate::kernel_ext::KernelBundle;
use crate::types::{OpError, OpResult};

/// Group whole results into one compound; each input becomes a sub-result.
pub fn execute_compound(kb: &mut dyn KernelBundle, shapes: &[ShapeId]) -> Result<OpResult, OpError> {
    if shapes.is_empty() {
        return Err(OpError::EmptyInput {
            operation: "compound".into(),
        });
    }
    let output = kb.compound(shapes)?;
    let mut result = OpResult::single(output, true);
    if let [single] = shapes {
        result.outputs[0].parts = vec![*single];
    }
    result.provenance.consumed = shapes.to_vec();
    Ok(result)
}
