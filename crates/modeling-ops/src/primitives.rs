use tracing::debug;

use crate::diff::{self, TopoSnapshot};
use crate::kernel_ext::KernelBundle;
use crate::types::{OpError, OpResult};

fn check_positive(name: &str, value: f64) -> Result<(), OpError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(OpError::InvalidParameter {
            reason: format!("{name} must be positive, got {value}"),
        });
    }
    Ok(())
}

/// Record every sub-shape of a freshly built primitive as created.
fn with_created(kb: &dyn KernelBundle, mut result: OpResult) -> Result<OpResult, OpError> {
    let shapes: Vec<_> = result.outputs.iter().map(|o| o.shape).collect();
    let after = kb.snapshot(&shapes)?;
    result.provenance.created = diff::diff(&TopoSnapshot::default(), &after).created;
    Ok(result)
}

/// Execute a box primitive.
pub fn execute_box(
    kb: &mut dyn KernelBundle,
    origin: [f64; 3],
    size: [f64; 3],
) -> Result<OpResult, OpError> {
    for (axis, value) in ["dx", "dy", "dz"].iter().zip(size) {
        check_positive(axis, value)?;
    }
    let output = kb.make_box(origin, size)?;
    debug!(?size, "box");
    with_created(kb, OpResult::single(output, false))
}

/// Execute a cylinder primitive.
pub fn execute_cylinder(
    kb: &mut dyn KernelBundle,
    base: [f64; 3],
    axis: [f64; 3],
    radius: f64,
    height: f64,
) -> Result<OpResult, OpError> {
    check_positive("radius", radius)?;
    check_positive("height", height)?;
    let output = kb.make_cylinder(base, axis, radius, height)?;
    with_created(kb, OpResult::single(output, false))
}

/// Execute a construction point.
pub fn execute_point(kb: &mut dyn KernelBundle, position: [f64; 3]) -> Result<OpResult, OpError> {
    Ok(OpResult::single(kb.make_point(position)?, false))
}

/// Execute a construction axis.
pub fn execute_axis(
    kb: &mut dyn KernelBundle,
    origin: [f64; 3],
    direction: [f64; 3],
) -> Result<OpResult, OpError> {
    Ok(OpResult::single(kb.make_axis(origin, direction)?, false))
}

/// Execute a construction plane.
pub fn execute_plane(
    kb: &mut dyn KernelBundle,
    origin: [f64; 3],
    normal: [f64; 3],
) -> Result<OpResult, OpError> {
    Ok(OpResult::single(kb.make_plane(origin, normal)?, false))
}
