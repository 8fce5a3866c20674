use geom_kernel::{Kernel, KernelError, KernelIntrospect, ShapeId};

use crate::diff::{self, TopoSnapshot};

/// A kernel that can both build shapes and answer topology queries.
///
/// Operations hold one `&mut dyn KernelBundle` and take snapshots of their
/// inputs and outputs through it, so history can be derived from the diff.
pub trait KernelBundle: Kernel + KernelIntrospect {
    fn as_introspect(&self) -> &dyn KernelIntrospect;

    /// Faces, edges and vertices reachable from `shapes`.
    fn snapshot(&self, shapes: &[ShapeId]) -> Result<TopoSnapshot, KernelError> {
        diff::snapshot(self.as_introspect(), shapes)
    }
}

impl<K: Kernel + KernelIntrospect> KernelBundle for K {
    fn as_introspect(&self) -> &dyn KernelIntrospect {
        self
    }
}
