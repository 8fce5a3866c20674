use std::collections::HashSet;

use geom_kernel::{KernelError, KernelIntrospect, ShapeId, ShapeType};

use crate::types::EntityRecord;

/// A snapshot of the faces, edges and vertices of a set of shapes.
#[derive(Debug, Clone, Default)]
pub struct TopoSnapshot {
    pub faces: Vec<ShapeId>,
    pub edges: Vec<ShapeId>,
    pub vertices: Vec<ShapeId>,
}

impl TopoSnapshot {
    fn of_kind(&self, kind: ShapeType) -> &[ShapeId] {
        match kind {
            ShapeType::Face => &self.faces,
            ShapeType::Edge => &self.edges,
            _ => &self.vertices,
        }
    }
}

/// Take a topology snapshot of shapes for diffing.
pub fn snapshot(
    introspect: &dyn KernelIntrospect,
    shapes: &[ShapeId],
) -> Result<TopoSnapshot, KernelError> {
    let mut snap = TopoSnapshot::default();
    for shape in shapes {
        for (kind, out) in [
            (ShapeType::Face, &mut snap.faces),
            (ShapeType::Edge, &mut snap.edges),
            (ShapeType::Vertex, &mut snap.vertices),
        ] {
            for id in introspect.sub_shapes(*shape, kind)? {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
    Ok(snap)
}

/// Result of diffing two topology snapshots.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Entities present in `after` but not in `before`.
    pub created: Vec<EntityRecord>,
    /// Entities present in `before` but not in `after`.
    pub deleted: Vec<EntityRecord>,
    /// Entities present in both.
    pub survived: Vec<ShapeId>,
}

/// Diff two topology snapshots to find created, deleted, and surviving entities.
/// For primitives (no inputs), pass an empty snapshot as `before`.
pub fn diff(before: &TopoSnapshot, after: &TopoSnapshot) -> DiffResult {
    let mut result = DiffResult::default();
    for kind in [ShapeType::Face, ShapeType::Edge, ShapeType::Vertex] {
        let b: HashSet<ShapeId> = before.of_kind(kind).iter().copied().collect();
        let a: HashSet<ShapeId> = after.of_kind(kind).iter().copied().collect();
        for id in after.of_kind(kind) {
            if b.contains(id) {
                result.survived.push(*id);
            } else {
                result.created.push(EntityRecord { shape: *id, kind });
            }
        }
        for id in before.of_kind(kind) {
            if !a.contains(id) {
                result.deleted.push(EntityRecord { shape: *id, kind });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom_kernel::{Kernel, MockKernel};

    #[test]
    fn diff_empty_before_all_created() {
        let mut kernel = MockKernel::new();
        let out = kernel.make_box([0.0; 3], [1.0; 3]).unwrap();
        let after = snapshot(&kernel, &[out.shape]).unwrap();
        let result = diff(&TopoSnapshot::default(), &after);
        assert_eq!(result.created.len(), 6 + 12 + 8);
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn diff_same_snapshot_all_survive() {
        let mut kernel = MockKernel::new();
        let out = kernel.make_box([0.0; 3], [1.0; 3]).unwrap();
        let snap = snapshot(&kernel, &[out.shape]).unwrap();
        let result = diff(&snap, &snap);
        assert!(result.created.is_empty());
        assert!(result.deleted.is_empty());
        assert_eq!(result.survived.len(), 26);
    }
}
