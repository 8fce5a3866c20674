use std::collections::{HashSet, VecDeque};

use geom_kernel::{KernelError, KernelIntrospect, ShapeId, ShapeType};

use super::{Filter, FilterContext, FilterError, Predicate, ResolvedArg};

fn shapes_arg<'r>(filter: &str, args: &'r [ResolvedArg]) -> Result<&'r [ShapeId], FilterError> {
    match args.first() {
        Some(ResolvedArg::Shapes(shapes)) if !shapes.is_empty() => Ok(shapes),
        _ => Err(FilterError::InvalidArgument {
            filter: filter.into(),
            reason: "expects a selection argument".into(),
        }),
    }
}

/// Faces of the scope sharing at least one edge with `face`.
fn edge_neighbours(
    kernel: &dyn KernelIntrospect,
    faces: &[ShapeId],
    face: ShapeId,
) -> Result<Vec<ShapeId>, KernelError> {
    let edges = kernel.sub_shapes(face, ShapeType::Edge)?;
    Ok(faces
        .iter()
        .copied()
        .filter(|f| *f != face && edges.iter().any(|e| kernel.contains(*f, *e)))
        .collect())
}

/// Shapes contained in one of the selected shapes.
pub struct BelongsTo;

impl Filter for BelongsTo {
    fn name(&self) -> &'static str {
        "BelongsTo"
    }

    fn supports(&self, _shape_type: ShapeType) -> bool {
        true
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let owners = shapes_arg(self.name(), args)?.to_vec();
        Ok(Box::new(move |shape| {
            owners.iter().any(|o| ctx.kernel.contains(*o, shape))
        }))
    }
}

/// Faces touching the seed shape; with propagation, every face reachable
/// through shared edges.
pub struct TopoConnectedFaces;

impl Filter for TopoConnectedFaces {
    fn name(&self) -> &'static str {
        "TopoConnectedFaces"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        shape_type == ShapeType::Face
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let seeds = shapes_arg(self.name(), args)?;
        let propagate = matches!(args.get(1), Some(ResolvedArg::Bool(true)));
        let kernel = ctx.kernel;
        let faces = ctx.all_of(ShapeType::Face)?;

        let mut connected: HashSet<ShapeId> = HashSet::new();
        for seed in seeds {
            match kernel.shape_type(*seed)? {
                ShapeType::Face => {
                    connected.insert(*seed);
                    connected.extend(edge_neighbours(kernel, &faces, *seed)?);
                }
                ShapeType::Edge | ShapeType::Vertex => {
                    connected.extend(faces.iter().copied().filter(|f| kernel.contains(*f, *seed)));
                }
                other => {
                    return Err(FilterError::InvalidArgument {
                        filter: self.name().into(),
                        reason: format!("cannot start from a {other}"),
                    })
                }
            }
        }

        if propagate {
            let mut queue: VecDeque<ShapeId> = connected.iter().copied().collect();
            while let Some(face) = queue.pop_front() {
                for next in edge_neighbours(kernel, &faces, face)? {
                    if connected.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        Ok(Box::new(move |shape| connected.contains(&shape)))
    }
}

/// Edges opposite to the seed edges across four-sided faces, followed
/// around the whole ring. The seeds themselves are not included.
pub struct OppositeToEdge;

impl Filter for OppositeToEdge {
    fn name(&self) -> &'static str {
        "OppositeToEdge"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        shape_type == ShapeType::Edge
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let seeds = shapes_arg(self.name(), args)?;
        let kernel = ctx.kernel;
        let mut quads = Vec::new();
        for face in ctx.all_of(ShapeType::Face)? {
            let edges = kernel.sub_shapes(face, ShapeType::Edge)?;
            if edges.len() == 4 {
                quads.push(edges);
            }
        }
        let shares_vertex = |a: ShapeId, b: ShapeId| -> Result<bool, KernelError> {
            Ok(kernel
                .sub_shapes(a, ShapeType::Vertex)?
                .iter()
                .any(|v| kernel.contains(b, *v)))
        };

        let mut visited: HashSet<ShapeId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<ShapeId> = seeds.iter().copied().collect();
        let mut opposite = HashSet::new();
        while let Some(edge) = queue.pop_front() {
            for quad in quads.iter().filter(|q| q.contains(&edge)) {
                for candidate in quad {
                    if *candidate == edge || shares_vertex(edge, *candidate)? {
                        continue;
                    }
                    if visited.insert(*candidate) {
                        opposite.insert(*candidate);
                        queue.push_back(*candidate);
                    }
                }
            }
        }
        Ok(Box::new(move |shape| opposite.contains(&shape)))
    }
}

/// Faces bounding exactly one solid of the scope.
pub struct ExternalFaces;

impl Filter for ExternalFaces {
    fn name(&self) -> &'static str {
        "ExternalFaces"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        shape_type == ShapeType::Face
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        _args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let solids = ctx.all_of(ShapeType::Solid)?;
        Ok(Box::new(move |shape| {
            solids.iter().filter(|s| ctx.kernel.contains(**s, shape)).count() == 1
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom_kernel::{Kernel, MockKernel, Surface};

    fn ctx(kernel: &MockKernel, scope: Vec<ShapeId>) -> FilterContext<'_> {
        FilterContext {
            kernel,
            scope,
            linear_tolerance: 1e-6,
            angular_tolerance: 1e-6,
        }
    }

    fn top_face(kernel: &MockKernel, root: ShapeId) -> ShapeId {
        kernel
            .sub_shapes(root, ShapeType::Face)
            .unwrap()
            .into_iter()
            .find(|f| match kernel.surface(*f).unwrap() {
                Surface::Plane { origin, normal } => normal[2] > 0.5 && origin[2] > 9.0,
                _ => false,
            })
            .unwrap()
    }

    #[test]
    fn belongs_to_keeps_sub_shapes_of_the_argument() {
        let mut kernel = MockKernel::new();
        let a = kernel.make_box([0.0; 3], [1.0; 3]).unwrap();
        let b = kernel.make_box([5.0; 3], [1.0; 3]).unwrap();
        let c = ctx(&kernel, vec![a.shape, b.shape]);
        let predicate = BelongsTo.prepare(&c, &[ResolvedArg::Shapes(vec![b.shape])]).unwrap();
        let faces = c.all_of(ShapeType::Face).unwrap();
        assert_eq!(faces.len(), 12);
        assert_eq!(faces.iter().filter(|f| predicate(**f)).count(), 6);
    }

    #[test]
    fn connected_faces_of_a_face_and_of_a_vertex() {
        let mut kernel = MockKernel::new();
        let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
        let top = top_face(&kernel, body.shape);
        let c = ctx(&kernel, vec![body.shape]);
        let faces = c.all_of(ShapeType::Face).unwrap();

        let around_top = TopoConnectedFaces
            .prepare(&c, &[ResolvedArg::Shapes(vec![top]), ResolvedArg::Bool(false)])
            .unwrap();
        assert_eq!(faces.iter().filter(|f| around_top(**f)).count(), 5);

        let corner = kernel.sub_shapes(top, ShapeType::Vertex).unwrap()[0];
        let at_corner = TopoConnectedFaces
            .prepare(&c, &[ResolvedArg::Shapes(vec![corner])])
            .unwrap();
        assert_eq!(faces.iter().filter(|f| at_corner(**f)).count(), 3);

        let everything = TopoConnectedFaces
            .prepare(&c, &[ResolvedArg::Shapes(vec![corner]), ResolvedArg::Bool(true)])
            .unwrap();
        assert_eq!(faces.iter().filter(|f| everything(**f)).count(), 6);
    }

    #[test]
    fn opposite_edges_go_around_the_ring() {
        let mut kernel = MockKernel::new();
        let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
        let top = top_face(&kernel, body.shape);
        let seed = kernel.sub_shapes(top, ShapeType::Edge).unwrap()[0];
        let c = ctx(&kernel, vec![body.shape]);
        let predicate = OppositeToEdge.prepare(&c, &[ResolvedArg::Shapes(vec![seed])]).unwrap();
        let edges = c.all_of(ShapeType::Edge).unwrap();
        // Four parallel edges form the ring; the seed is left out.
        assert_eq!(edges.iter().filter(|e| predicate(**e)).count(), 3);
        assert!(!predicate(seed));
    }

    #[test]
    fn external_faces_skip_shared_walls() {
        let mut kernel = MockKernel::new();
        let body = kernel.make_box([0.0; 3], [10.0; 3]).unwrap();
        let plane = kernel.make_plane([5.0, 5.0, 5.0], [1.0, 0.0, 0.0]).unwrap();
        let split = kernel.partition(&[body.shape], &[plane.shape]).unwrap();
        let c = ctx(&kernel, vec![split.shape]);
        let predicate = ExternalFaces.prepare(&c, &[]).unwrap();
        let faces = c.all_of(ShapeType::Face).unwrap();
        let external = faces.iter().filter(|f| predicate(**f)).count();
        assert_eq!(external, faces.len() - 1);
    }
}
