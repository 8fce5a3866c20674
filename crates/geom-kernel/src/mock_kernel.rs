//! MockKernel: a deterministic test double implementing Kernel + KernelIntrospect.
//!
//! Produces real (if restricted) topology with exact measurements and full
//! modification history. Partition only splits axis-aligned boxes by
//! axis-aligned planes and fillet only rounds convex right-angle edges of
//! polyhedra; anything else reports `NotSupported`.

use std::collections::HashSet;
use std::f64::consts::PI;

use tracing::debug;

use crate::builder::{self, Arena, TopoCache};
use crate::config::KernelConfig;
use crate::geometry as g;
use crate::traits::{Kernel, KernelIntrospect};
use crate::types::*;

/// Deterministic test double for the geometry kernel.
/// Implements both Kernel and KernelIntrospect.
pub struct MockKernel {
    arena: Arena,
    config: KernelConfig,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            arena: Arena::default(),
            config,
        }
    }

    fn cache(&self) -> TopoCache {
        TopoCache::new(self.config.coincidence)
    }

    fn tol(&self) -> f64 {
        self.config.coincidence * 100.0
    }

    /// Cylinder topology: lateral, top and bottom faces, two circles and a seam.
    fn cylinder_parts(
        &mut self,
        cache: &mut TopoCache,
        base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        height: f64,
    ) -> CylinderParts {
        let axis = g::normalize(axis);
        let frame = PlaneFrame::from_normal(base, axis);
        let top_center = g::add(base, g::scale(axis, height));
        let seam_bottom = g::add(base, g::scale(frame.x_dir, radius));
        let seam_top = g::add(seam_bottom, g::scale(axis, height));

        let arena = &mut self.arena;
        let bottom_circle = cache.circle_edge(arena, base, axis, radius, seam_bottom);
        let top_circle = cache.circle_edge(arena, top_center, axis, radius, seam_top);
        let seam = cache.line_edge(arena, seam_bottom, seam_top);

        let lateral = cache.face(
            arena,
            Surface::Cylinder {
                origin: base,
                axis,
                radius,
            },
            vec![seam_bottom, seam_top],
            2.0 * PI * radius * height,
            vec![bottom_circle, seam, top_circle],
        );
        let disk = PI * radius * radius;
        let top = cache.face(
            arena,
            Surface::Plane {
                origin: top_center,
                normal: axis,
            },
            vec![seam_top],
            disk,
            vec![top_circle],
        );
        let bottom = cache.face(
            arena,
            Surface::Plane {
                origin: base,
                normal: g::scale(axis, -1.0),
            },
            vec![seam_bottom],
            disk,
            vec![bottom_circle],
        );
        let solid = builder::solid(arena, vec![lateral, top, bottom], disk * height, None);
        CylinderParts {
            solid,
            lateral,
            top,
            bottom,
        }
    }

    /// Expand compounds into their solids; every solid must exist.
    fn solids_of(&self, shapes: &[ShapeId]) -> Result<Vec<ShapeId>, KernelError> {
        let mut out = Vec::new();
        for shape in shapes {
            for solid in self.arena.collect(*shape, ShapeType::Solid)? {
                if !out.contains(&solid) {
                    out.push(solid);
                }
            }
        }
        Ok(out)
    }

    fn solid_faces(&self, solid: ShapeId) -> Result<Vec<ShapeId>, KernelError> {
        self.arena.collect(solid, ShapeType::Face)
    }

    /// Planar faces on the same plane with the same boundary, whoever built them.
    fn coincident(&self, a: ShapeId, b: ShapeId, tol: f64) -> Result<bool, KernelError> {
        if a == b {
            return Ok(true);
        }
        let (sa, outline_a, _) = self.arena.face_geom(a)?;
        let (sb, outline_b, _) = self.arena.face_geom(b)?;
        let (Surface::Plane { origin: oa, normal: na }, Surface::Plane { origin: ob, normal: nb }) = (sa, sb)
        else {
            return Ok(false);
        };
        Ok(g::parallel(na, nb, 1e-9)
            && g::plane_distance(ob, oa, na).abs() < tol
            && outline_a.len() == outline_b.len()
            && outline_a
                .iter()
                .all(|p| outline_b.iter().any(|q| g::distance(*p, *q) < tol)))
    }

    fn edge_endpoints(&self, edge: ShapeId) -> Result<([f64; 3], [f64; 3]), KernelError> {
        match self.arena.edge_curve(edge)? {
            Curve::Line { start, end } => Ok((start, end)),
            Curve::Circle { .. } => Err(KernelError::NotSupported {
                operation: "operation on a circular edge".into(),
            }),
        }
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

struct CylinderParts {
    solid: ShapeId,
    lateral: ShapeId,
    top: ShapeId,
    bottom: ShapeId,
}

/// Working description of a face while a fillet rewrites the solid.
#[derive(Debug, Clone)]
struct FaceSpec {
    surface: Surface,
    outline: Vec<[f64; 3]>,
    area: f64,
    origin: SpecOrigin,
}

#[derive(Debug, Clone)]
enum SpecOrigin {
    Same(ShapeId),
    Modified(Vec<ShapeId>),
    Generated(Vec<ShapeId>),
}

impl FaceSpec {
    fn touch(&mut self) {
        if let SpecOrigin::Same(id) = self.origin {
            self.origin = SpecOrigin::Modified(vec![id]);
        }
    }

    fn position_of(&self, p: [f64; 3], tol: f64) -> Option<usize> {
        self.outline.iter().position(|q| g::distance(*q, p) <= tol)
    }

    /// True when `a` and `b` are consecutive outline points.
    fn has_side(&self, a: [f64; 3], b: [f64; 3], tol: f64) -> bool {
        match (self.position_of(a, tol), self.position_of(b, tol)) {
            (Some(i), Some(j)) => {
                let n = self.outline.len();
                (i + 1) % n == j || (j + 1) % n == i
            }
            _ => false,
        }
    }

    fn normal(&self) -> [f64; 3] {
        match self.surface {
            Surface::Plane { normal, .. } => normal,
            Surface::Cylinder { axis, .. } => axis,
        }
    }
}

fn aabb_union(boxes: &[([f64; 3], [f64; 3])]) -> ([f64; 3], [f64; 3]) {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for (lo, hi) in boxes {
        for i in 0..3 {
            min[i] = min[i].min(lo[i]);
            max[i] = max[i].max(hi[i]);
        }
    }
    (min, max)
}

fn aabb_volume(b: &([f64; 3], [f64; 3])) -> f64 {
    let d = g::sub(b.1, b.0);
    d[0] * d[1] * d[2]
}

/// True when the interiors of two boxes intersect.
fn interiors_overlap(a: &([f64; 3], [f64; 3]), b: &([f64; 3], [f64; 3]), tol: f64) -> bool {
    (0..3).all(|i| a.0[i] + tol < b.1[i] && b.0[i] + tol < a.1[i])
}

impl Kernel for MockKernel {
    fn make_point(&mut self, position: [f64; 3]) -> Result<KernelOutput, KernelError> {
        let mut cache = self.cache();
        let v = cache.vertex(&mut self.arena, position);
        Ok(KernelOutput {
            shape: v,
            parts: vec![v],
            history: ShapeHistory::default(),
        })
    }

    fn make_axis(
        &mut self,
        origin: [f64; 3],
        direction: [f64; 3],
    ) -> Result<KernelOutput, KernelError> {
        if g::norm(direction) < self.tol() {
            return Err(KernelError::InvalidParameter {
                reason: "axis direction is zero".into(),
            });
        }
        let mut cache = self.cache();
        let end = g::add(origin, g::scale(g::normalize(direction), self.config.axis_length));
        let edge = cache.line_edge(&mut self.arena, origin, end);
        let mut history = ShapeHistory::default();
        for (p, label) in [(origin, "Start"), (end, "End")] {
            let vertex = cache.vertex(&mut self.arena, p);
            history.record(vertex, Origin::Primitive { label: label.into() });
        }
        Ok(KernelOutput {
            shape: edge,
            parts: vec![edge],
            history,
        })
    }

    fn make_plane(
        &mut self,
        origin: [f64; 3],
        normal: [f64; 3],
    ) -> Result<KernelOutput, KernelError> {
        if g::norm(normal) < self.tol() {
            return Err(KernelError::InvalidParameter {
                reason: "plane normal is zero".into(),
            });
        }
        let frame = PlaneFrame::from_normal(origin, normal);
        let h = self.config.plane_half_size;
        let outline = [[-h, -h], [h, -h], [h, h], [-h, h]]
            .iter()
            .map(|uv| frame.to_world(*uv))
            .collect();
        let mut cache = self.cache();
        let face = cache.polygon_face(
            &mut self.arena,
            Surface::Plane {
                origin,
                normal: frame.normal,
            },
            outline,
            None,
        );
        let mut history = ShapeHistory::default();
        for shape_type in [ShapeType::Edge, ShapeType::Vertex] {
            for (i, shape) in self.arena.collect(face, shape_type)?.into_iter().enumerate() {
                let label = format!("{}_{}", shape_type.token(), i + 1);
                history.record(shape, Origin::Primitive { label });
            }
        }
        Ok(KernelOutput {
            shape: face,
            parts: vec![face],
            history,
        })
    }

    fn make_box(&mut self, origin: [f64; 3], size: [f64; 3]) -> Result<KernelOutput, KernelError> {
        if size.iter().any(|s| *s <= 0.0) {
            return Err(KernelError::InvalidParameter {
                reason: format!("box dimensions must be positive, got {size:?}"),
            });
        }
        let mut cache = self.cache();
        let max = g::add(origin, size);
        let (solid, faces) = builder::box_solid(&mut self.arena, &mut cache, origin, max);
        let mut history = ShapeHistory::default();
        for ((label, _, _), face) in builder::box_faces(origin, max).iter().zip(&faces) {
            history.record(
                *face,
                Origin::Primitive {
                    label: (*label).to_string(),
                },
            );
        }
        debug!(?solid, "box built");
        Ok(KernelOutput {
            shape: solid,
            parts: vec![solid],
            history,
        })
    }

    fn make_cylinder(
        &mut self,
        base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        height: f64,
    ) -> Result<KernelOutput, KernelError> {
        if radius <= 0.0 || height <= 0.0 {
            return Err(KernelError::InvalidParameter {
                reason: format!("cylinder radius and height must be positive, got r={radius} h={height}"),
            });
        }
        if g::norm(axis) < self.tol() {
            return Err(KernelError::InvalidParameter {
                reason: "cylinder axis is zero".into(),
            });
        }
        let mut cache = self.cache();
        let parts = self.cylinder_parts(&mut cache, base, axis, radius, height);
        let mut history = ShapeHistory::default();
        for (face, label) in [
            (parts.lateral, "Face_1"),
            (parts.top, "Face_2"),
            (parts.bottom, "Face_3"),
        ] {
            history.record(face, Origin::Primitive { label: label.into() });
        }
        Ok(KernelOutput {
            shape: parts.solid,
            parts: vec![parts.solid],
            history,
        })
    }

    fn make_profile_faces(
        &mut self,
        frame: &PlaneFrame,
        profiles: &[(String, Profile)],
    ) -> Result<KernelOutput, KernelError> {
        let mut cache = self.cache();
        let mut history = ShapeHistory::default();
        let mut faces = Vec::new();
        let surface = Surface::Plane {
            origin: frame.origin,
            normal: g::normalize(frame.normal),
        };
        for (label, profile) in profiles {
            match profile {
                Profile::Polygon { points } => {
                    if points.len() < 3 {
                        return Err(KernelError::InvalidParameter {
                            reason: format!("profile {label} needs at least 3 points"),
                        });
                    }
                    let outline: Vec<[f64; 3]> = points.iter().map(|p| frame.to_world(*p)).collect();
                    let face = cache.polygon_face(&mut self.arena, surface, outline.clone(), None);
                    let edges = self.arena.collect(face, ShapeType::Edge)?;
                    for (i, edge) in edges.iter().enumerate() {
                        history.record(
                            *edge,
                            Origin::Primitive {
                                label: format!("{label}_{}", i + 1),
                            },
                        );
                    }
                    for (i, p) in outline.iter().enumerate() {
                        let v = cache.vertex(&mut self.arena, *p);
                        history.record(
                            v,
                            Origin::Primitive {
                                label: format!("{label}_{}_StartVertex", i + 1),
                            },
                        );
                    }
                    history.record(
                        face,
                        Origin::Primitive {
                            label: format!("Face-{label}"),
                        },
                    );
                    faces.push(face);
                }
                Profile::Circle { center, radius } => {
                    if *radius <= 0.0 {
                        return Err(KernelError::InvalidParameter {
                            reason: format!("circle {label} radius must be positive"),
                        });
                    }
                    let c = frame.to_world(*center);
                    let seam = g::add(c, g::scale(frame.x_dir, *radius));
                    let edge = cache.circle_edge(&mut self.arena, c, frame.normal, *radius, seam);
                    let face = cache.face(
                        &mut self.arena,
                        Surface::Plane {
                            origin: c,
                            normal: surface_normal(&surface),
                        },
                        vec![seam],
                        PI * radius * radius,
                        vec![edge],
                    );
                    history.record(edge, Origin::Primitive { label: label.clone() });
                    history.record(
                        cache.vertex(&mut self.arena, seam),
                        Origin::Primitive {
                            label: format!("{label}_Seam"),
                        },
                    );
                    history.record(
                        face,
                        Origin::Primitive {
                            label: format!("Face-{label}"),
                        },
                    );
                    faces.push(face);
                }
            }
        }
        let compound = builder::container(&mut self.arena, ShapeType::Compound, faces.clone());
        Ok(KernelOutput {
            shape: compound,
            parts: faces,
            history,
        })
    }

    fn extrude(
        &mut self,
        face: ShapeId,
        direction: [f64; 3],
        height: f64,
    ) -> Result<KernelOutput, KernelError> {
        if height <= 0.0 {
            return Err(KernelError::InvalidParameter {
                reason: format!("extrusion size must be positive, got {height}"),
            });
        }
        let (surface, outline, area) = {
            let (s, o, a) = self.arena.face_geom(face)?;
            (s, o.to_vec(), a)
        };
        let normal = match surface {
            Surface::Plane { normal, .. } => normal,
            Surface::Cylinder { .. } => {
                return Err(KernelError::NotSupported {
                    operation: "extrusion of a non-planar face".into(),
                })
            }
        };
        let dir = if g::norm(direction) < self.tol() {
            g::normalize(normal)
        } else {
            g::normalize(direction)
        };
        let along = g::dot(dir, g::normalize(normal)).abs();
        if along < self.tol() {
            return Err(KernelError::InvalidParameter {
                reason: "extrusion direction lies in the face plane".into(),
            });
        }
        let base_edges = self.arena.collect(face, ShapeType::Edge)?;
        let mut cache = self.cache();
        let mut history = ShapeHistory::default();

        if let [circle] = base_edges.as_slice() {
            if let Curve::Circle { center, radius, .. } = self.arena.edge_curve(*circle)? {
                if !g::parallel(dir, normal, 1e-9) {
                    return Err(KernelError::NotSupported {
                        operation: "oblique extrusion of a disk".into(),
                    });
                }
                let parts = self.cylinder_parts(&mut cache, center, dir, radius, height);
                history.record(parts.bottom, Origin::Primitive { label: "From_Face".into() });
                history.record(parts.top, Origin::Primitive { label: "To_Face".into() });
                history.record(
                    parts.lateral,
                    Origin::Generated {
                        sources: vec![*circle],
                    },
                );
                return Ok(KernelOutput {
                    shape: parts.solid,
                    parts: vec![parts.solid],
                    history,
                });
            }
        }

        let mut base_sides = Vec::new();
        for edge in &base_edges {
            if let Curve::Line { start, end } = self.arena.edge_curve(*edge)? {
                base_sides.push((*edge, start, end));
            }
        }
        let same_side = |s: [f64; 3], e: [f64; 3], a: [f64; 3], b: [f64; 3]| {
            (g::distance(s, a) < 1e-6 && g::distance(e, b) < 1e-6)
                || (g::distance(s, b) < 1e-6 && g::distance(e, a) < 1e-6)
        };

        let offset = g::scale(dir, height);
        let top_outline: Vec<[f64; 3]> = outline.iter().map(|p| g::add(*p, offset)).collect();
        let sense = g::dot(dir, normal).signum();
        let arena = &mut self.arena;
        let from = cache.polygon_face(
            arena,
            Surface::Plane {
                origin: outline[0],
                normal: g::scale(g::normalize(normal), -sense),
            },
            outline.clone(),
            Some(area),
        );
        let to = cache.polygon_face(
            arena,
            Surface::Plane {
                origin: top_outline[0],
                normal: g::scale(g::normalize(normal), sense),
            },
            top_outline.clone(),
            Some(area),
        );
        history.record(from, Origin::Primitive { label: "From_Face".into() });
        history.record(to, Origin::Primitive { label: "To_Face".into() });

        let mut faces = vec![from, to];
        let n = outline.len();
        for i in 0..n {
            let (a, b) = (outline[i], outline[(i + 1) % n]);
            let side = vec![a, b, top_outline[(i + 1) % n], top_outline[i]];
            let lateral = cache.planar_polygon(arena, side);
            match base_sides.iter().find(|(_, s, e)| same_side(*s, *e, a, b)) {
                Some((edge, _, _)) => history.record(
                    lateral,
                    Origin::Generated {
                        sources: vec![*edge],
                    },
                ),
                None => history.record(
                    lateral,
                    Origin::Primitive {
                        label: format!("Lateral_{}", i + 1),
                    },
                ),
            }
            faces.push(lateral);
        }

        let mut points = outline.clone();
        points.extend(top_outline.iter().copied());
        let bounds = aabb_union(&points.iter().map(|p| (*p, *p)).collect::<Vec<_>>());
        let volume = area * height * along;
        let is_box = n == 4
            && points.iter().all(|p| {
                (0..3).all(|k| (p[k] - bounds.0[k]).abs() < 1e-9 || (p[k] - bounds.1[k]).abs() < 1e-9)
            })
            && (aabb_volume(&bounds) - volume).abs() < 1e-9 * volume.max(1.0);
        let solid = builder::solid(arena, faces, volume, is_box.then_some(bounds));
        Ok(KernelOutput {
            shape: solid,
            parts: vec![solid],
            history,
        })
    }

    fn partition(
        &mut self,
        objects: &[ShapeId],
        tools: &[ShapeId],
    ) -> Result<KernelOutput, KernelError> {
        let solids = self.solids_of(objects)?;
        if solids.is_empty() {
            return Err(KernelError::InvalidParameter {
                reason: "partition needs at least one solid".into(),
            });
        }
        let tol = self.tol();
        let mut planes: Vec<(usize, f64, ShapeId)> = Vec::new();
        for tool in tools {
            for face in self.arena.collect(*tool, ShapeType::Face)? {
                let (surface, _, _) = self.arena.face_geom(face)?;
                let Surface::Plane { origin, normal } = surface else {
                    return Err(KernelError::NotSupported {
                        operation: "partition by a curved tool".into(),
                    });
                };
                let Some(axis) = g::axis_index(normal, 1e-9) else {
                    return Err(KernelError::NotSupported {
                        operation: "partition by an oblique plane".into(),
                    });
                };
                planes.push((axis, origin[axis], face));
            }
        }

        let mut cache = self.cache();
        for solid in &solids {
            cache.seed(&self.arena, *solid)?;
        }
        for (_, _, face) in &planes {
            cache.seed(&self.arena, *face)?;
        }

        let mut history = ShapeHistory::default();
        let mut pieces = Vec::new();
        for solid in &solids {
            let (_, aabb) = self.arena.solid_geom(*solid)?;
            let Some(aabb) = aabb else {
                return Err(KernelError::NotSupported {
                    operation: "partition of a non-box solid".into(),
                });
            };
            let original_faces = self.solid_faces(*solid)?;

            let mut boxes = vec![aabb];
            for (axis, c, _) in &planes {
                let mut next = Vec::new();
                for (lo, hi) in boxes {
                    if lo[*axis] + tol < *c && *c < hi[*axis] - tol {
                        let mut lower_hi = hi;
                        lower_hi[*axis] = *c;
                        let mut upper_lo = lo;
                        upper_lo[*axis] = *c;
                        next.push((lo, lower_hi));
                        next.push((upper_lo, hi));
                    } else {
                        next.push((lo, hi));
                    }
                }
                boxes = next;
            }

            for (lo, hi) in boxes {
                let (piece, faces) = builder::box_solid(&mut self.arena, &mut cache, lo, hi);
                for face in faces {
                    if original_faces.contains(&face) {
                        history.record(face, Origin::Unchanged { source: face });
                        continue;
                    }
                    let (surface, _, _) = self.arena.face_geom(face)?;
                    let Surface::Plane { origin, normal } = surface else {
                        continue;
                    };
                    let axis = g::axis_index(normal, 1e-9).unwrap_or(0);
                    let mut sources = Vec::new();
                    for f in &original_faces {
                        if let (Surface::Plane { origin: o, normal: n }, _, _) = self.arena.face_geom(*f)? {
                            if g::parallel(n, normal, 1e-9) && (o[axis] - origin[axis]).abs() < tol {
                                sources.push(*f);
                            }
                        }
                    }
                    if sources.is_empty() {
                        sources = planes
                            .iter()
                            .filter(|(a, c, _)| *a == axis && (c - origin[axis]).abs() < tol)
                            .map(|(_, _, f)| *f)
                            .collect();
                    }
                    history.record(face, Origin::Modified { sources });
                }
                history.record(piece, Origin::Modified { sources: vec![*solid] });
                pieces.push(piece);
            }
        }
        for (_, _, face) in &planes {
            history.deleted.push(*face);
        }
        debug!(pieces = pieces.len(), "partition complete");
        let compsolid = builder::container(&mut self.arena, ShapeType::CompSolid, pieces.clone());
        Ok(KernelOutput {
            shape: compsolid,
            parts: pieces,
            history,
        })
    }

    fn fuse(&mut self, objects: &[ShapeId]) -> Result<KernelOutput, KernelError> {
        let solids = self.solids_of(objects)?;
        if solids.len() < 2 {
            return Err(KernelError::InvalidParameter {
                reason: "fuse needs at least two solids".into(),
            });
        }
        let tol = self.tol();
        let faces: Vec<Vec<ShapeId>> = solids
            .iter()
            .map(|s| self.solid_faces(*s))
            .collect::<Result<_, _>>()?;
        let bounds: Vec<([f64; 3], [f64; 3])> = solids
            .iter()
            .map(|s| self.bounding_box(*s))
            .collect::<Result<_, _>>()?;

        // Union-find over solids sharing a face.
        let mut parent: Vec<usize> = (0..solids.len()).collect();
        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }
        let mut shared = HashSet::new();
        for i in 0..solids.len() {
            for j in (i + 1)..solids.len() {
                let mut common: Vec<ShapeId> = Vec::new();
                for a in &faces[i] {
                    for b in &faces[j] {
                        if self.coincident(*a, *b, tol)? {
                            common.push(*a);
                            common.push(*b);
                        }
                    }
                }
                if common.is_empty() {
                    if interiors_overlap(&bounds[i], &bounds[j], tol) {
                        return Err(KernelError::NotSupported {
                            operation: "fuse of overlapping solids".into(),
                        });
                    }
                    continue;
                }
                shared.extend(common);
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }

        let mut history = ShapeHistory::default();
        let mut results = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        for i in 0..solids.len() {
            let r = find(&mut parent, i);
            if !roots.contains(&r) {
                roots.push(r);
            }
        }
        for root in roots {
            let members: Vec<usize> = (0..solids.len())
                .filter(|i| find(&mut parent, *i) == root)
                .collect();
            if members.len() == 1 {
                let solid = solids[members[0]];
                history.record(solid, Origin::Unchanged { source: solid });
                results.push(solid);
                continue;
            }
            let mut kept = Vec::new();
            let mut volume = 0.0;
            let mut boxes = Vec::new();
            let mut all_boxes = true;
            for m in &members {
                let (v, aabb) = self.arena.solid_geom(solids[*m])?;
                volume += v;
                match aabb {
                    Some(b) => boxes.push(b),
                    None => all_boxes = false,
                }
                for f in &faces[*m] {
                    if !shared.contains(f) && !kept.contains(f) {
                        kept.push(*f);
                        history.record(*f, Origin::Unchanged { source: *f });
                    }
                }
            }
            let union = aabb_union(&boxes);
            let aabb = (all_boxes && (aabb_volume(&union) - volume).abs() < tol * volume.max(1.0))
                .then_some(union);
            let fused = builder::solid(&mut self.arena, kept, volume, aabb);
            history.record(
                fused,
                Origin::Modified {
                    sources: members.iter().map(|m| solids[*m]).collect(),
                },
            );
            results.push(fused);
        }
        history.deleted.extend(shared.iter().copied());
        history.deleted.sort();

        let shape = match results.as_slice() {
            [single] => *single,
            _ => builder::container(&mut self.arena, ShapeType::Compound, results.clone()),
        };
        Ok(KernelOutput {
            shape,
            parts: results,
            history,
        })
    }

    fn fillet(
        &mut self,
        solid: ShapeId,
        edges: &[ShapeId],
        radius: f64,
    ) -> Result<KernelOutput, KernelError> {
        if radius <= 0.0 {
            return Err(KernelError::FilletFailed {
                reason: format!("radius must be positive, got {radius}"),
            });
        }
        if edges.is_empty() {
            return Err(KernelError::InvalidParameter {
                reason: "no edges to fillet".into(),
            });
        }
        let (mut volume, _) = self.arena.solid_geom(solid)?;
        let tol = self.tol();

        let mut specs = Vec::new();
        for face in self.solid_faces(solid)? {
            let (surface, outline, area) = self.arena.face_geom(face)?;
            if outline.len() < 3 || !matches!(surface, Surface::Plane { .. }) {
                return Err(KernelError::NotSupported {
                    operation: "fillet on a solid with curved faces".into(),
                });
            }
            specs.push(FaceSpec {
                surface,
                outline: outline.to_vec(),
                area,
                origin: SpecOrigin::Same(face),
            });
        }

        let mut used: Vec<[f64; 3]> = Vec::new();
        for edge in edges {
            if !self.contains(solid, *edge) {
                return Err(KernelError::EntityNotFound { id: *edge });
            }
            let (a, b) = self.edge_endpoints(*edge)?;
            if used.iter().any(|p| g::distance(*p, a) < tol || g::distance(*p, b) < tol) {
                return Err(KernelError::NotSupported {
                    operation: "fillet of edges sharing a vertex".into(),
                });
            }
            let adjacent: Vec<usize> = (0..specs.len())
                .filter(|i| specs[*i].has_side(a, b, tol))
                .collect();
            let [fi, gi] = adjacent.as_slice() else {
                return Err(KernelError::FilletFailed {
                    reason: "edge is not shared by exactly two faces".into(),
                });
            };
            let (fi, gi) = (*fi, *gi);
            if !g::perpendicular(specs[fi].normal(), specs[gi].normal(), 1e-9) {
                return Err(KernelError::NotSupported {
                    operation: "fillet of a non-orthogonal edge".into(),
                });
            }
            let e = g::normalize(g::sub(b, a));
            let length = g::distance(a, b);

            // Inward direction of each adjacent face, perpendicular to the edge.
            let inward = |spec: &FaceSpec| {
                let mut u = g::normalize(g::cross(spec.normal(), e));
                if g::dot(g::sub(g::centroid(&spec.outline), a), u) < 0.0 {
                    u = g::scale(u, -1.0);
                }
                let width = spec
                    .outline
                    .iter()
                    .map(|p| g::dot(g::sub(*p, a), u))
                    .fold(0.0, f64::max);
                (u, width)
            };
            let (uf, wf) = inward(&specs[fi]);
            let (ug, wg) = inward(&specs[gi]);
            if radius >= wf - tol || radius >= wg - tol {
                return Err(KernelError::FilletFailed {
                    reason: format!(
                        "radius {radius} does not fit faces of width {:.6} and {:.6}",
                        wf, wg
                    ),
                });
            }

            let af = g::add(a, g::scale(uf, radius));
            let bf = g::add(b, g::scale(uf, radius));
            let ag = g::add(a, g::scale(ug, radius));
            let bg = g::add(b, g::scale(ug, radius));

            for (idx, moved_a, moved_b) in [(fi, af, bf), (gi, ag, bg)] {
                let spec = &mut specs[idx];
                for p in spec.outline.iter_mut() {
                    if g::distance(*p, a) < tol {
                        *p = moved_a;
                    } else if g::distance(*p, b) < tol {
                        *p = moved_b;
                    }
                }
                spec.area -= radius * length;
                spec.touch();
            }

            let corner_loss = radius * radius * (1.0 - PI / 4.0);
            let on_f = |p: [f64; 3]| match specs[fi].surface {
                Surface::Plane { normal, .. } => g::plane_distance(p, a, normal).abs() < tol,
                Surface::Cylinder { .. } => false,
            };
            let mut cap_updates = Vec::new();
            for (i, spec) in specs.iter().enumerate() {
                if i == fi || i == gi {
                    continue;
                }
                for (corner, pf, pg) in [(a, af, ag), (b, bf, bg)] {
                    if let Some(k) = spec.position_of(corner, tol) {
                        let n = spec.outline.len();
                        let prev = spec.outline[(k + n - 1) % n];
                        let pair = if on_f(prev) { [pf, pg] } else { [pg, pf] };
                        cap_updates.push((i, corner, pair));
                    }
                }
            }
            for (i, corner, pair) in cap_updates {
                let spec = &mut specs[i];
                if let Some(k) = spec.position_of(corner, tol) {
                    spec.outline.splice(k..=k, pair);
                    spec.area -= corner_loss;
                    spec.touch();
                }
            }

            specs.push(FaceSpec {
                surface: Surface::Cylinder {
                    origin: g::add(af, g::scale(ug, radius)),
                    axis: e,
                    radius,
                },
                outline: vec![af, bf, bg, ag],
                area: 0.5 * PI * radius * length,
                origin: SpecOrigin::Generated(vec![*edge]),
            });
            volume -= corner_loss * length;
            used.push(a);
            used.push(b);
        }

        let mut cache = self.cache();
        cache.seed(&self.arena, solid)?;
        let mut history = ShapeHistory::default();
        let mut faces = Vec::new();
        for spec in specs {
            let face = match &spec.origin {
                SpecOrigin::Same(id) => *id,
                _ => cache.polygon_face(&mut self.arena, spec.surface, spec.outline.clone(), Some(spec.area)),
            };
            let origin = match spec.origin {
                SpecOrigin::Same(id) => Origin::Unchanged { source: id },
                SpecOrigin::Modified(sources) => Origin::Modified { sources },
                SpecOrigin::Generated(sources) => Origin::Generated { sources },
            };
            history.record(face, origin);
            faces.push(face);
        }
        let result = builder::solid(&mut self.arena, faces, volume, None);
        history.record(result, Origin::Modified { sources: vec![solid] });
        history.deleted.extend(edges.iter().copied());
        debug!(edges = edges.len(), radius, "fillet complete");
        Ok(KernelOutput {
            shape: result,
            parts: vec![result],
            history,
        })
    }

    fn compound(&mut self, shapes: &[ShapeId]) -> Result<KernelOutput, KernelError> {
        let mut history = ShapeHistory::default();
        for shape in shapes {
            self.arena.get(*shape)?;
            history.record(*shape, Origin::Unchanged { source: *shape });
        }
        let compound = builder::container(&mut self.arena, ShapeType::Compound, shapes.to_vec());
        Ok(KernelOutput {
            shape: compound,
            parts: shapes.to_vec(),
            history,
        })
    }
}

fn surface_normal(surface: &Surface) -> [f64; 3] {
    match surface {
        Surface::Plane { normal, .. } => *normal,
        Surface::Cylinder { axis, .. } => *axis,
    }
}

impl KernelIntrospect for MockKernel {
    fn shape_type(&self, shape: ShapeId) -> Result<ShapeType, KernelError> {
        Ok(self.arena.get(shape)?.kind)
    }

    fn children(&self, shape: ShapeId) -> Result<Vec<ShapeId>, KernelError> {
        Ok(self.arena.get(shape)?.children.clone())
    }

    fn sub_shapes(
        &self,
        shape: ShapeId,
        shape_type: ShapeType,
    ) -> Result<Vec<ShapeId>, KernelError> {
        self.arena.collect(shape, shape_type)
    }

    fn contains(&self, whole: ShapeId, part: ShapeId) -> bool {
        if whole == part {
            return true;
        }
        match self.arena.get(part) {
            Ok(shape) => self
                .arena
                .collect(whole, shape.kind)
                .map(|all| all.contains(&part))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn surface(&self, face: ShapeId) -> Result<Surface, KernelError> {
        Ok(self.arena.face_geom(face)?.0)
    }

    fn curve(&self, edge: ShapeId) -> Result<Curve, KernelError> {
        self.arena.edge_curve(edge)
    }

    fn point(&self, vertex: ShapeId) -> Result<[f64; 3], KernelError> {
        self.arena.vertex_point(vertex)
    }

    fn area(&self, shape: ShapeId) -> Result<f64, KernelError> {
        let mut total = 0.0;
        for face in self.arena.collect(shape, ShapeType::Face)? {
            total += self.arena.face_geom(face)?.2;
        }
        Ok(total)
    }

    fn volume(&self, shape: ShapeId) -> Result<f64, KernelError> {
        let mut total = 0.0;
        for solid in self.arena.collect(shape, ShapeType::Solid)? {
            total += self.arena.solid_geom(solid)?.0;
        }
        Ok(total)
    }

    fn length(&self, shape: ShapeId) -> Result<f64, KernelError> {
        let mut total = 0.0;
        for edge in self.arena.collect(shape, ShapeType::Edge)? {
            total += self.arena.edge_curve(edge)?.length();
        }
        Ok(total)
    }

    fn centroid(&self, shape: ShapeId) -> Result<[f64; 3], KernelError> {
        let kind = self.arena.get(shape)?.kind;
        match kind {
            ShapeType::Vertex => self.arena.vertex_point(shape),
            ShapeType::Edge => Ok(match self.arena.edge_curve(shape)? {
                Curve::Line { start, end } => g::scale(g::add(start, end), 0.5),
                Curve::Circle { center, .. } => center,
            }),
            ShapeType::Face => {
                let (surface, outline, _) = self.arena.face_geom(shape)?;
                match surface {
                    Surface::Plane { .. } if outline.len() >= 3 => Ok(g::centroid(outline)),
                    Surface::Plane { origin, .. } => Ok(origin),
                    Surface::Cylinder { origin, axis, .. } => {
                        let h = outline
                            .iter()
                            .map(|p| g::dot(g::sub(*p, origin), axis))
                            .fold(0.0, f64::max);
                        Ok(g::add(origin, g::scale(axis, h * 0.5)))
                    }
                }
            }
            _ => {
                let (min, max) = self.bounding_box(shape)?;
                Ok(g::scale(g::add(min, max), 0.5))
            }
        }
    }

    fn bounding_box(&self, shape: ShapeId) -> Result<([f64; 3], [f64; 3]), KernelError> {
        let mut boxes = Vec::new();
        for v in self.arena.collect(shape, ShapeType::Vertex)? {
            let p = self.arena.vertex_point(v)?;
            boxes.push((p, p));
        }
        for e in self.arena.collect(shape, ShapeType::Edge)? {
            if let Curve::Circle {
                center,
                axis,
                radius,
            } = self.arena.edge_curve(e)?
            {
                let ext = [0, 1, 2].map(|i| radius * (1.0 - axis[i] * axis[i]).max(0.0).sqrt());
                boxes.push((g::sub(center, ext), g::add(center, ext)));
            }
        }
        if boxes.is_empty() {
            return Err(KernelError::EntityNotFound { id: shape });
        }
        Ok(aabb_union(&boxes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box(kernel: &mut MockKernel, size: f64) -> KernelOutput {
        kernel.make_box([0.0; 3], [size; 3]).unwrap()
    }

    fn labelled(out: &KernelOutput, label: &str) -> ShapeId {
        out.history
            .records
            .iter()
            .find(|(_, o)| matches!(o, Origin::Primitive { label: l } if l == label))
            .map(|(id, _)| *id)
            .unwrap()
    }

    #[test]
    fn test_box_topology_and_volume() {
        let mut kernel = MockKernel::new();
        let out = unit_box(&mut kernel, 10.0);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Face).unwrap().len(), 6);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Edge).unwrap().len(), 12);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Vertex).unwrap().len(), 8);
        assert_relative_eq!(kernel.volume(out.shape).unwrap(), 1000.0);
        assert_relative_eq!(kernel.area(out.shape).unwrap(), 600.0);
    }

    #[test]
    fn test_cylinder_volume() {
        let mut kernel = MockKernel::new();
        let out = kernel
            .make_cylinder([0.0; 3], [0.0, 0.0, 1.0], 10.0, 13.0)
            .unwrap();
        assert_relative_eq!(kernel.volume(out.shape).unwrap(), 4084.070449666731, epsilon = 1e-6);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Face).unwrap().len(), 3);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Edge).unwrap().len(), 3);
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Vertex).unwrap().len(), 2);
    }

    #[test]
    fn test_extrude_rectangle_is_a_box() {
        let mut kernel = MockKernel::new();
        let frame = PlaneFrame::from_normal([0.0; 3], [0.0, 0.0, 1.0]);
        let profile = Profile::Polygon {
            points: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]],
        };
        let faces = kernel
            .make_profile_faces(&frame, &[("R".into(), profile)])
            .unwrap();
        let out = kernel.extrude(faces.parts[0], [0.0, 0.0, 1.0], 3.0).unwrap();
        assert_relative_eq!(kernel.volume(out.shape).unwrap(), 24.0);
        let (_, aabb) = kernel.arena.solid_geom(out.shape).unwrap();
        assert!(aabb.is_some());
        let generated = out
            .history
            .records
            .iter()
            .filter(|(_, o)| matches!(o, Origin::Generated { .. }))
            .count();
        assert_eq!(generated, 4);
    }

    #[test]
    fn test_partition_keeps_untouched_faces() {
        let mut kernel = MockKernel::new();
        let body = unit_box(&mut kernel, 10.0);
        let left = labelled(&body, "Left");
        let right = labelled(&body, "Right");
        let plane = kernel.make_plane([5.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();

        let out = kernel.partition(&[body.shape], &[plane.shape]).unwrap();
        assert_eq!(out.parts.len(), 2);
        assert!(kernel.contains(out.parts[0], left));
        assert!(kernel.contains(out.parts[1], right));
        assert_eq!(
            out.history.origin_of(left),
            Some(&Origin::Unchanged { source: left })
        );
        // The cut face is shared by both pieces.
        let a = kernel.sub_shapes(out.parts[0], ShapeType::Face).unwrap();
        let b = kernel.sub_shapes(out.parts[1], ShapeType::Face).unwrap();
        assert_eq!(a.iter().filter(|f| b.contains(f)).count(), 1);
        assert_relative_eq!(kernel.volume(out.shape).unwrap(), 1000.0);
    }

    #[test]
    fn test_axis_end_points_are_labelled() {
        let mut kernel = MockKernel::new();
        let axis = kernel.make_axis([0.0; 3], [1.0, 0.0, 0.0]).unwrap();
        let start = labelled(&axis, "Start");
        let end = labelled(&axis, "End");
        let vertices = kernel.sub_shapes(axis.shape, ShapeType::Vertex).unwrap();
        assert_eq!(vertices.len(), 2);
        assert!(vertices.contains(&start) && vertices.contains(&end));
        assert_eq!(kernel.point(start).unwrap(), [0.0; 3]);
    }

    #[test]
    fn test_plane_boundary_is_labelled() {
        let mut kernel = MockKernel::new();
        let plane = kernel.make_plane([0.0; 3], [0.0, 0.0, 1.0]).unwrap();
        for label in ["Edge_1", "Edge_4", "Vertex_1", "Vertex_4"] {
            labelled(&plane, label);
        }
        assert_eq!(plane.history.records.len(), 8);
    }

    #[test]
    fn test_fuse_removes_shared_face() {
        let mut kernel = MockKernel::new();
        let body = unit_box(&mut kernel, 10.0);
        let plane = kernel.make_plane([5.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        let split = kernel.partition(&[body.shape], &[plane.shape]).unwrap();

        let fused = kernel.fuse(&split.parts).unwrap();
        assert_eq!(fused.parts.len(), 1);
        assert_eq!(kernel.sub_shapes(fused.shape, ShapeType::Face).unwrap().len(), 10);
        assert_relative_eq!(kernel.volume(fused.shape).unwrap(), 1000.0);
        assert_eq!(fused.history.deleted.len(), 1);
    }

    #[test]
    fn test_fuse_separately_built_touching_boxes() {
        let mut kernel = MockKernel::new();
        let a = unit_box(&mut kernel, 10.0);
        let b = kernel.make_box([10.0, 0.0, 0.0], [10.0; 3]).unwrap();
        let fused = kernel.fuse(&[a.shape, b.shape]).unwrap();
        assert_eq!(kernel.shape_type(fused.shape).unwrap(), ShapeType::Solid);
        assert_eq!(kernel.sub_shapes(fused.shape, ShapeType::Face).unwrap().len(), 10);
        assert_relative_eq!(kernel.volume(fused.shape).unwrap(), 2000.0);
        assert_eq!(fused.history.deleted.len(), 2);

        let c = kernel.make_box([30.0, 0.0, 0.0], [10.0; 3]).unwrap();
        let apart = kernel.fuse(&[a.shape, c.shape]).unwrap();
        assert_eq!(apart.parts.len(), 2);
    }

    #[test]
    fn test_fuse_overlapping_boxes_not_supported() {
        let mut kernel = MockKernel::new();
        let a = unit_box(&mut kernel, 10.0);
        let b = kernel.make_box([5.0; 3], [10.0; 3]).unwrap();
        let err = kernel.fuse(&[a.shape, b.shape]).unwrap_err();
        assert!(matches!(err, KernelError::NotSupported { .. }));
    }

    #[test]
    fn test_fillet_single_edge() {
        let mut kernel = MockKernel::new();
        let body = unit_box(&mut kernel, 10.0);
        let top = labelled(&body, "Top");
        let front = labelled(&body, "Front");
        let top_edges = kernel.sub_shapes(top, ShapeType::Edge).unwrap();
        let front_edges = kernel.sub_shapes(front, ShapeType::Edge).unwrap();
        let edge = *top_edges.iter().find(|e| front_edges.contains(e)).unwrap();

        let out = kernel.fillet(body.shape, &[edge], 2.0).unwrap();
        assert_eq!(kernel.sub_shapes(out.shape, ShapeType::Face).unwrap().len(), 7);
        let expected = 1000.0 - (1.0 - PI / 4.0) * 4.0 * 10.0;
        assert_relative_eq!(kernel.volume(out.shape).unwrap(), expected, epsilon = 1e-9);
        let generated: Vec<_> = out
            .history
            .records
            .iter()
            .filter(|(_, o)| matches!(o, Origin::Generated { sources } if sources == &vec![edge]))
            .collect();
        assert_eq!(generated.len(), 1);
    }

    #[test]
    fn test_fillet_invalid_radius() {
        let mut kernel = MockKernel::new();
        let body = unit_box(&mut kernel, 10.0);
        let edge = kernel.sub_shapes(body.shape, ShapeType::Edge).unwrap()[0];
        let err = kernel.fillet(body.shape, &[edge], 20.0).unwrap_err();
        assert!(matches!(err, KernelError::FilletFailed { .. }));
        let err = kernel.fillet(body.shape, &[edge], -1.0).unwrap_err();
        assert!(matches!(err, KernelError::FilletFailed { .. }));
    }

    #[test]
    fn test_deterministic_ids() {
        let mut k1 = MockKernel::new();
        let mut k2 = MockKernel::new();
        let a = unit_box(&mut k1, 1.0);
        let b = unit_box(&mut k2, 1.0);
        assert_eq!(a.shape, b.shape);
        assert_eq!(
            k1.sub_shapes(a.shape, ShapeType::Face).unwrap(),
            k2.sub_shapes(b.shape, ShapeType::Face).unwrap()
        );
    }
}
