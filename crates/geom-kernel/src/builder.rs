//! Shape arena and topology builder used by the mock kernel.
//!
//! The builder shares vertices, edges and faces by geometry: a vertex at the
//! same (quantised) position, an edge between the same vertices, or a face
//! bounded by the same edges is the same shape. Seeding the cache with input
//! shapes makes untouched faces of an operation keep their identity.

use std::collections::HashMap;

use crate::geometry;
use crate::types::*;

/// Geometry carried by a mock shape.
#[derive(Debug, Clone)]
pub enum Geom {
    None,
    Vertex([f64; 3]),
    Edge(Curve),
    Face {
        surface: Surface,
        /// Boundary polygon, used by operations that rebuild faces.
        outline: Vec<[f64; 3]>,
        area: f64,
    },
    Solid {
        volume: f64,
        /// Set when the solid is an axis-aligned box, as (min, max).
        aabb: Option<([f64; 3], [f64; 3])>,
    },
}

#[derive(Debug, Clone)]
pub struct MockShape {
    pub kind: ShapeType,
    pub geom: Geom,
    pub children: Vec<ShapeId>,
}

/// Storage for every shape the kernel has produced.
#[derive(Debug, Default)]
pub struct Arena {
    shapes: HashMap<ShapeId, MockShape>,
    next_id: u64,
}

impl Arena {
    pub fn alloc(&mut self, shape: MockShape) -> ShapeId {
        self.next_id += 1;
        let id = ShapeId(self.next_id);
        self.shapes.insert(id, shape);
        id
    }

    pub fn get(&self, id: ShapeId) -> Result<&MockShape, KernelError> {
        self.shapes
            .get(&id)
            .ok_or(KernelError::EntityNotFound { id })
    }

    pub fn expect_kind(&self, id: ShapeId, expected: ShapeType) -> Result<&MockShape, KernelError> {
        let shape = self.get(id)?;
        if shape.kind != expected {
            return Err(KernelError::WrongShapeType {
                id,
                expected,
                found: shape.kind,
            });
        }
        Ok(shape)
    }

    /// Depth-first sub-shapes of a type, `root` included, without duplicates.
    pub fn collect(&self, root: ShapeId, kind: ShapeType) -> Result<Vec<ShapeId>, KernelError> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let shape = self.get(id)?;
            if shape.kind == kind {
                out.push(id);
            }
            if shape.kind < kind || shape.kind == ShapeType::Compound {
                for child in shape.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        Ok(out)
    }

    pub fn vertex_point(&self, id: ShapeId) -> Result<[f64; 3], KernelError> {
        match self.expect_kind(id, ShapeType::Vertex)?.geom {
            Geom::Vertex(p) => Ok(p),
            _ => Err(KernelError::EntityNotFound { id }),
        }
    }

    pub fn face_geom(&self, id: ShapeId) -> Result<(Surface, &[[f64; 3]], f64), KernelError> {
        match &self.expect_kind(id, ShapeType::Face)?.geom {
            Geom::Face {
                surface,
                outline,
                area,
            } => Ok((*surface, outline.as_slice(), *area)),
            _ => Err(KernelError::EntityNotFound { id }),
        }
    }

    pub fn edge_curve(&self, id: ShapeId) -> Result<Curve, KernelError> {
        match self.expect_kind(id, ShapeType::Edge)?.geom {
            Geom::Edge(curve) => Ok(curve),
            _ => Err(KernelError::EntityNotFound { id }),
        }
    }

    pub fn solid_geom(&self, id: ShapeId) -> Result<(f64, Option<([f64; 3], [f64; 3])>), KernelError> {
        match self.expect_kind(id, ShapeType::Solid)?.geom {
            Geom::Solid { volume, aabb } => Ok((volume, aabb)),
            _ => Err(KernelError::EntityNotFound { id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EdgeKey {
    Line(ShapeId, ShapeId),
    Circle(ShapeId, [i64; 3]),
}

/// Geometry-keyed cache of vertices, edges and faces for one operation.
#[derive(Debug)]
pub struct TopoCache {
    quantum: f64,
    vertices: HashMap<[i64; 3], ShapeId>,
    edges: HashMap<EdgeKey, ShapeId>,
    faces: HashMap<Vec<ShapeId>, ShapeId>,
}

impl TopoCache {
    pub fn new(coincidence: f64) -> Self {
        Self {
            quantum: coincidence.max(1e-9) * 10.0,
            vertices: HashMap::new(),
            edges: HashMap::new(),
            faces: HashMap::new(),
        }
    }

    fn key(&self, p: [f64; 3]) -> [i64; 3] {
        [
            (p[0] / self.quantum).round() as i64,
            (p[1] / self.quantum).round() as i64,
            (p[2] / self.quantum).round() as i64,
        ]
    }

    /// Register every vertex, edge and face of `root` so later builds reuse them.
    pub fn seed(&mut self, arena: &Arena, root: ShapeId) -> Result<(), KernelError> {
        for v in arena.collect(root, ShapeType::Vertex)? {
            let key = self.key(arena.vertex_point(v)?);
            self.vertices.entry(key).or_insert(v);
        }
        for e in arena.collect(root, ShapeType::Edge)? {
            let key = self.edge_key(arena, e)?;
            self.edges.entry(key).or_insert(e);
        }
        for f in arena.collect(root, ShapeType::Face)? {
            let mut edges = arena.collect(f, ShapeType::Edge)?;
            edges.sort();
            self.faces.entry(edges).or_insert(f);
        }
        Ok(())
    }

    fn edge_key(&self, arena: &Arena, edge: ShapeId) -> Result<EdgeKey, KernelError> {
        let shape = arena.get(edge)?;
        match arena.edge_curve(edge)? {
            Curve::Line { .. } => {
                let a = shape.children[0];
                let b = shape.children[shape.children.len() - 1];
                Ok(EdgeKey::Line(a.min(b), a.max(b)))
            }
            Curve::Circle { center, .. } => Ok(EdgeKey::Circle(shape.children[0], self.key(center))),
        }
    }

    pub fn vertex(&mut self, arena: &mut Arena, p: [f64; 3]) -> ShapeId {
        let key = self.key(p);
        if let Some(id) = self.vertices.get(&key) {
            return *id;
        }
        let id = arena.alloc(MockShape {
            kind: ShapeType::Vertex,
            geom: Geom::Vertex(p),
            children: Vec::new(),
        });
        self.vertices.insert(key, id);
        id
    }

    pub fn line_edge(&mut self, arena: &mut Arena, a: [f64; 3], b: [f64; 3]) -> ShapeId {
        let va = self.vertex(arena, a);
        let vb = self.vertex(arena, b);
        let key = EdgeKey::Line(va.min(vb), va.max(vb));
        if let Some(id) = self.edges.get(&key) {
            return *id;
        }
        let id = arena.alloc(MockShape {
            kind: ShapeType::Edge,
            geom: Geom::Edge(Curve::Line { start: a, end: b }),
            children: vec![va, vb],
        });
        self.edges.insert(key, id);
        id
    }

    /// Full circle closed at `seam`.
    pub fn circle_edge(
        &mut self,
        arena: &mut Arena,
        center: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        seam: [f64; 3],
    ) -> ShapeId {
        let v = self.vertex(arena, seam);
        let key = EdgeKey::Circle(v, self.key(center));
        if let Some(id) = self.edges.get(&key) {
            return *id;
        }
        let id = arena.alloc(MockShape {
            kind: ShapeType::Edge,
            geom: Geom::Edge(Curve::Circle {
                center,
                axis: geometry::normalize(axis),
                radius,
            }),
            children: vec![v],
        });
        self.edges.insert(key, id);
        id
    }

    /// Face bounded by the given edges (one wire).
    pub fn face(
        &mut self,
        arena: &mut Arena,
        surface: Surface,
        outline: Vec<[f64; 3]>,
        area: f64,
        edges: Vec<ShapeId>,
    ) -> ShapeId {
        let mut key = edges.clone();
        key.sort();
        key.dedup();
        if let Some(id) = self.faces.get(&key) {
            return *id;
        }
        let wire = arena.alloc(MockShape {
            kind: ShapeType::Wire,
            geom: Geom::None,
            children: edges,
        });
        let id = arena.alloc(MockShape {
            kind: ShapeType::Face,
            geom: Geom::Face {
                surface,
                outline,
                area,
            },
            children: vec![wire],
        });
        self.faces.insert(key, id);
        id
    }

    /// Face bounded by a closed polygon; edges join consecutive points.
    pub fn polygon_face(
        &mut self,
        arena: &mut Arena,
        surface: Surface,
        outline: Vec<[f64; 3]>,
        area: Option<f64>,
    ) -> ShapeId {
        let edges = (0..outline.len())
            .map(|i| self.line_edge(arena, outline[i], outline[(i + 1) % outline.len()]))
            .collect();
        let area = area.unwrap_or_else(|| geometry::polygon_area(&outline));
        self.face(arena, surface, outline, area, edges)
    }

    /// Planar face of a polygon, normal from the winding.
    pub fn planar_polygon(&mut self, arena: &mut Arena, outline: Vec<[f64; 3]>) -> ShapeId {
        let normal = geometry::normalize(geometry::newell(&outline));
        let surface = Surface::Plane {
            origin: outline[0],
            normal,
        };
        self.polygon_face(arena, surface, outline, None)
    }
}

/// Closed shell and solid around `faces`. Solids are never shared.
pub fn solid(
    arena: &mut Arena,
    faces: Vec<ShapeId>,
    volume: f64,
    aabb: Option<([f64; 3], [f64; 3])>,
) -> ShapeId {
    let shell = arena.alloc(MockShape {
        kind: ShapeType::Shell,
        geom: Geom::None,
        children: faces,
    });
    arena.alloc(MockShape {
        kind: ShapeType::Solid,
        geom: Geom::Solid { volume, aabb },
        children: vec![shell],
    })
}

pub fn container(arena: &mut Arena, kind: ShapeType, children: Vec<ShapeId>) -> ShapeId {
    arena.alloc(MockShape {
        kind,
        geom: Geom::None,
        children,
    })
}

/// Corners of an axis-aligned box face, counter-clockwise seen from outside.
pub fn box_faces(min: [f64; 3], max: [f64; 3]) -> [(&'static str, [f64; 3], Vec<[f64; 3]>); 6] {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    [
        (
            "Bottom",
            [0.0, 0.0, -1.0],
            vec![[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
        ),
        (
            "Top",
            [0.0, 0.0, 1.0],
            vec![[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
        ),
        (
            "Front",
            [0.0, -1.0, 0.0],
            vec![[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
        ),
        (
            "Back",
            [0.0, 1.0, 0.0],
            vec![[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
        ),
        (
            "Left",
            [-1.0, 0.0, 0.0],
            vec![[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
        ),
        (
            "Right",
            [1.0, 0.0, 0.0],
            vec![[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
        ),
    ]
}

/// Build an axis-aligned box solid; returns the solid and its faces in `box_faces` order.
pub fn box_solid(
    arena: &mut Arena,
    cache: &mut TopoCache,
    min: [f64; 3],
    max: [f64; 3],
) -> (ShapeId, Vec<ShapeId>) {
    let faces: Vec<ShapeId> = box_faces(min, max)
        .into_iter()
        .map(|(_, normal, outline)| {
            let surface = Surface::Plane {
                origin: outline[0],
                normal,
            };
            cache.polygon_face(arena, surface, outline, None)
        })
        .collect();
    let d = geometry::sub(max, min);
    let solid = solid(arena, faces.clone(), d[0] * d[1] * d[2], Some((min, max)));
    (solid, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_geometry_is_reused() {
        let mut arena = Arena::default();
        let mut cache = TopoCache::new(1e-7);
        let a = cache.line_edge(&mut arena, [0.0; 3], [1.0, 0.0, 0.0]);
        let b = cache.line_edge(&mut arena, [1.0, 0.0, 0.0], [0.0; 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn box_topology_counts() {
        let mut arena = Arena::default();
        let mut cache = TopoCache::new(1e-7);
        let (solid, faces) = box_solid(&mut arena, &mut cache, [0.0; 3], [1.0, 2.0, 3.0]);
        assert_eq!(faces.len(), 6);
        assert_eq!(arena.collect(solid, ShapeType::Face).unwrap().len(), 6);
        assert_eq!(arena.collect(solid, ShapeType::Edge).unwrap().len(), 12);
        assert_eq!(arena.collect(solid, ShapeType::Vertex).unwrap().len(), 8);
    }

    #[test]
    fn seeded_cache_keeps_face_identity() {
        let mut arena = Arena::default();
        let mut first = TopoCache::new(1e-7);
        let (solid, faces) = box_solid(&mut arena, &mut first, [0.0; 3], [1.0; 3]);

        let mut second = TopoCache::new(1e-7);
        second.seed(&arena, solid).unwrap();
        let (_, again) = box_solid(&mut arena, &mut second, [0.0; 3], [1.0; 3]);
        assert_eq!(faces, again);
    }
}
