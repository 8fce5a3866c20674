use crate::types::*;

/// Core geometry kernel trait. Provides all shape construction and modification operations.
/// Every operation returns the produced shape together with its modification history.
pub trait Kernel {
    /// A standalone vertex.
    fn make_point(&mut self, position: [f64; 3]) -> Result<KernelOutput, KernelError>;

    /// A straight construction edge starting at `origin`.
    fn make_axis(
        &mut self,
        origin: [f64; 3],
        direction: [f64; 3],
    ) -> Result<KernelOutput, KernelError>;

    /// A bounded square planar construction face.
    fn make_plane(
        &mut self,
        origin: [f64; 3],
        normal: [f64; 3],
    ) -> Result<KernelOutput, KernelError>;

    /// Axis-aligned box with one corner at `origin`.
    fn make_box(&mut self, origin: [f64; 3], size: [f64; 3]) -> Result<KernelOutput, KernelError>;

    /// Right circular cylinder standing on `base`.
    fn make_cylinder(
        &mut self,
        base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
        height: f64,
    ) -> Result<KernelOutput, KernelError>;

    /// Planar faces from closed profiles; one part per labelled profile.
    fn make_profile_faces(
        &mut self,
        frame: &PlaneFrame,
        profiles: &[(String, Profile)],
    ) -> Result<KernelOutput, KernelError>;

    /// Sweep a planar face along `direction` by `height`.
    fn extrude(
        &mut self,
        face: ShapeId,
        direction: [f64; 3],
        height: f64,
    ) -> Result<KernelOutput, KernelError>;

    /// Split solids by planar tool faces; one part per piece.
    fn partition(
        &mut self,
        objects: &[ShapeId],
        tools: &[ShapeId],
    ) -> Result<KernelOutput, KernelError>;

    /// Boolean union of solids.
    fn fuse(&mut self, objects: &[ShapeId]) -> Result<KernelOutput, KernelError>;

    /// Round the given edges of a solid.
    fn fillet(
        &mut self,
        solid: ShapeId,
        edges: &[ShapeId],
        radius: f64,
    ) -> Result<KernelOutput, KernelError>;

    /// Group shapes into a compound without modifying them.
    fn compound(&mut self, shapes: &[ShapeId]) -> Result<KernelOutput, KernelError>;
}

/// Read-only queries over kernel shapes.
pub trait KernelIntrospect {
    fn shape_type(&self, shape: ShapeId) -> Result<ShapeType, KernelError>;

    /// Direct children in the shape graph.
    fn children(&self, shape: ShapeId) -> Result<Vec<ShapeId>, KernelError>;

    /// All sub-shapes of `shape_type` (including `shape` itself), in
    /// depth-first enumeration order without duplicates.
    fn sub_shapes(&self, shape: ShapeId, shape_type: ShapeType)
        -> Result<Vec<ShapeId>, KernelError>;

    /// True when `part` is `whole` or one of its sub-shapes.
    fn contains(&self, whole: ShapeId, part: ShapeId) -> bool;

    fn surface(&self, face: ShapeId) -> Result<Surface, KernelError>;

    fn curve(&self, edge: ShapeId) -> Result<Curve, KernelError>;

    fn point(&self, vertex: ShapeId) -> Result<[f64; 3], KernelError>;

    /// Total face area of a shape.
    fn area(&self, shape: ShapeId) -> Result<f64, KernelError>;

    /// Total solid volume of a shape; zero for shapes without solids.
    fn volume(&self, shape: ShapeId) -> Result<f64, KernelError>;

    /// Total edge length of a shape.
    fn length(&self, shape: ShapeId) -> Result<f64, KernelError>;

    /// Average of the shape's vertex positions.
    fn centroid(&self, shape: ShapeId) -> Result<[f64; 3], KernelError>;

    /// Axis-aligned bounds as (min, max).
    fn bounding_box(&self, shape: ShapeId) -> Result<([f64; 3], [f64; 3]), KernelError>;
}
