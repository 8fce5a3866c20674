use serde::{Deserialize, Serialize};

pub use shape_types::ShapeType;

use crate::geometry;

/// Transient kernel-internal shape identifier.
/// Stable within a single kernel session but NOT across rebuilds.
/// NEVER persisted; persistent references go through topological names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u64);

/// Underlying surface of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    Plane {
        origin: [f64; 3],
        normal: [f64; 3],
    },
    Cylinder {
        origin: [f64; 3],
        axis: [f64; 3],
        radius: f64,
    },
}

/// Underlying curve of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Line {
        start: [f64; 3],
        end: [f64; 3],
    },
    Circle {
        center: [f64; 3],
        axis: [f64; 3],
        radius: f64,
    },
}

impl Curve {
    pub fn length(&self) -> f64 {
        match self {
            Curve::Line { start, end } => geometry::distance(*start, *end),
            Curve::Circle { radius, .. } => 2.0 * std::f64::consts::PI * radius,
        }
    }
}

/// A local 2D frame on a plane, used to place sketch profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneFrame {
    pub origin: [f64; 3],
    pub normal: [f64; 3],
    pub x_dir: [f64; 3],
}

impl PlaneFrame {
    /// Frame with an x direction derived from the normal.
    pub fn from_normal(origin: [f64; 3], normal: [f64; 3]) -> Self {
        let normal = geometry::normalize(normal);
        Self {
            origin,
            normal,
            x_dir: geometry::tangent_x_from_normal(normal),
        }
    }

    pub fn y_dir(&self) -> [f64; 3] {
        geometry::cross(self.normal, self.x_dir)
    }

    /// Map local (u, v) coordinates to world space.
    pub fn to_world(&self, uv: [f64; 2]) -> [f64; 3] {
        let y = self.y_dir();
        geometry::add(
            self.origin,
            geometry::add(geometry::scale(self.x_dir, uv[0]), geometry::scale(y, uv[1])),
        )
    }

    /// Rotate local coordinates around the frame origin.
    pub fn rotate_local(uv: [f64; 2], angle: f64) -> [f64; 2] {
        let (s, c) = angle.sin_cos();
        [uv[0] * c - uv[1] * s, uv[0] * s + uv[1] * c]
    }
}

/// A closed planar region in local frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Profile {
    /// Closed polygon; the last point connects back to the first.
    Polygon { points: Vec<[f64; 2]> },
    Circle { center: [f64; 2], radius: f64 },
}

impl Profile {
    /// Copy of this profile rotated around the frame origin.
    pub fn rotated(&self, angle: f64) -> Profile {
        match self {
            Profile::Polygon { points } => Profile::Polygon {
                points: points
                    .iter()
                    .map(|p| PlaneFrame::rotate_local(*p, angle))
                    .collect(),
            },
            Profile::Circle { center, radius } => Profile::Circle {
                center: PlaneFrame::rotate_local(*center, angle),
                radius: *radius,
            },
        }
    }
}

/// How an output shape relates to the shapes the operation consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Created from scratch, with an operation-specific label (`Top`, `To_Face`).
    Primitive { label: String },
    /// The same shape as an input shape.
    Unchanged { source: ShapeId },
    /// Derived from input shapes of the same type (trimmed, split, merged).
    Modified { sources: Vec<ShapeId> },
    /// Swept or otherwise created from input shapes of a lower type.
    Generated { sources: Vec<ShapeId> },
}

/// Kernel-reported modification relations of one operation.
#[derive(Debug, Clone, Default)]
pub struct ShapeHistory {
    /// Origin of output sub-shapes, in kernel enumeration order.
    pub records: Vec<(ShapeId, Origin)>,
    /// Input shapes that do not survive in the output.
    pub deleted: Vec<ShapeId>,
}

impl ShapeHistory {
    pub fn record(&mut self, shape: ShapeId, origin: Origin) {
        if !self.records.iter().any(|(id, _)| *id == shape) {
            self.records.push((shape, origin));
        }
    }

    pub fn origin_of(&self, shape: ShapeId) -> Option<&Origin> {
        self.records
            .iter()
            .find(|(id, _)| *id == shape)
            .map(|(_, o)| o)
    }

    pub fn is_deleted(&self, shape: ShapeId) -> bool {
        self.deleted.contains(&shape)
    }
}

/// Output of a kernel operation.
#[derive(Debug, Clone)]
pub struct KernelOutput {
    /// The produced shape (a compound when the operation yields several parts).
    pub shape: ShapeId,
    /// Top-level parts, one per produced body or face.
    pub parts: Vec<ShapeId>,
    /// Modification relations.
    pub history: ShapeHistory,
}

/// Errors from kernel operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("boolean operation failed: {reason}")]
    BooleanFailed { reason: String },

    #[error("fillet failed: {reason}")]
    FilletFailed { reason: String },

    #[error("entity not found: {id:?}")]
    EntityNotFound { id: ShapeId },

    #[error("shape {id:?} is a {found}, expected {expected}")]
    WrongShapeType {
        id: ShapeId,
        expected: ShapeType,
        found: ShapeType,
    },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
}
