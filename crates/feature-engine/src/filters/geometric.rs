use geom_kernel::geometry as g;
use geom_kernel::{Curve, ShapeId, ShapeType, Surface};

use super::{Filter, FilterContext, FilterError, Predicate, ResolvedArg};

const Z: [f64; 3] = [0.0, 0.0, 1.0];

fn selection_arg<'r>(filter: &str, args: &'r [ResolvedArg]) -> Result<&'r [ShapeId], FilterError> {
    match args.first() {
        Some(ResolvedArg::Shapes(shapes)) if !shapes.is_empty() => Ok(shapes),
        _ => Err(FilterError::InvalidArgument {
            filter: filter.into(),
            reason: "expects a selection argument".into(),
        }),
    }
}

/// Shapes lying in one of the selected planes.
pub struct OnPlane;

impl Filter for OnPlane {
    fn name(&self) -> &'static str {
        "OnPlane"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        matches!(shape_type, ShapeType::Face | ShapeType::Edge | ShapeType::Vertex)
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let mut planes = Vec::new();
        for shape in selection_arg(self.name(), args)? {
            if let Ok(Surface::Plane { origin, normal }) = ctx.kernel.surface(*shape) {
                planes.push((origin, g::normalize(normal)));
            }
        }
        if planes.is_empty() {
            return Err(FilterError::InvalidArgument {
                filter: self.name().into(),
                reason: "no planar face among the arguments".into(),
            });
        }
        let lin = ctx.linear_tolerance;
        let ang = ctx.angular_tolerance;
        let on = move |p: [f64; 3], (o, n): ([f64; 3], [f64; 3])| g::plane_distance(p, o, n).abs() <= lin;
        Ok(Box::new(move |shape| {
            let kernel = ctx.kernel;
            planes.iter().any(|plane| match kernel.shape_type(shape) {
                Ok(ShapeType::Face) => match kernel.surface(shape) {
                    Ok(Surface::Plane { origin, normal }) => {
                        g::parallel(normal, plane.1, ang) && on(origin, *plane)
                    }
                    _ => false,
                },
                Ok(ShapeType::Edge) => match kernel.curve(shape) {
                    Ok(Curve::Line { start, end }) => on(start, *plane) && on(end, *plane),
                    Ok(Curve::Circle { center, axis, .. }) => {
                        g::parallel(axis, plane.1, ang) && on(center, *plane)
                    }
                    Err(_) => false,
                },
                Ok(ShapeType::Vertex) => kernel.point(shape).is_ok_and(|p| on(p, *plane)),
                _ => false,
            })
        }))
    }
}

/// Shapes lying on one of the selected straight edges (taken as infinite lines).
pub struct OnLine;

impl Filter for OnLine {
    fn name(&self) -> &'static str {
        "OnLine"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        matches!(shape_type, ShapeType::Edge | ShapeType::Vertex)
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let mut lines = Vec::new();
        for shape in selection_arg(self.name(), args)? {
            if let Ok(Curve::Line { start, end }) = ctx.kernel.curve(*shape) {
                lines.push((start, g::sub(end, start)));
            }
        }
        if lines.is_empty() {
            return Err(FilterError::InvalidArgument {
                filter: self.name().into(),
                reason: "no straight edge among the arguments".into(),
            });
        }
        let lin = ctx.linear_tolerance;
        Ok(Box::new(move |shape| {
            let kernel = ctx.kernel;
            lines.iter().any(|(origin, dir)| {
                let on = |p: [f64; 3]| g::line_distance(p, *origin, *dir) <= lin;
                match kernel.shape_type(shape) {
                    Ok(ShapeType::Edge) => {
                        matches!(kernel.curve(shape), Ok(Curve::Line { start, end }) if on(start) && on(end))
                    }
                    Ok(ShapeType::Vertex) => kernel.point(shape).is_ok_and(on),
                    _ => false,
                }
            })
        }))
    }
}

/// Planar faces whose normal is vertical.
pub struct HorizontalFaces;

impl Filter for HorizontalFaces {
    fn name(&self) -> &'static str {
        "HorizontalFaces"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        shape_type == ShapeType::Face
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        _args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let ang = ctx.angular_tolerance;
        Ok(Box::new(move |shape| {
            matches!(ctx.kernel.surface(shape), Ok(Surface::Plane { normal, .. }) if g::parallel(normal, Z, ang))
        }))
    }
}

/// Planar faces with a horizontal normal and cylinders with a vertical axis.
pub struct VerticalFaces;

impl Filter for VerticalFaces {
    fn name(&self) -> &'static str {
        "VerticalFaces"
    }

    fn supports(&self, shape_type: ShapeType) -> bool {
        shape_type == ShapeType::Face
    }

    fn prepare<'a>(
        &self,
        ctx: &'a FilterContext<'a>,
        _args: &[ResolvedArg],
    ) -> Result<Predicate<'a>, FilterError> {
        let ang = ctx.angular_tolerance;
        Ok(Box::new(move |shape| match ctx.kernel.surface(shape) {
            Ok(Surface::Plane { normal, .. }) => g::perpendicular(normal, Z, ang),
            Ok(Surface::Cylinder { axis, .. }) => g::parallel(axis, Z, ang),
            Err(_) => false,
        }))
    }
}
