use geom_kernel::{Curve, ShapeType};
use modeling_ops::{execute_box, execute_cylinder};

use super::{expect_type, ExecContext, FeatureKind};
use crate::attributes::{AttrKind, AttrSpec};
use crate::results::FeatureOutput;
use crate::types::FeatureError;

/// Axis-aligned box of size `dx, dy, dz` with a corner at `x, y, z`.
pub struct BoxKind;

impl FeatureKind for BoxKind {
    fn kind(&self) -> &'static str {
        "Box"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("dx", AttrKind::Scalar),
            AttrSpec::required("dy", AttrKind::Scalar),
            AttrSpec::required("dz", AttrKind::Scalar),
            AttrSpec::optional("x", AttrKind::Scalar),
            AttrSpec::optional("y", AttrKind::Scalar),
            AttrSpec::optional("z", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let size = [ctx.scalar("dx")?, ctx.scalar("dy")?, ctx.scalar("dz")?];
        let origin = [
            ctx.scalar_or("x", 0.0)?,
            ctx.scalar_or("y", 0.0)?,
            ctx.scalar_or("z", 0.0)?,
        ];
        let op = execute_box(ctx.kernel, origin, size)?;
        ctx.name_results(op, false)
    }
}

/// Right circular cylinder standing on an optional base vertex along an optional axis.
pub struct CylinderKind;

impl FeatureKind for CylinderKind {
    fn kind(&self) -> &'static str {
        "Cylinder"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("radius", AttrKind::Scalar),
            AttrSpec::required("height", AttrKind::Scalar),
            AttrSpec::optional("base", AttrKind::Selection),
            AttrSpec::optional("axis", AttrKind::Selection),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let radius = ctx.scalar("radius")?;
        let height = ctx.scalar("height")?;
        let base = match ctx.optional_selection("base")? {
            Some(vertex) => {
                expect_type(&vertex, ShapeType::Vertex)?;
                ctx.introspect().point(vertex.shape)?
            }
            None => [0.0; 3],
        };
        let axis = match ctx.optional_selection("axis")? {
            Some(edge) => {
                expect_type(&edge, ShapeType::Edge)?;
                match ctx.introspect().curve(edge.shape)? {
                    Curve::Line { start, end } => geom_kernel::geometry::sub(end, start),
                    Curve::Circle { axis, .. } => axis,
                }
            }
            None => [0.0, 0.0, 1.0],
        };
        let op = execute_cylinder(ctx.kernel, base, axis, radius, height)?;
        ctx.name_results(op, false)
    }
}
