use geom_kernel::geometry as g;
use geom_kernel::{Curve, ShapeType, Surface};
use modeling_ops::{execute_axis, execute_plane, execute_point};

use super::{expect_type, ExecContext, FeatureKind};
use crate::attributes::{AttrKind, AttrSpec};
use crate::resolve::ResolvedShape;
use crate::results::FeatureOutput;
use crate::types::FeatureError;

/// A named numeric value usable in later expressions.
pub struct ParameterKind;

impl FeatureKind for ParameterKind {
    fn kind(&self) -> &'static str {
        "Parameter"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("variable", AttrKind::Text),
            AttrSpec::required("expression", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let variable = ctx.attrs().text("variable").unwrap_or_default();
        if variable.is_empty() || !variable.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FeatureError::Invalid {
                reason: format!("'{variable}' is not a valid variable name"),
            });
        }
        let value = ctx.scalar("expression")?;
        Ok(FeatureOutput {
            value: Some(value),
            ..FeatureOutput::default()
        })
    }
}

/// A construction vertex at `x, y, z`.
pub struct PointKind;

impl FeatureKind for PointKind {
    fn kind(&self) -> &'static str {
        "Point"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("x", AttrKind::Scalar),
            AttrSpec::required("y", AttrKind::Scalar),
            AttrSpec::required("z", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn is_construction(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let position = [ctx.scalar("x")?, ctx.scalar("y")?, ctx.scalar("z")?];
        let op = execute_point(ctx.kernel, position)?;
        ctx.name_results(op, true)
    }
}

/// A construction axis, either along a straight edge or from a point and a direction.
pub struct AxisKind;

impl FeatureKind for AxisKind {
    fn kind(&self) -> &'static str {
        "Axis"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::optional("edge", AttrKind::Selection),
            AttrSpec::optional("x", AttrKind::Scalar),
            AttrSpec::optional("y", AttrKind::Scalar),
            AttrSpec::optional("z", AttrKind::Scalar),
            AttrSpec::optional("dx", AttrKind::Scalar),
            AttrSpec::optional("dy", AttrKind::Scalar),
            AttrSpec::optional("dz", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn is_construction(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let (origin, direction) = match ctx.optional_selection("edge")? {
            Some(edge) => {
                expect_type(&edge, ShapeType::Edge)?;
                match ctx.introspect().curve(edge.shape)? {
                    Curve::Line { start, end } => (start, g::sub(end, start)),
                    Curve::Circle { center, axis, .. } => (center, axis),
                }
            }
            None => (
                [ctx.scalar_or("x", 0.0)?, ctx.scalar_or("y", 0.0)?, ctx.scalar_or("z", 0.0)?],
                [ctx.scalar_or("dx", 0.0)?, ctx.scalar_or("dy", 0.0)?, ctx.scalar_or("dz", 0.0)?],
            ),
        };
        if g::norm(direction) < ctx.config.linear_tolerance {
            return Err(FeatureError::Invalid {
                reason: "axis direction is zero".into(),
            });
        }
        let op = execute_axis(ctx.kernel, origin, direction)?;
        ctx.name_results(op, true)
    }
}

/// A construction plane.
///
/// Built, in order of precedence, as the mid-plane of two parallel faces
/// (`face` and `other`), as `face` shifted by `offset` along its normal, or
/// from a point (`x, y, z`) and a normal (`nx, ny, nz`).
pub struct PlaneKind;

impl FeatureKind for PlaneKind {
    fn kind(&self) -> &'static str {
        "Plane"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::optional("face", AttrKind::Selection),
            AttrSpec::optional("other", AttrKind::Selection),
            AttrSpec::optional("offset", AttrKind::Scalar),
            AttrSpec::optional("x", AttrKind::Scalar),
            AttrSpec::optional("y", AttrKind::Scalar),
            AttrSpec::optional("z", AttrKind::Scalar),
            AttrSpec::optional("nx", AttrKind::Scalar),
            AttrSpec::optional("ny", AttrKind::Scalar),
            AttrSpec::optional("nz", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn is_construction(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let (origin, normal) = match (ctx.optional_selection("face")?, ctx.optional_selection("other")?) {
            (Some(face), Some(other)) => {
                let n1 = planar(ctx, &face)?;
                let n2 = planar(ctx, &other)?;
                if !g::parallel(n1, n2, ctx.config.angular_tolerance) {
                    return Err(FeatureError::Invalid {
                        reason: format!("{} and {} are not parallel", face.name, other.name),
                    });
                }
                let c1 = ctx.introspect().centroid(face.shape)?;
                let c2 = ctx.introspect().centroid(other.shape)?;
                (g::scale(g::add(c1, c2), 0.5), n1)
            }
            (Some(face), None) => {
                let normal = planar(ctx, &face)?;
                let offset = ctx.scalar_or("offset", 0.0)?;
                let centre = ctx.introspect().centroid(face.shape)?;
                (g::add(centre, g::scale(normal, offset)), normal)
            }
            (None, _) => (
                [ctx.scalar_or("x", 0.0)?, ctx.scalar_or("y", 0.0)?, ctx.scalar_or("z", 0.0)?],
                [ctx.scalar_or("nx", 0.0)?, ctx.scalar_or("ny", 0.0)?, ctx.scalar_or("nz", 1.0)?],
            ),
        };
        if g::norm(normal) < ctx.config.linear_tolerance {
            return Err(FeatureError::Invalid {
                reason: "plane normal is zero".into(),
            });
        }
        let op = execute_plane(ctx.kernel, origin, normal)?;
        ctx.name_results(op, true)
    }
}

fn planar(ctx: &ExecContext<'_>, face: &ResolvedShape) -> Result<[f64; 3], FeatureError> {
    expect_type(face, ShapeType::Face)?;
    match ctx.introspect().surface(face.shape)? {
        Surface::Plane { normal, .. } => Ok(g::normalize(normal)),
        Surface::Cylinder { .. } => Err(FeatureError::Invalid {
            reason: format!("{} is not planar", face.name),
        }),
    }
}

/// Root-document feature owning a part document. Produces no shape itself.
pub struct PartKind;

impl FeatureKind for PartKind {
    fn kind(&self) -> &'static str {
        "Part"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        &[]
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        if ctx.feature.document.is_none() {
            return Err(FeatureError::Invalid {
                reason: "part has no document".into(),
            });
        }
        Ok(FeatureOutput::default())
    }
}
