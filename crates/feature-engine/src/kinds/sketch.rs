use geom_kernel::{PlaneFrame, Profile, ShapeType, Surface};
use modeling_ops::{execute_sketch, RotationPattern};

use super::{expect_type, ExecContext, FeatureKind};
use crate::attributes::{AttrKind, AttrSpec};
use crate::results::FeatureOutput;
use crate::types::FeatureError;

/// Planar regions on a plane, optionally repeated around a centre.
///
/// The result, named after the feature, is a compound of faces named after
/// the region labels (`Sketch_1/Face-Blade`); rotated copies are labelled
/// `<region>_copy<k>`.
pub struct SketchKind;

impl FeatureKind for SketchKind {
    fn kind(&self) -> &'static str {
        "Sketch"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("plane", AttrKind::Selection),
            AttrSpec::required("regions", AttrKind::Regions),
            AttrSpec::optional("rotations", AttrKind::Rotations),
        ];
        ATTRS
    }

    fn is_construction(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let plane = ctx.selection("plane")?;
        expect_type(&plane, ShapeType::Face)?;
        let frame = match ctx.introspect().surface(plane.shape)? {
            Surface::Plane { origin, normal } => PlaneFrame::from_normal(origin, normal),
            Surface::Cylinder { .. } => {
                return Err(FeatureError::Invalid {
                    reason: format!("{} is not planar", plane.name),
                })
            }
        };

        let attrs = ctx.attrs();
        let profiles: Vec<(String, Profile)> = attrs
            .regions("regions")
            .unwrap_or_default()
            .iter()
            .map(|r| (r.label.clone(), r.profile.clone()))
            .collect();

        let mut patterns = Vec::new();
        for spec in attrs.rotations("rotations").unwrap_or_default() {
            let count = ctx.eval(&spec.count)?.round();
            if count.is_nan() || count < 1.0 {
                return Err(FeatureError::Invalid {
                    reason: format!("rotation count {} must be at least 1", spec.count),
                });
            }
            let limit = ctx.config.max_rotation_count;
            if count > limit as f64 {
                return Err(FeatureError::Invalid {
                    reason: format!("rotation count {} exceeds the limit of {limit}", spec.count),
                });
            }
            patterns.push(RotationPattern {
                regions: spec.regions.clone(),
                center: spec.center,
                count: count as usize,
                full_angle: spec.full_angle,
            });
        }

        let op = execute_sketch(ctx.kernel, &frame, &profiles, &patterns)?;
        ctx.name_results(op, true)
    }
}
