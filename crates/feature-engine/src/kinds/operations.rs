use geom_kernel::{ShapeId, ShapeType};
use modeling_ops::{execute_compound, execute_extrude, execute_fillet, execute_fuse, execute_partition};

use super::{ExecContext, FeatureKind};
use crate::attributes::{AttrKind, AttrSpec};
use crate::resolve::ResolvedShape;
use crate::results::FeatureOutput;
use crate::types::FeatureError;

fn shapes(resolved: &[ResolvedShape]) -> Vec<ShapeId> {
    resolved.iter().map(|s| s.shape).collect()
}

/// Sweep faces or sketches along their normal (or `direction`) by `size`.
pub struct ExtrusionKind;

impl FeatureKind for ExtrusionKind {
    fn kind(&self) -> &'static str {
        "Extrusion"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("base", AttrKind::SelectionList),
            AttrSpec::required("size", AttrKind::Scalar),
            AttrSpec::optional("dx", AttrKind::Scalar),
            AttrSpec::optional("dy", AttrKind::Scalar),
            AttrSpec::optional("dz", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let bases = ctx.selection_list("base")?;
        let size = ctx.scalar("size")?;
        // A zero direction extrudes along each face normal.
        let direction = [
            ctx.scalar_or("dx", 0.0)?,
            ctx.scalar_or("dy", 0.0)?,
            ctx.scalar_or("dz", 0.0)?,
        ];
        let op = execute_extrude(ctx.kernel, &shapes(&bases), direction, size)?;
        ctx.name_results(op, false)
    }
}

/// Split solids by planar tools; each piece becomes a sub-result.
pub struct PartitionKind;

impl FeatureKind for PartitionKind {
    fn kind(&self) -> &'static str {
        "Partition"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("base", AttrKind::SelectionList),
            AttrSpec::required("tools", AttrKind::SelectionList),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let objects = ctx.selection_list("base")?;
        let tools = ctx.selection_list("tools")?;
        let op = execute_partition(ctx.kernel, &shapes(&objects), &shapes(&tools))?;
        ctx.name_results(op, false)
    }
}

/// Boolean union; faces shared by touching solids disappear.
pub struct FuseKind;

impl FeatureKind for FuseKind {
    fn kind(&self) -> &'static str {
        "Fuse"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[AttrSpec::required("base", AttrKind::SelectionList)];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let objects = ctx.selection_list("base")?;
        let op = execute_fuse(ctx.kernel, &shapes(&objects))?;
        ctx.name_results(op, false)
    }
}

/// Round edges of one solid by `radius`.
pub struct FilletKind;

impl FeatureKind for FilletKind {
    fn kind(&self) -> &'static str {
        "Fillet"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[
            AttrSpec::required("base", AttrKind::SelectionList),
            AttrSpec::required("radius", AttrKind::Scalar),
        ];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let edges = ctx.selection_list("base")?;
        let radius = ctx.scalar("radius")?;
        if let Some(other) = edges.iter().find(|e| e.shape_type != ShapeType::Edge) {
            return Err(FeatureError::Invalid {
                reason: format!("{} is not an edge", other.name),
            });
        }
        let first = &edges[0];
        if let Some(stray) = edges.iter().find(|e| e.holder != first.holder || e.result != first.result) {
            return Err(FeatureError::Invalid {
                reason: format!("{} and {} belong to different solids", first.name, stray.name),
            });
        }
        let solid = ctx
            .view
            .outputs
            .get(&first.holder)
            .and_then(|o| o.find(&first.result))
            .map(|entry| entry.shape)
            .ok_or_else(|| FeatureError::Invalid {
                reason: format!("result {} is gone", first.result),
            })?;
        let op = execute_fillet(ctx.kernel, solid, &shapes(&edges), radius)?;
        ctx.name_results(op, false)
    }
}

/// Gather results into one compound; each input stays a sub-result.
pub struct CompoundKind;

impl FeatureKind for CompoundKind {
    fn kind(&self) -> &'static str {
        "Compound"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[AttrSpec::required("base", AttrKind::SelectionList)];
        ATTRS
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let members = ctx.selection_list("base")?;
        let op = execute_compound(ctx.kernel, &shapes(&members))?;
        ctx.name_results(op, false)
    }
}
