use geom_kernel::{ShapeId, ShapeType};
use shape_types::{FilterArg, FilterDecl, FilterSet};
use tracing::warn;

use super::{ExecContext, FeatureKind};
use crate::attributes::{AttrKind, AttrSpec, AttrValue, AttributeStore};
use crate::filters::{self, FilterContext, ResolvedArg};
use crate::resolve::Holder;
use crate::results::{FeatureOutput, GroupMember};
use crate::types::{FeatureError, UnresolvedReason};

/// A named collection of sub-shapes of one type.
///
/// Members are the explicit selections of `group_list`, in order, followed
/// by every visible shape of the list type accepted by all of its filters.
/// Membership is rebuilt from scratch on every recompute.
pub struct GroupKind;

impl FeatureKind for GroupKind {
    fn kind(&self) -> &'static str {
        "Group"
    }

    fn attributes(&self) -> &'static [AttrSpec] {
        const ATTRS: &[AttrSpec] = &[AttrSpec::required("group_list", AttrKind::SelectionList)];
        ATTRS
    }

    fn validate(&self, attrs: &AttributeStore) -> Result<(), FeatureError> {
        let list = attrs
            .selection_list("group_list")
            .ok_or_else(|| FeatureError::MissingAttribute {
                name: "group_list".into(),
            })?;
        if list.shape_type.is_none() {
            return Err(FeatureError::Invalid {
                reason: "group_list has no shape type".into(),
            });
        }
        Ok(())
    }

    fn on_attribute_set(&self, name: &str, value: &mut AttrValue) -> Option<String> {
        let AttrValue::SelectionList(list) = value else {
            return None;
        };
        if name != "group_list" || !list.filters.has_empty_selection_arg() {
            return None;
        }
        let removed = list.filters.names().join(", ");
        list.filters = FilterSet::default();
        let message = format!("filters [{removed}] removed: a filter argument is an empty selection");
        warn!(%message, "filter set cleared");
        Some(message)
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<FeatureOutput, FeatureError> {
        let list = ctx
            .attrs()
            .selection_list("group_list")
            .ok_or_else(|| FeatureError::MissingAttribute {
                name: "group_list".into(),
            })?;
        let shape_type = list.shape_type.ok_or_else(|| FeatureError::Invalid {
            reason: "group_list has no shape type".into(),
        })?;
        let filtered = !list.filters.is_empty();

        let mut members: Vec<GroupMember> = Vec::new();
        for item in &list.items {
            match ctx.resolve(item, true) {
                Ok(shapes) => {
                    for shape in shapes {
                        if !members.iter().any(|m| m.shape == shape.shape) {
                            members.push(GroupMember {
                                shape: shape.shape,
                                shape_type: shape.shape_type,
                                name: shape.name,
                            });
                        }
                    }
                }
                // Shapes that vanished on recompute; filters still find their successors.
                Err(unresolved)
                    if filtered
                        && matches!(
                            unresolved.reason,
                            UnresolvedReason::NotVisible(_) | UnresolvedReason::Orphaned
                        ) =>
                {
                    warn!(feature = %ctx.feature.name, %unresolved, "group selection skipped");
                    ctx.warnings.push(unresolved.to_string());
                }
                Err(unresolved) => return Err(unresolved.into()),
            }
        }

        let mut active: Vec<(&FilterDecl, Vec<ResolvedArg>)> = Vec::new();
        let mut dropped = Vec::new();
        for decl in &list.filters.filters {
            match resolve_args(ctx, decl)? {
                Some(args) => active.push((decl, args)),
                None => {
                    warn!(feature = %ctx.feature.name, filter = %decl.name, "filter dropped: argument resolves to nothing");
                    ctx.warnings
                        .push(format!("filter {} dropped: argument resolves to nothing", decl.name));
                    dropped.push(decl.name.clone());
                }
            }
        }

        if !active.is_empty() {
            let leaves = scope_leaves(ctx);
            let accepted = accepted_by(ctx, &leaves, shape_type, &active)?;
            for shape in accepted {
                if members.iter().any(|m| m.shape == shape) {
                    continue;
                }
                let name = leaves
                    .iter()
                    .rev()
                    .find_map(|h| h.entry.table.name_of(shape).map(|n| n.to_string()))
                    .or_else(|| {
                        leaves
                            .iter()
                            .rev()
                            .find(|h| ctx.introspect().contains(h.entry.shape, shape))
                            .map(|h| h.entry.name.clone())
                    })
                    .unwrap_or_default();
                members.push(GroupMember {
                    shape,
                    shape_type,
                    name,
                });
            }
        }

        Ok(FeatureOutput {
            members,
            dropped_filters: dropped,
            ..FeatureOutput::default()
        })
    }
}

/// Visible results of the non-construction features before the group.
fn scope_leaves<'a>(ctx: &mut ExecContext<'a>) -> Vec<Holder<'a>> {
    let view = ctx.view;
    let leaves: Vec<Holder<'a>> = view
        .visible_leaves(ctx.scope)
        .into_iter()
        .filter(|h| !view.is_construction(h.feature))
        .collect();
    ctx.dependencies.extend(leaves.iter().map(|h| h.feature.id));
    leaves
}

/// Sub-shapes of `shape_type` in `leaves` accepted by every filter of `active`.
fn accepted_by(
    ctx: &ExecContext<'_>,
    leaves: &[Holder<'_>],
    shape_type: ShapeType,
    active: &[(&FilterDecl, Vec<ResolvedArg>)],
) -> Result<Vec<ShapeId>, FeatureError> {
    let mut candidates: Vec<ShapeId> = Vec::new();
    for holder in leaves {
        for shape in ctx.introspect().sub_shapes(holder.entry.shape, shape_type)? {
            if !candidates.contains(&shape) {
                candidates.push(shape);
            }
        }
    }
    let filter_ctx = FilterContext {
        kernel: ctx.introspect(),
        scope: leaves.iter().map(|h| h.entry.shape).collect(),
        linear_tolerance: ctx.config.linear_tolerance,
        angular_tolerance: ctx.config.angular_tolerance,
    };
    filters::evaluate(ctx.filters, &filter_ctx, shape_type, active, &candidates)
        .map_err(|e| FeatureError::Invalid { reason: e.to_string() })
}

/// Arguments of `decl` with selections resolved and nested filters evaluated.
///
/// `None` when a selection argument, or the shapes a nested filter accepts,
/// come to nothing.
fn resolve_args(ctx: &mut ExecContext<'_>, decl: &FilterDecl) -> Result<Option<Vec<ResolvedArg>>, FeatureError> {
    let mut args = Vec::new();
    for arg in &decl.args {
        let resolved = match arg {
            FilterArg::Selection(_) | FilterArg::SelectionList(_) => {
                let mut shapes = Vec::new();
                for selection in arg.selections() {
                    if selection.is_empty() {
                        continue;
                    }
                    if let Ok(found) = ctx.resolve(selection, true) {
                        shapes.extend(found.into_iter().map(|s| s.shape));
                    }
                }
                if shapes.is_empty() {
                    return Ok(None);
                }
                ResolvedArg::Shapes(shapes)
            }
            FilterArg::Filter { shape_type, filter } => {
                let Some(inner) = resolve_args(ctx, filter)? else {
                    return Ok(None);
                };
                let leaves = scope_leaves(ctx);
                let shapes = accepted_by(ctx, &leaves, *shape_type, &[(filter.as_ref(), inner)])?;
                if shapes.is_empty() {
                    return Ok(None);
                }
                ResolvedArg::Shapes(shapes)
            }
            FilterArg::Bool(b) => ResolvedArg::Bool(*b),
            FilterArg::Real(r) => ResolvedArg::Real(*r),
            FilterArg::Text(t) => ResolvedArg::Text(t.clone()),
        };
        args.push(resolved);
    }
    Ok(Some(args))
}
