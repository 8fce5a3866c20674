//! Resolution of bracketed adjacency names (`[F1][F2][F3]`).

use geom_kernel::{KernelError, KernelIntrospect, ShapeId, ShapeType};

/// Sub-shapes of `shape_type` under `scope` that lie inside at least one
/// shape of every item set, in enumeration order.
///
/// An item set holds the shapes one bracketed item resolved to.
pub fn intersect(
    introspect: &dyn KernelIntrospect,
    scope: &[ShapeId],
    items: &[Vec<ShapeId>],
    shape_type: ShapeType,
) -> Result<Vec<ShapeId>, KernelError> {
    if items.is_empty() || items.iter().any(|set| set.is_empty()) {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for root in scope {
        for candidate in introspect.sub_shapes(*root, shape_type)? {
            if found.contains(&candidate) {
                continue;
            }
            let shared = items
                .iter()
                .all(|set| set.iter().any(|s| *s != candidate && introspect.contains(*s, candidate)));
            if shared {
                found.push(candidate);
            }
        }
    }
    Ok(found)
}

/// Pick the match named by a weak index (1-based), or the only match.
///
/// Returns `None` when nothing matched, when the index is out of range, or
/// when several shapes match and no index disambiguates them.
pub fn pick(matches: &[ShapeId], weak: Option<usize>) -> Option<ShapeId> {
    match weak {
        Some(index) if index >= 1 => matches.get(index - 1).copied(),
        Some(_) => None,
        None => match matches {
            [single] => Some(*single),
            _ => None,
        },
    }
}
