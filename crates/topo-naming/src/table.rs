use std::collections::HashMap;

use geom_kernel::{KernelError, KernelIntrospect, Origin, ShapeHistory, ShapeId, ShapeType};
use tracing::warn;

use crate::name::Name;

/// One named shape of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedShape {
    pub shape: ShapeId,
    pub shape_type: ShapeType,
    pub name: Name,
}

/// Two-way mapping between the sub-shapes of one result and their names.
///
/// Built from scratch after every execution of the owning feature, so the
/// mapping is valid for exactly one recompute version.
#[derive(Debug, Clone, Default)]
pub struct NamingTable {
    context: String,
    entries: Vec<NamedShape>,
    by_name: HashMap<String, usize>,
    by_shape: HashMap<ShapeId, usize>,
}

/// How a candidate name was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Derivation {
    History,
    Adjacency,
}

impl NamingTable {
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Named shapes in enumeration order: root, parts, faces, edges, vertices.
    pub fn entries(&self) -> &[NamedShape] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name_of(&self, shape: ShapeId) -> Option<&Name> {
        self.by_shape.get(&shape).map(|i| &self.entries[*i].name)
    }

    /// Exact lookup of a name string.
    pub fn shape_of(&self, name: &str) -> Option<ShapeId> {
        self.by_name.get(name).map(|i| self.entries[*i].shape)
    }

    pub fn contains_shape(&self, shape: ShapeId) -> bool {
        self.by_shape.contains_key(&shape)
    }

    /// Entries that carry a weak name.
    pub fn weak_entries(&self) -> impl Iterator<Item = &NamedShape> {
        self.entries.iter().filter(|e| e.name.is_weak())
    }

    fn push(&mut self, shape: ShapeId, shape_type: ShapeType, name: Name) {
        if self.by_shape.contains_key(&shape) {
            return;
        }
        let index = self.entries.len();
        self.by_name.entry(name.to_string()).or_insert(index);
        self.by_shape.insert(shape, index);
        self.entries.push(NamedShape {
            shape,
            shape_type,
            name,
        });
    }

    /// Table of a compound result: the root, each sub-result under its own
    /// name, then every entry of the sub-result tables.
    pub fn compose(context: &str, root: ShapeId, root_type: ShapeType, parts: &[NamingTable]) -> Self {
        let mut table = NamingTable {
            context: context.to_string(),
            ..Default::default()
        };
        table.push(root, root_type, Name::strong(context));
        for part in parts {
            if let Some(first) = part.entries.first() {
                table.push(first.shape, first.shape_type, first.name.clone());
            }
        }
        for part in parts {
            for entry in &part.entries {
                table.push(entry.shape, entry.shape_type, entry.name.clone());
                // Shapes shared by several parts stay reachable under every name.
                if let Some(index) = table.by_shape.get(&entry.shape).copied() {
                    table.by_name.entry(entry.name.to_string()).or_insert(index);
                }
            }
        }
        table
    }

    /// Derive names for every face, edge and vertex of `root`.
    ///
    /// `sources` holds the full names of the operation's input shapes; they
    /// are propagated forward through the kernel-reported `history`:
    /// - primitive shapes get `<context>/<label>`
    /// - unchanged shapes keep their source name
    /// - modified/generated shapes get `<context>/Modified_<Type>&<source>&...`
    ///   with sources in kernel order
    /// - edges and vertices without history are named by the faces that
    ///   contain them (`[F1][F2]`), vertices falling back to their edges
    /// - names still shared by several shapes become weak, numbered in
    ///   enumeration order
    pub fn derive(
        context: &str,
        root: ShapeId,
        history: &ShapeHistory,
        sources: &HashMap<ShapeId, String>,
        introspect: &dyn KernelIntrospect,
    ) -> Result<Self, KernelError> {
        let mut table = NamingTable {
            context: context.to_string(),
            ..Default::default()
        };
        let root_type = introspect.shape_type(root)?;
        table.push(root, root_type, Name::strong(context));

        let faces: Vec<ShapeId> = introspect
            .sub_shapes(root, ShapeType::Face)?
            .into_iter()
            .filter(|f| *f != root)
            .collect();
        let mut face_names: HashMap<ShapeId, String> = HashMap::new();
        let candidates = faces
            .iter()
            .map(|f| {
                let name = history_candidate(context, *f, ShapeType::Face, history, sources)
                    .unwrap_or_else(|| format!("{context}/Face"));
                (*f, name, Derivation::History)
            })
            .collect::<Vec<_>>();
        for (shape, name) in settle(candidates, |_| None) {
            face_names.insert(shape, name.to_string());
            table.push(shape, ShapeType::Face, name);
        }

        // Containment maps in face enumeration order.
        let mut edge_faces: HashMap<ShapeId, Vec<ShapeId>> = HashMap::new();
        let mut vertex_faces: HashMap<ShapeId, Vec<ShapeId>> = HashMap::new();
        let mut vertex_edges: HashMap<ShapeId, Vec<ShapeId>> = HashMap::new();
        for face in &faces {
            for edge in introspect.sub_shapes(*face, ShapeType::Edge)? {
                edge_faces.entry(edge).or_default().push(*face);
            }
            for vertex in introspect.sub_shapes(*face, ShapeType::Vertex)? {
                vertex_faces.entry(vertex).or_default().push(*face);
            }
        }

        let edges: Vec<ShapeId> = introspect
            .sub_shapes(root, ShapeType::Edge)?
            .into_iter()
            .filter(|e| *e != root)
            .collect();
        for edge in &edges {
            for vertex in introspect.sub_shapes(*edge, ShapeType::Vertex)? {
                let list = vertex_edges.entry(vertex).or_default();
                if !list.contains(edge) {
                    list.push(*edge);
                }
            }
        }

        let bracket = |shapes: &[ShapeId], names: &HashMap<ShapeId, String>| -> Option<String> {
            let parts: Vec<String> = shapes
                .iter()
                .filter_map(|s| names.get(s).map(|n| format!("[{n}]")))
                .collect();
            (!parts.is_empty()).then(|| parts.concat())
        };

        let mut edge_names: HashMap<ShapeId, String> = HashMap::new();
        let candidates = edges
            .iter()
            .map(|e| match history_candidate(context, *e, ShapeType::Edge, history, sources) {
                Some(name) => (*e, name, Derivation::History),
                None => {
                    let adjacent = edge_faces.get(e).cloned().unwrap_or_default();
                    let name = bracket(&adjacent, &face_names)
                        .unwrap_or_else(|| format!("{context}/Edge"));
                    (*e, name, Derivation::Adjacency)
                }
            })
            .collect::<Vec<_>>();
        for (shape, name) in settle(candidates, |_| None) {
            edge_names.insert(shape, name.to_string());
            table.push(shape, ShapeType::Edge, name);
        }

        let vertices: Vec<ShapeId> = introspect
            .sub_shapes(root, ShapeType::Vertex)?
            .into_iter()
            .filter(|v| *v != root)
            .collect();
        let candidates = vertices
            .iter()
            .map(|v| match history_candidate(context, *v, ShapeType::Vertex, history, sources) {
                Some(name) => (*v, name, Derivation::History),
                None => {
                    let adjacent = vertex_faces.get(v).cloned().unwrap_or_default();
                    let name = bracket(&adjacent, &face_names)
                        .or_else(|| bracket(vertex_edges.get(v).map(Vec::as_slice).unwrap_or(&[]), &edge_names))
                        .unwrap_or_else(|| format!("{context}/Vertex"));
                    (*v, name, Derivation::Adjacency)
                }
            })
            .collect::<Vec<_>>();
        let by_edges = |v: ShapeId| bracket(vertex_edges.get(&v).map(Vec::as_slice).unwrap_or(&[]), &edge_names);
        for (shape, name) in settle(candidates, by_edges) {
            table.push(shape, ShapeType::Vertex, name);
        }

        let weak = table.weak_entries().count();
        if weak > 0 {
            warn!(context, weak, "ambiguous derivation, weak names assigned");
        }
        Ok(table)
    }
}

/// Name from kernel history, or the passed-through source name.
fn history_candidate(
    context: &str,
    shape: ShapeId,
    shape_type: ShapeType,
    history: &ShapeHistory,
    sources: &HashMap<ShapeId, String>,
) -> Option<String> {
    let composite = |verb: &str, ids: &[ShapeId]| {
        let names: Vec<&str> = ids
            .iter()
            .filter_map(|id| sources.get(id).map(String::as_str))
            .collect();
        if names.is_empty() {
            return None;
        }
        Some(format!(
            "{context}/{verb}_{}&{}",
            shape_type.token(),
            names.join("&")
        ))
    };
    match history.origin_of(shape) {
        Some(Origin::Primitive { label }) if !label.is_empty() => Some(format!("{context}/{label}")),
        Some(Origin::Primitive { .. }) => None,
        Some(Origin::Unchanged { source }) => sources.get(source).cloned(),
        Some(Origin::Modified { sources: ids }) => composite("Modified", ids),
        Some(Origin::Generated { sources: ids }) => composite("Generated", ids),
        None if shape_type == ShapeType::Face => sources.get(&shape).cloned(),
        None => None,
    }
}

/// Turn candidates into names; shared candidates first try `alternative`
/// (adjacency-derived ones only), then become weak in enumeration order.
fn settle(
    candidates: Vec<(ShapeId, String, Derivation)>,
    alternative: impl Fn(ShapeId) -> Option<String>,
) -> Vec<(ShapeId, Name)> {
    let count = |list: &[(ShapeId, String, Derivation)], name: &str| {
        list.iter().filter(|(_, n, _)| n == name).count()
    };
    let mut refined = candidates.clone();
    for (i, (shape, name, how)) in candidates.iter().enumerate() {
        if *how == Derivation::Adjacency && count(&candidates, name) > 1 {
            if let Some(alt) = alternative(*shape) {
                refined[i].1 = alt;
            }
        }
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    refined
        .iter()
        .map(|(shape, name, _)| {
            if count(&refined, name) > 1 {
                let index = seen.entry(name.clone()).or_insert(0);
                *index += 1;
                (
                    *shape,
                    Name::Weak {
                        base: name.clone(),
                        index: *index,
                    },
                )
            } else {
                (*shape, Name::Strong(name.clone()))
            }
        })
        .collect()
}
