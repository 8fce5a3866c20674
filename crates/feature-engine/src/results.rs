use geom_kernel::{ShapeId, ShapeType};
use modeling_ops::Provenance;
use topo_naming::NamingTable;

/// A named kernel shape owned by a feature. Runtime only; rebuilt on recompute.
#[derive(Debug, Clone)]
pub struct ResultEntry {
    /// Persistent result name: `Box_1_1`, `Partition_1_1_2`, `XOY`.
    pub name: String,
    pub shape: ShapeId,
    pub shape_type: ShapeType,
    pub table: NamingTable,
    /// Sub-results of a compound result.
    pub parts: Vec<ResultEntry>,
    /// Result this one re-exposes unchanged (compound members).
    pub source: Option<String>,
}

impl ResultEntry {
    /// This entry and every nested sub-result, depth first.
    pub fn walk(&self) -> Vec<&ResultEntry> {
        let mut out = vec![self];
        for part in &self.parts {
            out.extend(part.walk());
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<&ResultEntry> {
        self.walk().into_iter().find(|e| e.name == name)
    }
}

/// One shape collected by a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub shape: ShapeId,
    pub shape_type: ShapeType,
    /// Name of the shape in the result it was found in.
    pub name: String,
}

/// Everything a feature produced in the last recompute.
#[derive(Debug, Clone, Default)]
pub struct FeatureOutput {
    pub results: Vec<ResultEntry>,
    pub provenance: Provenance,
    /// Names of the results this feature consumed; hidden from later features.
    pub concealed: Vec<String>,
    /// Value of a `Parameter` feature.
    pub value: Option<f64>,
    /// Members of a `Group` feature.
    pub members: Vec<GroupMember>,
    /// Filters of a group that were dropped during this evaluation.
    pub dropped_filters: Vec<String>,
    pub warnings: Vec<String>,
}

impl FeatureOutput {
    /// Every result entry, nested ones included.
    pub fn entries(&self) -> impl Iterator<Item = &ResultEntry> {
        self.results.iter().flat_map(|r| r.walk())
    }

    pub fn find(&self, name: &str) -> Option<&ResultEntry> {
        self.results.iter().find_map(|r| r.find(name))
    }
}
