use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shape_types::{Color, Selection};
use uuid::Uuid;

use crate::attributes::AttributeStore;
use crate::types::{EngineError, FeatureId};

/// A node of the construction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    /// Registry key of the feature kind (`Box`, `Group`, ...).
    pub kind: String,
    /// User-visible name; results are named after it.
    pub name: String,
    pub attributes: AttributeStore,
    #[serde(default)]
    pub suppressed: bool,
    /// Listed in the history tree.
    #[serde(default = "listed")]
    pub in_history: bool,
    /// Child document owned by a `Part` feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

fn listed() -> bool {
    true
}

impl Feature {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, attributes: AttributeStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            name: name.into(),
            attributes,
            suppressed: false,
            in_history: true,
            document: None,
        }
    }
}

/// Colour assigned to one sub-shape of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubShapeColor {
    pub selection: Selection,
    pub color: Color,
}

/// Display metadata of a result. Not part of its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_colors: Vec<SubShapeColor>,
}

/// An ordered container of features; the unit of save/load and activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    /// Ordered list of features. Index 0 is the first feature.
    pub features: Vec<Feature>,
    /// Features after this one are disabled. `None` means all features are enabled.
    #[serde(default)]
    pub current: Option<FeatureId>,
    /// Per-kind counters used to name new features (`Box_3`).
    #[serde(default)]
    pub counters: BTreeMap<String, u32>,
    /// Display metadata keyed by result name.
    #[serde(default)]
    pub metadata: BTreeMap<String, ResultMeta>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            current: None,
            counters: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Default name the next feature of `kind` will get.
    pub fn peek_name(&self, kind: &str) -> String {
        format!("{kind}_{}", self.counters.get(kind).copied().unwrap_or(0) + 1)
    }

    /// Next default name for a feature of `kind`.
    pub fn next_name(&mut self, kind: &str) -> String {
        let counter = self.counters.entry(kind.to_string()).or_insert(0);
        *counter += 1;
        format!("{kind}_{counter}")
    }

    /// Position a new feature takes: after the current one, or at the end.
    pub fn insertion_point(&self) -> usize {
        match self.current.and_then(|c| self.feature_index(c)) {
            Some(idx) => (idx + 1).min(self.features.len()),
            None => self.features.len(),
        }
    }

    /// Insert a feature after the current one (or at the end) and make it current.
    /// Returns its position.
    pub fn insert_feature(&mut self, feature: Feature) -> usize {
        let id = feature.id;
        let position = self.insertion_point();
        self.features.insert(position, feature);
        if self.current.is_some() {
            self.current = Some(id);
        }
        position
    }

    /// Remove a feature by ID. Returns the removed feature.
    pub fn remove_feature(&mut self, id: FeatureId) -> Result<Feature, EngineError> {
        let pos = self
            .feature_index(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        if self.current == Some(id) {
            self.current = pos.checked_sub(1).map(|p| self.features[p].id);
        }
        Ok(self.features.remove(pos))
    }

    /// Move a feature to `new_pos` (clamped), counted after its removal.
    pub fn reorder_feature(&mut self, id: FeatureId, new_pos: usize) -> Result<(), EngineError> {
        let old_pos = self
            .feature_index(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        let feature = self.features.remove(old_pos);
        let clamped_pos = new_pos.min(self.features.len());
        self.features.insert(clamped_pos, feature);
        Ok(())
    }

    /// Suppress or unsuppress a feature.
    pub fn set_suppressed(&mut self, id: FeatureId, suppressed: bool) -> Result<(), EngineError> {
        let feature = self
            .find_feature_mut(id)
            .ok_or(EngineError::FeatureNotFound { id })?;
        feature.suppressed = suppressed;
        Ok(())
    }

    pub fn find_feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn find_feature_mut(&mut self, id: FeatureId) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.id == id)
    }

    pub fn feature_index(&self, id: FeatureId) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    pub fn feature_by_name(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Whether the feature at `index` takes part in recompute.
    pub fn is_enabled(&self, index: usize) -> bool {
        let Some(feature) = self.features.get(index) else {
            return false;
        };
        if feature.suppressed {
            return false;
        }
        match self.current.and_then(|c| self.feature_index(c)) {
            Some(current) => index <= current,
            None => true,
        }
    }

    /// Feature owning identifier `ident` (its own name or one of its result
    /// names). The longest matching feature name wins.
    pub fn owner_of_identifier(&self, ident: &str) -> Option<(usize, &Feature)> {
        self.features
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                ident == f.name
                    || ident
                        .strip_prefix(f.name.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .max_by_key(|(_, f)| f.name.len())
    }

    /// Latest `Parameter` feature before `position` defining `variable`.
    pub fn parameter_before(&self, position: usize, variable: &str) -> Option<(usize, &Feature)> {
        self.features
            .iter()
            .enumerate()
            .take(position)
            .rev()
            .find(|(_, f)| f.kind == "Parameter" && f.attributes.text("variable") == Some(variable))
    }

    /// Features shown in the history tree.
    pub fn history(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.in_history)
    }
}

/// The persistent state of a session: the part set followed by its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub documents: Vec<Document>,
}

impl Model {
    pub fn new(root: Document) -> Self {
        Self {
            documents: vec![root],
        }
    }

    pub fn root(&self) -> &Document {
        &self.documents[0]
    }

    pub fn document_index(&self, name: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.name == name)
    }

    pub fn document(&self, name: &str) -> Result<&Document, EngineError> {
        self.documents
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| EngineError::DocumentNotFound { name: name.into() })
    }

    pub fn document_mut(&mut self, name: &str) -> Result<&mut Document, EngineError> {
        self.documents
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| EngineError::DocumentNotFound { name: name.into() })
    }

    /// Document index and position of a feature.
    pub fn locate(&self, id: FeatureId) -> Option<(usize, usize)> {
        self.documents
            .iter()
            .enumerate()
            .find_map(|(d, doc)| doc.feature_index(id).map(|i| (d, i)))
    }

    pub fn feature(&self, id: FeatureId) -> Result<&Feature, EngineError> {
        let (d, i) = self.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        Ok(&self.documents[d].features[i])
    }

    pub fn feature_mut(&mut self, id: FeatureId) -> Result<&mut Feature, EngineError> {
        let (d, i) = self.locate(id).ok_or(EngineError::FeatureNotFound { id })?;
        Ok(&mut self.documents[d].features[i])
    }

    /// The `Part` feature of the root document owning document `doc`.
    pub fn owner_of(&self, doc: usize) -> Option<(usize, &Feature)> {
        let name = &self.documents.get(doc)?.name;
        self.root()
            .features
            .iter()
            .enumerate()
            .find(|(_, f)| f.document.as_deref() == Some(name))
    }

    /// Every feature in recompute order: root features, each part's features
    /// placed just before the `Part` feature that owns them.
    pub fn order(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (i, feature) in self.root().features.iter().enumerate() {
            if let Some(doc) = feature.document.as_deref().and_then(|n| self.document_index(n)) {
                out.extend((0..self.documents[doc].features.len()).map(|j| (doc, j)));
            }
            out.push((0, i));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(doc: &mut Document, kind: &str) -> FeatureId {
        let name = doc.next_name(kind);
        let f = Feature::new(kind, name, AttributeStore::new());
        let id = f.id;
        doc.insert_feature(f);
        id
    }

    #[test]
    fn names_count_per_kind() {
        let mut doc = Document::new("Part_1");
        feature(&mut doc, "Box");
        feature(&mut doc, "Box");
        let id = feature(&mut doc, "Fillet");
        assert_eq!(doc.find_feature(id).unwrap().name, "Fillet_1");
        assert_eq!(doc.features[1].name, "Box_2");
    }

    #[test]
    fn insert_after_current_and_disable_the_rest() {
        let mut doc = Document::new("Part_1");
        let a = feature(&mut doc, "Box");
        let b = feature(&mut doc, "Box");
        doc.current = Some(a);
        let c = feature(&mut doc, "Fillet");
        assert_eq!(doc.feature_index(c), Some(1));
        assert_eq!(doc.current, Some(c));
        assert!(doc.is_enabled(1));
        assert!(!doc.is_enabled(doc.feature_index(b).unwrap()));
    }

    #[test]
    fn removing_the_current_feature_steps_back() {
        let mut doc = Document::new("Part_1");
        let a = feature(&mut doc, "Box");
        let b = feature(&mut doc, "Box");
        doc.current = Some(b);
        doc.remove_feature(b).unwrap();
        assert_eq!(doc.current, Some(a));
        assert!(doc.remove_feature(b).is_err());
    }

    #[test]
    fn order_places_parts_before_their_owner() {
        let mut root = Document::new("PartSet");
        feature(&mut root, "Plane");
        let mut part = Feature::new("Part", "Part_1", AttributeStore::new());
        part.document = Some("Part_1".into());
        root.insert_feature(part);
        let mut model = Model::new(root);
        let mut doc = Document::new("Part_1");
        feature(&mut doc, "Box");
        model.documents.push(doc);
        assert_eq!(model.order(), vec![(0, 0), (1, 0), (0, 1)]);
    }
}
