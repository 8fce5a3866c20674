//! ModelBuilder: fluent API for scripting modelling sessions in tests.
//!
//! Drives a real [`Session`], so every step goes through operations,
//! recompute and naming exactly as an application would. Features are
//! addressed by the names the session gave them (`Box_1`, `Group_2`).

use std::fmt::Write as _;
use std::path::Path;

use feature_engine::{
    AttrValue, AttributeStore, EngineConfig, EngineError, FeatureId, Region, RotationSpec, SelectionList, Session,
    GROUP_LIST,
};
use file_format::{load_session, save_session, Manifest, ProjectMetadata};
use geom_kernel::{MockKernel, ShapeType};
use shape_types::{Color, Selection};
use topo_naming::ROOT_DOCUMENT as ROOT;
use tracing::debug;

use crate::helpers::{init_tracing, HarnessError};

/// A fluent builder for constructing and checking models in tests.
///
/// New features go into the current part (the last one created or the one
/// chosen with [`in_part`](Self::in_part)). Each call runs in its own
/// operation unless an outer one was opened with [`begin`](Self::begin).
pub struct ModelBuilder {
    session: Session,
    part: Option<String>,
}

impl ModelBuilder {
    /// A builder over the mock kernel with the default configuration.
    pub fn mock() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        Self {
            session: Session::with_mock(config),
            part: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Open an operation spanning several builder calls.
    pub fn begin(&mut self, name: &str) -> &mut Self {
        self.session.start_operation(name);
        self
    }

    /// Recompute inside the open operation without closing it.
    pub fn flush(&mut self) -> &mut Self {
        self.session.flush();
        self
    }

    /// Close the operation opened with [`begin`](Self::begin).
    pub fn commit(&mut self) -> Result<&mut Self, HarnessError> {
        self.session.finish_operation()?;
        Ok(self)
    }

    /// Run one edit in its own bracket. Rejected edits leave the model
    /// unchanged, so the bracket is closed either way.
    fn in_operation<T>(
        &mut self,
        name: &str,
        step: impl FnOnce(&mut Session) -> Result<T, EngineError>,
    ) -> Result<T, HarnessError> {
        self.session.start_operation(name);
        let outcome = step(&mut self.session);
        self.session.finish_operation()?;
        Ok(outcome?)
    }

    pub fn undo(&mut self) -> Result<&mut Self, HarnessError> {
        self.session.undo()?;
        Ok(self)
    }

    pub fn redo(&mut self) -> Result<&mut Self, HarnessError> {
        self.session.redo()?;
        Ok(self)
    }

    // ── Parts ───────────────────────────────────────────────────────────

    /// Create a part and make it the current one. Returns its name.
    pub fn part(&mut self) -> Result<String, HarnessError> {
        let id = self.in_operation("part", |s| s.add_part())?;
        let name = self.session.feature(id)?.name.clone();
        self.part = Some(name.clone());
        Ok(name)
    }

    /// Direct new features to an existing part.
    pub fn in_part(&mut self, part: &str) -> &mut Self {
        self.part = Some(part.to_string());
        self
    }

    pub fn current_part(&self) -> Result<&str, HarnessError> {
        self.part.as_deref().ok_or(HarnessError::NoPart)
    }

    pub fn activate(&mut self, part: &str, active: bool) -> Result<&mut Self, HarnessError> {
        self.session.activate(part, active)?;
        Ok(self)
    }

    // ── Features ────────────────────────────────────────────────────────

    /// Add a feature of any registered kind. Returns the feature name.
    pub fn feature(&mut self, kind: &str, attrs: AttributeStore) -> Result<String, HarnessError> {
        let part = self.current_part()?.to_string();
        let id = self.in_operation(kind, |s| s.add_feature(&part, kind, attrs))?;
        let name = self.session.feature(id)?.name.clone();
        debug!(feature = %name, "builder added feature");
        Ok(name)
    }

    pub fn parameter(&mut self, variable: &str, expression: &str) -> Result<String, HarnessError> {
        self.feature(
            "Parameter",
            AttributeStore::new()
                .with("variable", AttrValue::Text(variable.into()))
                .with("expression", AttrValue::scalar(expression)),
        )
    }

    /// Box at the origin; sizes may be expressions.
    pub fn box_(&mut self, dx: &str, dy: &str, dz: &str) -> Result<String, HarnessError> {
        self.feature(
            "Box",
            AttributeStore::new()
                .with("dx", AttrValue::scalar(dx))
                .with("dy", AttrValue::scalar(dy))
                .with("dz", AttrValue::scalar(dz)),
        )
    }

    /// Box with its minimum corner at `at`.
    pub fn box_at(&mut self, at: [f64; 3], size: [f64; 3]) -> Result<String, HarnessError> {
        let mut attrs = AttributeStore::new();
        for (name, value) in ["x", "y", "z"].iter().zip(at) {
            attrs.set(*name, AttrValue::scalar(value));
        }
        for (name, value) in ["dx", "dy", "dz"].iter().zip(size) {
            attrs.set(*name, AttrValue::scalar(value));
        }
        self.feature("Box", attrs)
    }

    pub fn cylinder(&mut self, radius: &str, height: &str) -> Result<String, HarnessError> {
        self.feature(
            "Cylinder",
            AttributeStore::new()
                .with("radius", AttrValue::scalar(radius))
                .with("height", AttrValue::scalar(height)),
        )
    }

    /// Plane parallel to `face`, shifted along its normal.
    pub fn plane_offset(&mut self, face: Selection, offset: &str) -> Result<String, HarnessError> {
        self.feature(
            "Plane",
            AttributeStore::new()
                .with("face", AttrValue::Selection(face))
                .with("offset", AttrValue::scalar(offset)),
        )
    }

    /// Mid-plane of two parallel faces.
    pub fn plane_between(&mut self, face: Selection, other: Selection) -> Result<String, HarnessError> {
        self.feature(
            "Plane",
            AttributeStore::new()
                .with("face", AttrValue::Selection(face))
                .with("other", AttrValue::Selection(other)),
        )
    }

    pub fn sketch(
        &mut self,
        plane: Selection,
        regions: Vec<Region>,
        rotations: Vec<RotationSpec>,
    ) -> Result<String, HarnessError> {
        let mut attrs = AttributeStore::new()
            .with("plane", AttrValue::Selection(plane))
            .with("regions", AttrValue::Regions(regions));
        if !rotations.is_empty() {
            attrs.set("rotations", AttrValue::Rotations(rotations));
        }
        self.feature("Sketch", attrs)
    }

    /// Extrude along the base normal.
    pub fn extrusion(&mut self, base: SelectionList, size: &str) -> Result<String, HarnessError> {
        self.feature(
            "Extrusion",
            AttributeStore::new()
                .with("base", AttrValue::SelectionList(base))
                .with("size", AttrValue::scalar(size)),
        )
    }

    pub fn partition(&mut self, base: SelectionList, tools: SelectionList) -> Result<String, HarnessError> {
        self.feature(
            "Partition",
            AttributeStore::new()
                .with("base", AttrValue::SelectionList(base))
                .with("tools", AttrValue::SelectionList(tools)),
        )
    }

    pub fn fuse(&mut self, base: SelectionList) -> Result<String, HarnessError> {
        self.feature("Fuse", AttributeStore::new().with("base", AttrValue::SelectionList(base)))
    }

    pub fn fillet(&mut self, edges: SelectionList, radius: &str) -> Result<String, HarnessError> {
        self.feature(
            "Fillet",
            AttributeStore::new()
                .with("base", AttrValue::SelectionList(edges))
                .with("radius", AttrValue::scalar(radius)),
        )
    }

    pub fn compound(&mut self, base: SelectionList) -> Result<String, HarnessError> {
        self.feature("Compound", AttributeStore::new().with("base", AttrValue::SelectionList(base)))
    }

    pub fn group(&mut self, list: SelectionList) -> Result<String, HarnessError> {
        self.feature("Group", AttributeStore::new().with(GROUP_LIST, AttrValue::SelectionList(list)))
    }

    // ── Edits ───────────────────────────────────────────────────────────

    /// Look a feature up in the current part, then in the part set.
    pub fn id(&self, name: &str) -> Result<FeatureId, HarnessError> {
        let docs = self.part.as_deref().into_iter().chain(std::iter::once(ROOT));
        for doc in docs {
            if let Ok(id) = self.session.feature_id(doc, name) {
                return Ok(id);
            }
        }
        Err(HarnessError::FeatureNotFound { name: name.into() })
    }

    pub fn set(&mut self, feature: &str, attribute: &str, value: AttrValue) -> Result<&mut Self, HarnessError> {
        let id = self.id(feature)?;
        self.in_operation("set", |s| s.set_attribute(id, attribute, value))?;
        Ok(self)
    }

    /// Set a scalar attribute (or a parameter expression) from text.
    pub fn set_scalar(&mut self, feature: &str, attribute: &str, value: &str) -> Result<&mut Self, HarnessError> {
        self.set(feature, attribute, AttrValue::scalar(value))
    }

    /// Move `feature` right after `after`.
    pub fn move_after(&mut self, feature: &str, after: &str) -> Result<&mut Self, HarnessError> {
        let (id, after) = (self.id(feature)?, self.id(after)?);
        self.in_operation("move", |s| s.move_feature(id, Some(after)))?;
        Ok(self)
    }

    pub fn color(&mut self, result: &str, color: Color) -> Result<&mut Self, HarnessError> {
        let part = self.current_part()?.to_string();
        self.in_operation("colour", |s| s.set_result_color(&part, result, color))?;
        Ok(self)
    }

    pub fn recompute(&mut self) -> &mut Self {
        self.session.recompute_all();
        self
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn error(&self, feature: &str) -> Result<String, HarnessError> {
        Ok(self.session.error(self.id(feature)?))
    }

    /// Warnings raised by the last operation.
    pub fn warnings(&self) -> &[String] {
        self.session.warnings()
    }

    pub fn group_size(&self, group: &str) -> Result<usize, HarnessError> {
        Ok(self.session.group_size(self.id(group)?)?)
    }

    pub fn group_filters(&self, group: &str) -> Result<Vec<String>, HarnessError> {
        Ok(self.session.group_filters(self.id(group)?)?)
    }

    /// Names of the group members in order.
    pub fn group_names(&self, group: &str) -> Result<Vec<String>, HarnessError> {
        let members = self.session.group_members(self.id(group)?)?;
        Ok(members.iter().map(|m| m.name.clone()).collect())
    }

    pub fn volume(&self, result: &str) -> Result<f64, HarnessError> {
        Ok(self.session.volume(self.current_part()?, result)?)
    }

    pub fn count(&self, result: &str, shape_type: ShapeType) -> Result<usize, HarnessError> {
        Ok(self
            .session
            .sub_shape_count(self.current_part()?, result, shape_type)?)
    }

    /// Every sub-shape name of the results in the current part, in table order.
    pub fn names(&self) -> Result<Vec<String>, HarnessError> {
        let part = self.current_part()?;
        let document = self.session.model().document(part)?;
        let mut out = Vec::new();
        for feature in &document.features {
            for entry in self.session.results(feature.id).iter().flat_map(|r| r.walk()) {
                out.extend(entry.table.entries().iter().map(|e| e.name.to_string()));
            }
        }
        Ok(out)
    }

    /// One line per feature of the part set and the current part:
    /// name, kind, status, result names.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let docs = std::iter::once(ROOT).chain(self.part.as_deref());
        for doc in docs {
            let Ok(document) = self.session.model().document(doc) else {
                continue;
            };
            let _ = writeln!(out, "[{doc}]");
            for feature in &document.features {
                let results: Vec<&str> = self
                    .session
                    .results(feature.id)
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect();
                let _ = writeln!(
                    out,
                    "  {} ({}) {:?} {:?}",
                    feature.name,
                    feature.kind,
                    self.session.status(feature.id),
                    results
                );
            }
        }
        out
    }

    // ── Files ───────────────────────────────────────────────────────────

    pub fn save(&self, dir: &Path) -> Result<Manifest, HarnessError> {
        Ok(save_session(&self.session, &ProjectMetadata::new("scenario"), dir)?)
    }

    /// Open a saved project over a fresh mock kernel. Parts start inactive;
    /// the first one becomes the current part.
    pub fn load(dir: &Path, config: EngineConfig) -> Result<Self, HarnessError> {
        init_tracing();
        let (session, _) = load_session(dir, config, Box::new(MockKernel::new()))?;
        let part = session
            .model()
            .documents
            .get(1)
            .map(|d| d.name.clone());
        Ok(Self { session, part })
    }
}
