use std::collections::BTreeMap;

use geom_kernel::Profile;
use serde::{Deserialize, Serialize};
use shape_types::{FilterSet, Selection, ShapeType};

/// A labelled closed region of a sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub label: String,
    pub profile: Profile,
}

impl Region {
    pub fn new(label: impl Into<String>, profile: Profile) -> Self {
        Self {
            label: label.into(),
            profile,
        }
    }
}

/// Circular repetition of sketch regions, with the count given as an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationSpec {
    pub regions: Vec<String>,
    pub center: [f64; 2],
    /// Number of instances including the original, e.g. `"n"`.
    pub count: String,
    #[serde(default = "full_turn")]
    pub full_angle: f64,
}

fn full_turn() -> f64 {
    360.0
}

/// An ordered list of selections with an optional filter set (group contents).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionList {
    /// Type of every member; `None` until the first selection is set.
    pub shape_type: Option<ShapeType>,
    pub items: Vec<Selection>,
    #[serde(default)]
    pub filters: FilterSet,
}

impl SelectionList {
    pub fn new(shape_type: ShapeType, items: Vec<Selection>) -> Self {
        Self {
            shape_type: Some(shape_type),
            items,
            filters: FilterSet::default(),
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }
}

/// Value of one attribute slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttrValue {
    /// Numeric parameter: a literal or an expression over parameters.
    Scalar(String),
    Bool(bool),
    Text(String),
    Selection(Selection),
    SelectionList(SelectionList),
    Regions(Vec<Region>),
    Rotations(Vec<RotationSpec>),
}

/// Declared type of an attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Scalar,
    Bool,
    Text,
    Selection,
    SelectionList,
    Regions,
    Rotations,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Scalar => "scalar",
            AttrKind::Bool => "bool",
            AttrKind::Text => "text",
            AttrKind::Selection => "selection",
            AttrKind::SelectionList => "selection list",
            AttrKind::Regions => "regions",
            AttrKind::Rotations => "rotations",
        }
    }
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Scalar(_) => AttrKind::Scalar,
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Text(_) => AttrKind::Text,
            AttrValue::Selection(_) => AttrKind::Selection,
            AttrValue::SelectionList(_) => AttrKind::SelectionList,
            AttrValue::Regions(_) => AttrKind::Regions,
            AttrValue::Rotations(_) => AttrKind::Rotations,
        }
    }

    pub fn scalar(value: impl ToString) -> Self {
        AttrValue::Scalar(value.to_string())
    }

    /// Every selection name held by the value, filter arguments included.
    pub fn selection_names(&self) -> Vec<&str> {
        match self {
            AttrValue::Selection(s) if !s.is_empty() => vec![s.name.as_str()],
            AttrValue::SelectionList(list) => {
                let mut names: Vec<&str> = list
                    .items
                    .iter()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.name.as_str())
                    .collect();
                for decl in &list.filters.filters {
                    for arg in &decl.args {
                        names.extend(
                            arg.selections()
                                .into_iter()
                                .filter(|s| !s.is_empty())
                                .map(|s| s.name.as_str()),
                        );
                    }
                }
                names
            }
            _ => Vec::new(),
        }
    }

    /// Every expression held by the value.
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            AttrValue::Scalar(expr) => vec![expr.as_str()],
            AttrValue::Rotations(specs) => specs.iter().map(|s| s.count.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Apply `f` to every selection name held by the value.
    pub fn rewrite_names(&mut self, f: &dyn Fn(&str) -> String) {
        let rewrite = |s: &mut Selection| {
            if !s.is_empty() {
                s.name = f(&s.name);
            }
        };
        match self {
            AttrValue::Selection(s) => rewrite(s),
            AttrValue::SelectionList(list) => {
                list.items.iter_mut().for_each(rewrite);
                for decl in &mut list.filters.filters {
                    for arg in &mut decl.args {
                        arg.selections_mut().into_iter().for_each(rewrite);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Declaration of one attribute of a feature kind.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpec {
    pub name: &'static str,
    pub kind: AttrKind,
    pub required: bool,
}

impl AttrSpec {
    pub const fn required(name: &'static str, kind: AttrKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: AttrKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Named, typed attribute slots of one feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeStore {
    values: BTreeMap<String, AttrValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttrValue> {
        self.values.get_mut(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) -> Option<AttrValue> {
        self.values.insert(name.into(), value)
    }

    /// Chained form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.values.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut AttrValue> {
        self.values.values_mut()
    }

    pub fn expression(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(AttrValue::Scalar(expr)) => Some(expr),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(AttrValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(AttrValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn selection(&self, name: &str) -> Option<&Selection> {
        match self.values.get(name) {
            Some(AttrValue::Selection(s)) => Some(s),
            _ => None,
        }
    }

    pub fn selection_list(&self, name: &str) -> Option<&SelectionList> {
        match self.values.get(name) {
            Some(AttrValue::SelectionList(list)) => Some(list),
            _ => None,
        }
    }

    pub fn regions(&self, name: &str) -> Option<&[Region]> {
        match self.values.get(name) {
            Some(AttrValue::Regions(regions)) => Some(regions),
            _ => None,
        }
    }

    pub fn rotations(&self, name: &str) -> Option<&[RotationSpec]> {
        match self.values.get(name) {
            Some(AttrValue::Rotations(specs)) => Some(specs),
            _ => None,
        }
    }

    /// Whether the slot holds a usable value (non-empty selection, non-empty list).
    pub fn is_initialized(&self, name: &str) -> bool {
        match self.values.get(name) {
            None => false,
            Some(AttrValue::Selection(s)) => !s.is_empty(),
            Some(AttrValue::SelectionList(list)) => {
                !list.items.is_empty() || !list.filters.is_empty()
            }
            Some(AttrValue::Scalar(expr)) => !expr.trim().is_empty(),
            Some(_) => true,
        }
    }
}
