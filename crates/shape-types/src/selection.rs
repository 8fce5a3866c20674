use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shape::ShapeType;

/// Persistent reference to a sub-shape: a shape type plus a topological name.
///
/// The name is a slash-separated path such as `Box_1_1/Top`,
/// `Partition_1_1_2/Modified_Face&Box_1_1/Front` or `[Box_1_1/Top][Box_1_1/Left]`.
/// It never holds kernel identifiers, so it survives rebuilds and save/load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Requested shape type. `None` only for the empty selection.
    pub shape_type: Option<ShapeType>,
    /// Topological name. Empty for the empty selection.
    pub name: String,
}

impl Selection {
    pub fn new(shape_type: ShapeType, name: impl Into<String>) -> Self {
        Self {
            shape_type: Some(shape_type),
            name: name.into(),
        }
    }

    /// The uninitialized selection.
    pub fn empty() -> Self {
        Self {
            shape_type: None,
            name: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shape_type.is_none() || self.name.is_empty()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape_type {
            Some(t) if !self.name.is_empty() => write!(f, "(\"{}\", \"{}\")", t, self.name),
            _ => f.write_str("()"),
        }
    }
}
