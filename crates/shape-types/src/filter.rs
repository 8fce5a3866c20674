use serde::{Deserialize, Serialize};

use crate::selection::Selection;
use crate::shape::ShapeType;

/// One argument of a filter declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FilterArg {
    Selection(Selection),
    SelectionList(Vec<Selection>),
    Bool(bool),
    Real(f64),
    Text(String),
    /// Shapes of `shape_type` accepted by another filter.
    Filter {
        shape_type: ShapeType,
        filter: Box<FilterDecl>,
    },
}

impl FilterArg {
    /// Argument selecting the shapes of `shape_type` that `filter` accepts.
    pub fn nested(shape_type: ShapeType, filter: FilterDecl) -> Self {
        FilterArg::Filter {
            shape_type,
            filter: Box::new(filter),
        }
    }

    /// Selections carried by this argument, nested filters included, in declaration order.
    pub fn selections(&self) -> Vec<&Selection> {
        match self {
            FilterArg::Selection(s) => vec![s],
            FilterArg::SelectionList(list) => list.iter().collect(),
            FilterArg::Filter { filter, .. } => filter.args.iter().flat_map(FilterArg::selections).collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`FilterArg::selections`].
    pub fn selections_mut(&mut self) -> Vec<&mut Selection> {
        match self {
            FilterArg::Selection(s) => vec![s],
            FilterArg::SelectionList(list) => list.iter_mut().collect(),
            FilterArg::Filter { filter, .. } => filter
                .args
                .iter_mut()
                .flat_map(FilterArg::selections_mut)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A selection-typed argument that holds nothing, looking through nested filters.
    pub fn is_empty_selection(&self) -> bool {
        match self {
            FilterArg::Selection(s) => s.is_empty(),
            FilterArg::SelectionList(list) => list.is_empty() || list.iter().all(|s| s.is_empty()),
            FilterArg::Filter { filter, .. } => filter.has_empty_selection_arg(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FilterArg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FilterArg::Real(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Selection> for FilterArg {
    fn from(s: Selection) -> Self {
        FilterArg::Selection(s)
    }
}

impl From<Vec<Selection>> for FilterArg {
    fn from(list: Vec<Selection>) -> Self {
        FilterArg::SelectionList(list)
    }
}

impl From<(ShapeType, FilterDecl)> for FilterArg {
    fn from((shape_type, filter): (ShapeType, FilterDecl)) -> Self {
        FilterArg::nested(shape_type, filter)
    }
}

impl From<bool> for FilterArg {
    fn from(b: bool) -> Self {
        FilterArg::Bool(b)
    }
}

impl From<f64> for FilterArg {
    fn from(v: f64) -> Self {
        FilterArg::Real(v)
    }
}

/// A named predicate with its arguments, as declared by the user.
///
/// The name is data: it is looked up in a filter registry at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDecl {
    pub name: String,
    /// Invert the predicate.
    #[serde(default)]
    pub exclude: bool,
    pub args: Vec<FilterArg>,
}

impl FilterDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exclude: false,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<FilterArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn excluded(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// Whether any selection-typed argument is empty.
    pub fn has_empty_selection_arg(&self) -> bool {
        self.args.iter().any(FilterArg::is_empty_selection)
    }
}

/// Ordered, AND-combined list of filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub filters: Vec<FilterDecl>,
}

impl FilterSet {
    pub fn new(filters: Vec<FilterDecl>) -> Self {
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Filter names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name.as_str()).collect()
    }

    /// Arguments of the first filter with the given name.
    pub fn args_of(&self, name: &str) -> Option<&[FilterArg]> {
        self.filters
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.args.as_slice())
    }

    /// Whether one of the declarations carries an empty selection argument.
    pub fn has_empty_selection_arg(&self) -> bool {
        self.filters.iter().any(FilterDecl::has_empty_selection_arg)
    }
}
