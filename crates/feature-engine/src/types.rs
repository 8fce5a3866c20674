use std::fmt;

use geom_kernel::{KernelError, ShapeType};
use modeling_ops::OpError;
use topo_naming::NameError;
use uuid::Uuid;

use crate::expr::ExprError;

/// Identifier of a feature, unique across all documents of a session.
pub type FeatureId = Uuid;

/// Computation state of a feature after the last recompute.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeatureStatus {
    #[default]
    NotComputed,
    Valid,
    /// Suppressed, or placed after the current feature.
    Disabled,
    Error(String),
}

impl FeatureStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, FeatureStatus::Valid)
    }

    /// The diagnostic text; empty unless the feature failed.
    pub fn message(&self) -> &str {
        match self {
            FeatureStatus::Error(msg) => msg,
            _ => "",
        }
    }
}

/// Why a selection name could not be mapped to a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedReason {
    /// The selection holds no name.
    Empty,
    Malformed(String),
    /// No feature or result with this identifier exists in the document.
    NotFound(String),
    /// The identifier belongs to a feature placed after the requester.
    Later(String),
    /// The result exists but is disabled, failed, or is consumed without survivors.
    NotVisible(String),
    /// The name addresses a part that is not active.
    PartDeactivated(String),
    /// The result exists but has no sub-shape with this name.
    Orphaned,
    /// Several shapes match where one was required.
    Ambiguous(usize),
    WrongType { expected: ShapeType, found: ShapeType },
    Kernel(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Empty => f.write_str("selection is empty"),
            UnresolvedReason::Malformed(msg) => write!(f, "malformed name: {msg}"),
            UnresolvedReason::NotFound(id) => write!(f, "{id} does not exist"),
            UnresolvedReason::Later(id) => write!(f, "{id} is created after this feature"),
            UnresolvedReason::NotVisible(id) => write!(f, "{id} is not available"),
            UnresolvedReason::PartDeactivated(part) => write!(f, "part {part} is not active"),
            UnresolvedReason::Orphaned => f.write_str("no sub-shape carries this name"),
            UnresolvedReason::Ambiguous(n) => write!(f, "{n} shapes match"),
            UnresolvedReason::WrongType { expected, found } => {
                write!(f, "expected a {expected}, found a {found}")
            }
            UnresolvedReason::Kernel(msg) => write!(f, "kernel query failed: {msg}"),
        }
    }
}

/// A selection that did not resolve, with enough context to report it.
#[derive(Debug, Clone, PartialEq)]
pub struct Unresolved {
    pub name: String,
    /// Name of the feature that asked for the selection.
    pub requested_by: String,
    pub reason: UnresolvedReason,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "selection \"{}\" of {} is unresolved: {}",
            self.name, self.requested_by, self.reason
        )
    }
}

impl std::error::Error for Unresolved {}

/// Failure of one feature during recompute. Stored as the feature's error text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeatureError {
    #[error(transparent)]
    Op(#[from] OpError),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Unresolved(#[from] Unresolved),

    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    #[error("attribute {name} is not initialized")]
    MissingAttribute { name: String },

    #[error("{reason}")]
    Invalid { reason: String },

    #[error("depends on failed feature {feature}")]
    UpstreamFailed { feature: String },
}

/// Errors returned synchronously by edits and queries. The model is left unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("feature not found: {id}")]
    FeatureNotFound { id: FeatureId },

    #[error("no feature named {name} in {document}")]
    FeatureNameNotFound { document: String, name: String },

    #[error("document not found: {name}")]
    DocumentNotFound { name: String },

    #[error("no result named {name}")]
    ResultNotFound { name: String },

    #[error("unknown feature kind: {kind}")]
    UnknownKind { kind: String },

    #[error("{kind} has no attribute {attribute}")]
    UnknownAttribute { kind: String, attribute: String },

    #[error("attribute {attribute} expects a {expected} value")]
    AttributeType {
        attribute: String,
        expected: &'static str,
    },

    #[error("{feature} cannot reference {referenced}, which is not before it")]
    ForwardReference { feature: String, referenced: String },

    #[error("{feature} is used by {dependents:?}")]
    HasDependents {
        feature: String,
        dependents: Vec<String>,
    },

    #[error("a feature named {name} already exists")]
    DuplicateName { name: String },

    #[error("no operation is open")]
    NoOpenOperation,

    #[error("an operation is open: {name}")]
    OperationOpen { name: String },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("invalid move: {reason}")]
    InvalidMove { reason: String },

    #[error("{feature} is not a {expected} feature")]
    WrongKind {
        feature: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Unresolved(#[from] Unresolved),

    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    #[error("name error: {0}")]
    Name(#[from] NameError),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}
