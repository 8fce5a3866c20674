//! Parametric feature engine.
//!
//! Documents hold ordered features; the scheduler in [`rebuild`] replays
//! them through the geometric kernel, the naming tables of [`topo_naming`]
//! give their results persistent names, and the [`resolve`] module maps
//! stored names back to live shapes. [`Session`] is the single entry point
//! for edits, operations and queries.

pub mod attributes;
pub mod config;
pub mod document;
pub mod expr;
pub mod filters;
pub mod kinds;
pub mod rebuild;
pub mod resolve;
pub mod results;
pub mod session;
pub mod types;
pub mod undo;

pub use attributes::{AttrKind, AttrSpec, AttrValue, AttributeStore, Region, RotationSpec, SelectionList};
pub use config::EngineConfig;
pub use document::{Document, Feature, Model, ResultMeta, SubShapeColor};
pub use filters::{Filter, FilterContext, FilterError, FilterRegistry, ResolvedArg};
pub use kinds::{ExecContext, FeatureKind, KindRegistry};
pub use rebuild::RebuildSummary;
pub use resolve::ResolvedShape;
pub use results::{FeatureOutput, GroupMember, ResultEntry};
pub use session::{rename_identifier, Session, GROUP_LIST};
pub use types::{EngineError, FeatureError, FeatureId, FeatureStatus, Unresolved, UnresolvedReason};
