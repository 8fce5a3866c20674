//! Persistent naming of kernel sub-shapes.
//!
//! Components:
//! - [`Name`]: strong or weak persistent name
//! - [`parse_name`]: the selection name grammar
//! - [`NamingTable`]: per-result shape <-> name mapping derived from kernel history
//! - [`adjacency`]: resolution of bracketed adjacency names

pub mod adjacency;
pub mod error;
pub mod name;
pub mod parse;
pub mod table;

pub use error::NameError;
pub use name::{Name, WEAK_TOKEN};
pub use parse::{parse_name, LocalName, NameExpr, ParsedName, ROOT_DOCUMENT};
pub use table::NamingTable;
