//! Persistence gateway: a project is a directory holding `manifest.json`
//! and one JSON file per document. Only the parametric recipe is stored;
//! shapes are recomputed on load.

pub mod errors;
pub mod load;
pub mod metadata;
pub mod migrate;
pub mod save;

pub use errors::{LoadError, SaveError};
pub use load::{load_manifest, load_model, load_session};
pub use metadata::ProjectMetadata;
pub use save::{save_model, save_session, DocumentEntry, Manifest, FORMAT_ID, FORMAT_VERSION, MANIFEST_FILE};
