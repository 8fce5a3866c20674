use std::fs;
use std::path::Path;

use feature_engine::{Document, EngineConfig, Model, Session};
use modeling_ops::KernelBundle;
use serde::de::DeserializeOwned;
use serde_json::Value;
use topo_naming::ROOT_DOCUMENT;
use tracing::{debug, info};

use crate::errors::LoadError;
use crate::metadata::ProjectMetadata;
use crate::migrate::migrate;
use crate::save::{DocumentFile, Manifest, FORMAT_ID, FORMAT_VERSION, MANIFEST_FILE};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| LoadError::parse(path, e))
}

fn check_header(format: &str, version: u32) -> Result<(), LoadError> {
    if format != FORMAT_ID {
        return Err(LoadError::UnknownFormat(format.to_string()));
    }
    if version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion {
            file_version: version,
            supported_version: FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Read the manifest of the project in `dir`.
pub fn load_manifest(dir: &Path) -> Result<Manifest, LoadError> {
    let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?;
    check_header(&manifest.format, manifest.version)?;
    Ok(manifest)
}

/// Read the model saved in `dir`, migrating older document files.
pub fn load_model(dir: &Path) -> Result<(Model, ProjectMetadata), LoadError> {
    let manifest = load_manifest(dir)?;
    let mut documents = Vec::with_capacity(manifest.documents.len());
    for entry in &manifest.documents {
        let path = dir.join(&entry.file);
        let raw: DocumentFile<Value> = read_json(&path)?;
        check_header(&raw.format, raw.version)?;
        let migrated = if raw.version < FORMAT_VERSION {
            debug!(document = %entry.name, from = raw.version, "migrating document");
            migrate(raw.document, raw.version, FORMAT_VERSION)?
        } else {
            raw.document
        };
        let document: Document = serde_json::from_value(migrated).map_err(|e| LoadError::parse(&path, e))?;
        documents.push(document);
    }

    match documents.first() {
        Some(root) if root.name == ROOT_DOCUMENT => {}
        other => {
            return Err(LoadError::BadRoot {
                found: other.map(|d| d.name.clone()).unwrap_or_default(),
                expected: ROOT_DOCUMENT.to_string(),
            })
        }
    }
    let model = Model { documents };
    for feature in &model.root().features {
        if let Some(name) = &feature.document {
            if model.document_index(name).is_none() {
                return Err(LoadError::MissingDocument(name.clone()));
            }
        }
    }
    info!(dir = %dir.display(), documents = model.documents.len(), "project loaded");
    Ok((model, manifest.project))
}

/// Open the project in `dir` as a new session over `kernel`.
///
/// Shapes are rebuilt from the saved features; parts start inactive.
pub fn load_session(
    dir: &Path,
    config: EngineConfig,
    kernel: Box<dyn KernelBundle>,
) -> Result<(Session, ProjectMetadata), LoadError> {
    let (model, metadata) = load_model(dir)?;
    Ok((Session::from_model(config, kernel, model), metadata))
}
