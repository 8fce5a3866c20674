use std::fs;
use std::path::{Path, PathBuf};

use feature_engine::{Document, Model, Session};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SaveError;
use crate::metadata::ProjectMetadata;

/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Format identifier written into every file.
pub const FORMAT_ID: &str = "feature-model";

/// Name of the manifest inside a project directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One document entry of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    /// File name relative to the project directory.
    pub file: String,
}

/// The project manifest: metadata plus the documents in load order.
/// The part set is always the first entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub version: u32,
    pub project: ProjectMetadata,
    pub documents: Vec<DocumentEntry>,
}

impl Manifest {
    /// Paths of every file the save wrote, manifest first.
    pub fn files(&self, dir: &Path) -> Vec<PathBuf> {
        std::iter::once(dir.join(MANIFEST_FILE))
            .chain(self.documents.iter().map(|d| dir.join(&d.file)))
            .collect()
    }
}

/// One document file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DocumentFile<D> {
    pub format: String,
    pub version: u32,
    pub document: D,
}

/// File name for the document at `index`: its name, restricted to a safe alphabet.
fn file_name(index: usize, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{index:03}_{safe}.json")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SaveError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| SaveError::Serialize(e.to_string()))?;
    fs::write(path, text).map_err(|e| SaveError::io(path, e))
}

/// Write `model` into `dir` as a manifest plus one file per document.
///
/// The directory is created if needed. Files of an earlier save that the
/// new manifest no longer lists are left in place.
pub fn save_model(model: &Model, metadata: &ProjectMetadata, dir: &Path) -> Result<Manifest, SaveError> {
    fs::create_dir_all(dir).map_err(|e| SaveError::io(dir, e))?;

    let mut documents = Vec::with_capacity(model.documents.len());
    for (index, document) in model.documents.iter().enumerate() {
        let entry = DocumentEntry {
            name: document.name.clone(),
            file: file_name(index, &document.name),
        };
        let file: DocumentFile<&Document> = DocumentFile {
            format: FORMAT_ID.to_string(),
            version: FORMAT_VERSION,
            document,
        };
        write_json(&dir.join(&entry.file), &file)?;
        documents.push(entry);
    }

    let manifest = Manifest {
        format: FORMAT_ID.to_string(),
        version: FORMAT_VERSION,
        project: metadata.touched(),
        documents,
    };
    write_json(&dir.join(MANIFEST_FILE), &manifest)?;
    info!(dir = %dir.display(), documents = manifest.documents.len(), "project saved");
    Ok(manifest)
}

/// Save the documents of `session`. Refused while an operation is open.
pub fn save_session(session: &Session, metadata: &ProjectMetadata, dir: &Path) -> Result<Manifest, SaveError> {
    if session.is_operation_open() {
        return Err(SaveError::OperationOpen);
    }
    save_model(session.model(), metadata, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_ordered_and_safe() {
        assert_eq!(file_name(0, "PartSet"), "000_PartSet.json");
        assert_eq!(file_name(12, "Part 1/a"), "012_Part_1_a.json");
    }
}
