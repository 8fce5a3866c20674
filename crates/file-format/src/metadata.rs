use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name and timestamps of a saved model, written into the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub created: DateTime<Utc>,
    /// Time of the most recent save.
    pub modified: DateTime<Utc>,
}

impl ProjectMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created: now,
            modified: now,
        }
    }

    /// Copy with `modified` set to now; `created` is untouched.
    pub fn touched(&self) -> Self {
        Self {
            modified: Utc::now().max(self.created),
            ..self.clone()
        }
    }
}
