use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NameError;

/// Marker of an index-based, order-sensitive name component.
pub const WEAK_TOKEN: &str = "new_weak_name_";

/// A persistent name of a sub-shape.
///
/// Strong names are derived from a stable ancestry and survive unrelated
/// edits. Weak names disambiguate shapes whose derivation collides by their
/// 1-based position in the kernel enumeration order; they may silently
/// retarget when that order changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Name {
    Strong(String),
    Weak {
        /// The colliding derivation; indices are counted within it and only
        /// compare between names sharing it.
        base: String,
        index: usize,
    },
}

impl Name {
    pub fn strong(path: impl Into<String>) -> Self {
        Name::Strong(path.into())
    }

    pub fn is_weak(&self) -> bool {
        matches!(self, Name::Weak { .. })
    }

    /// The strong part of the name.
    pub fn base(&self) -> &str {
        match self {
            Name::Strong(path) => path,
            Name::Weak { base, .. } => base,
        }
    }

    pub fn weak_index(&self) -> Option<usize> {
        match self {
            Name::Strong(_) => None,
            Name::Weak { index, .. } => Some(*index),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Strong(path) => f.write_str(path),
            Name::Weak { base, index } if base.starts_with('[') => {
                write!(f, "{base}[{WEAK_TOKEN}{index}]")
            }
            Name::Weak { base, index } => write!(f, "{base}&{WEAK_TOKEN}{index}"),
        }
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        let bracket_suffix = format!("[{WEAK_TOKEN}");
        if let Some(pos) = s.rfind(&bracket_suffix) {
            let digits = &s[pos + bracket_suffix.len()..];
            if let Some(index) = digits.strip_suffix(']').and_then(|d| d.parse().ok()) {
                return Ok(Name::Weak {
                    base: s[..pos].to_string(),
                    index,
                });
            }
        }
        let amp_suffix = format!("&{WEAK_TOKEN}");
        if let Some(pos) = s.rfind(&amp_suffix) {
            if let Ok(index) = s[pos + amp_suffix.len()..].parse() {
                return Ok(Name::Weak {
                    base: s[..pos].to_string(),
                    index,
                });
            }
        }
        Ok(Name::Strong(s.to_string()))
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
