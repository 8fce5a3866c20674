/// Errors from parsing or deriving names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("empty name")]
    Empty,

    #[error("unbalanced brackets in name '{name}'")]
    UnbalancedBrackets { name: String },

    #[error("malformed name '{name}': {reason}")]
    Malformed { name: String, reason: String },
}
