use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the recipe engine
#[derive(Error, Debug)]
pub enum RecipeEngineError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system errors, with the offending path
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ingredient descriptor file that cannot be used
    #[error("Malformed descriptor '{file}': {reason}")]
    MalformedDescriptor { file: String, reason: String },

    /// Recipe corpus errors
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Two recipes share the same lowercase name
    #[error("Duplicate dish name in corpus: {0}")]
    DuplicateDish(String),

    /// Query dish is not in the corpus
    #[error("Dish not found: {0}")]
    DishNotFound(String),

    /// No dish has been submitted yet
    #[error("No dish selection has been submitted")]
    NoSelection,

    /// Bad request parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl RecipeEngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecipeEngineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is a query-time lookup miss rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RecipeEngineError::DishNotFound(_) | RecipeEngineError::NoSelection
        )
    }
}

impl From<String> for RecipeEngineError {
    fn from(s: String) -> Self {
        RecipeEngineError::Other(s)
    }
}

impl From<&str> for RecipeEngineError {
    fn from(s: &str) -> Self {
        RecipeEngineError::Other(s.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RecipeEngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(RecipeEngineError::DishNotFound("x".into()).is_not_found());
        assert!(RecipeEngineError::NoSelection.is_not_found());
        assert!(!RecipeEngineError::Corpus("bad".into()).is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let err = RecipeEngineError::MalformedDescriptor {
            file: "0 eggs.json".into(),
            reason: "missing field `molecules`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed descriptor '0 eggs.json': missing field `molecules`"
        );
    }
}
