//! Error types for Haetae

/// Result type alias using Haetae's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Haetae operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A raw annotation carried a label code that cannot be interpreted
    #[error("malformed label {label:?} at {context}")]
    MalformedLabel {
        /// The offending label string
        label: String,
        /// Where it came from (file, row number)
        context: String,
    },

    /// A corpus file required by a pipeline stage is missing
    #[error("corpus not found: {0}")]
    CorpusNotFound(std::path::PathBuf),

    /// A corpus file exists but is not structurally valid
    #[error("corpus parse error: {0}")]
    CorpusParse(String),

    /// The dataset is too small for a stratified split
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// An adapter artifact was attached to the wrong backbone
    #[error("backbone mismatch: adapter was trained for {expected:?}, got {actual:?}")]
    BackboneMismatch {
        /// Backbone identifier recorded in the adapter artifact
        expected: String,
        /// Backbone identifier the caller tried to compose with
        actual: String,
    },

    /// Model loading or inference errors
    #[error("model error: {0}")]
    Model(String),

    /// Classification backend errors
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed-label error with row context
    pub fn malformed_label(label: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MalformedLabel {
            label: label.into(),
            context: context.into(),
        }
    }

    /// Create a new corpus-parse error
    pub fn corpus_parse(msg: impl Into<String>) -> Self {
        Self::CorpusParse(msg.into())
    }

    /// Create a new insufficient-data error
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
