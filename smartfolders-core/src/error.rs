//! Error types for smartfolders operations

#[derive(Debug, thiserror::Error)]
pub enum SmartFoldersError {
    #[error("Unknown folder: {selector}")]
    UnknownFolder { selector: String },

    #[error("Index gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Cache lock poisoned")]
    CachePoisoned,
}
