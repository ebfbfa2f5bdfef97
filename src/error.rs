//! Error types for the viseme engine.

/// Errors surfaced to callers of the engine.
///
/// Unresolved morph names are *not* errors: they are recorded in the
/// [`ResolutionReport`](crate::resolver::ResolutionReport) and logged.
#[derive(Debug, thiserror::Error)]
pub enum VisemeError {
    /// No morph inventory has been loaded yet.
    #[error("engine not ready: no morph inventory loaded")]
    NotReady,

    /// An explicit setter named a morph that the current asset does not have.
    #[error("unknown morph target '{0}'")]
    UnknownMorph(String),

    /// A profile failed validation; nothing was applied.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VisemeError>;
