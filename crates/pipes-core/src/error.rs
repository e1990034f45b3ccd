use thiserror::Error;

/// Everything that can go wrong while building or running a pipeline graph.
///
/// Structural problems (bad dimension strings, incompatible upstream
/// extents, missing attributes) are distinguished from collaborator
/// failures (`DatasetStore`/`ExprEngine` errors) so callers can tell a
/// malformed graph from a runtime I/O failure.
#[derive(Debug, Error)]
pub enum PipesError {
    #[error("tool {tool}: structural check failed: {reason}")]
    Structure { tool: &'static str, reason: String },

    #[error("tool {tool}: sink {sink} is not connected")]
    Unconnected { tool: &'static str, sink: usize },

    #[error("tool {tool}: sink {sink} is already connected")]
    AlreadyConnected { tool: &'static str, sink: usize },

    #[error("malformed dimension/extent string: {0}")]
    BadDimString(String),

    #[error("dataset store error: {0}")]
    Store(String),

    #[error("expression engine error: {0}")]
    Expr(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PipesError>;
