//! Engine error types.

use bounce_graph::GraphError;

/// Errors raised while driving a render.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The tree produces no audio at all.
    #[error("didn't find any audio to render")]
    NoAudioToRender,

    /// The output destination refused to open.
    #[error("couldn't write to the target destination")]
    CannotWriteTarget,

    /// The node tree failed to prepare or process.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The output writer failed mid-render.
    #[error("output writer error: {0}")]
    Writer(#[from] bounce_io::Error),
}

/// Convenience alias for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
