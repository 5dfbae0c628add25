//! Error taxonomy surfaced through the registered error callback.

use thiserror::Error;

use crate::adapter::PipelineState;

/// Everything the player reports through its error callback.
///
/// Open failures additionally make `open` return false; a pipeline error
/// drained from the bus additionally forces an automatic close. Operations
/// on a closed player are guarded no-ops and never produce one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    /// The engine runtime is not usable.
    #[error("pipeline runtime unavailable: {0}")]
    RuntimeInit(String),

    /// `open` was called with an empty media path.
    #[error("media path is empty")]
    EmptyPath,

    /// The path is neither a loadable file nor a URI.
    #[error("unusable media path {path:?}: {reason}")]
    BadPath { path: String, reason: String },

    /// The discoverer could not produce facts for the URI.
    #[error("could not probe {uri}: {reason}")]
    Probe { uri: String, reason: String },

    /// The engine rejected the pipeline description.
    #[error("could not build pipeline: {0}")]
    Build(String),

    /// Preroll did not settle in `target` within the configured timeout.
    #[error("pipeline failed to reach the {target} state while prerolling")]
    Preroll { target: PipelineState },

    /// Fatal error drained from the pipeline bus; the session was closed.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}
