//! Pipeline error taxonomy.
//!
//! Every fatal condition in the answer pipeline maps onto one of these
//! variants. The sanitizer and the vagueness classifier are total functions
//! and never produce an error; collaborator adapters wrap their transport
//! failures into `Generation`/`Synthesis` so the server layer can decide
//! what the caller is allowed to see.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Empty or missing question. Surfaced to the caller as-is, before any
    /// downstream call is made.
    #[error("validation error: {0}")]
    Validation(String),

    /// Source document unreadable or the chunk store rejected the batch
    /// during reindexing. Fatal to the indexing job.
    #[error("index error: {0}")]
    Index(String),

    /// Chunk store unreachable at query time. An empty result set is not an
    /// error; failing to open the store is.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Generation collaborator returned a non-success response.
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech-synthesis collaborator returned a non-success response
    /// (quota exhausted, unknown voice id, ...).
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Invalid configuration detected at startup.
    #[error("config error: {0}")]
    Config(String),
}
