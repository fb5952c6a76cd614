//! Error types for simulation runs.

use thiserror::Error;
use twin_core::KernelError;

/// Errors encountered while driving a graph.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid options document: {0}")]
    Options(#[from] serde_json::Error),

    #[error("Kernel error at t = {time}: {source}")]
    Tick {
        time: f64,
        #[source]
        source: KernelError,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type SimResult<T> = Result<T, SimError>;
