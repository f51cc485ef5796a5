use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LdaError {
    #[error("index format error: {0}")]
    IndexFormat(String),

    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("{kind} id {id} out of range (must be < {bound})")]
    OutOfRange {
        kind: &'static str,
        id: usize,
        bound: usize,
    },

    #[error("corrupt model file {}: {reason}", path.display())]
    CorruptModel { path: PathBuf, reason: String },

    #[error("model file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LdaError>;

impl LdaError {
    pub(crate) fn out_of_range(kind: &'static str, id: usize, bound: usize) -> Self {
        LdaError::OutOfRange { kind, id, bound }
    }
}
