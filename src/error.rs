use std::io;
use thiserror::Error;

use crate::types::VertexId;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("vertex {0} does not exist")]
    VertexNotFound(VertexId),
    #[error("format error: {0}")]
    Format(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),
}
