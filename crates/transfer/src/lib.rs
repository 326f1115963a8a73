//! File groups and the virtual byte stream they form during an upload.
//!
//! A file group (one video, or a model with its config and code files) is
//! transferred as the concatenation of its files. Progress is a single global
//! offset into that concatenation, so resuming means mapping the offset back
//! to a file and a position inside it.

mod offset;
mod stream;
mod types;

use std::path::PathBuf;

pub use offset::{StreamPosition, resolve_offset};
pub use stream::{Chunk, GroupReader};
pub use types::{FileGroup, FileSpec, MODEL_UPLOAD_ORDER};

/// Default chunk size: 4 MiB.
///
/// Data nodes may override it at init time or shrink it mid-transfer.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("offset {offset} exceeds group size {total}")]
    OffsetOutOfRange { offset: u64, total: u64 },

    #[error("file index {index} out of range for a group of {len} files")]
    FileIndexOutOfRange { index: usize, len: usize },

    #[error("invalid file group: {0}")]
    InvalidGroup(String),
}

impl TransferError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
