//! Client error types.

use videra_protocol::ProtocolError;
use videra_transfer::TransferError;

/// Errors produced while uploading a file group.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The master could not be reached or did not hand out an upload URL.
    /// Triggers endpoint rotation.
    #[error("master {address} unavailable: {reason}")]
    Master { address: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error(
        "transfer {transfer_id} incomplete: stream ended at offset {offset} of {total} without completion"
    )]
    Incomplete {
        transfer_id: String,
        offset: u64,
        total: u64,
    },

    #[error("server kept resuming transfer {transfer_id} at offset {offset} without progress")]
    Stalled { transfer_id: String, offset: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("upload failed after {attempts} attempts: {last_error}")]
    UploadFailed { attempts: u32, last_error: String },
}

impl IngestError {
    /// Returns `true` for failures that should move the client to the next
    /// master.
    pub fn is_master_failure(&self) -> bool {
        matches!(self, IngestError::Master { .. })
    }
}
