//! Results and progress events of an upload.

use videra_protocol::FileKind;

/// Progress event emitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// A full attempt (1-based) started.
    AttemptStarted { attempt: u32, max_attempts: u32 },
    /// A master failed; the client moved on to `next`.
    MasterFailed {
        master: String,
        next: String,
        error: String,
    },
    /// The master handed out an upload URL.
    UploadUrl { url: String },
    /// The data node opened the transfer.
    Initiated { transfer_id: String, chunk_size: u64 },
    /// Acknowledged bytes of the group.
    Progress { offset: u64, total: u64 },
    /// The server moved the transfer to another offset.
    Resumed { from: u64, to: u64 },
    /// The server dictated a new chunk size.
    ChunkSizeChanged { from: u64, to: u64 },
    /// The attempt failed and will be retried if attempts remain.
    AttemptFailed { attempt: u32, error: String },
    /// The server acknowledged the whole group.
    Completed { transfer_id: String },
}

/// Outcome of a successful group upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub kind: FileKind,
    pub transfer_id: String,
    pub total_bytes: u64,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Outcome of a model upload followed by its associated video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub model: UploadReport,
    pub video: UploadReport,
}
