//! Wire contract of the Videra ingestion service.
//!
//! Masters answer a plain GET with the live data-node upload URL. Data nodes
//! take `init` and `APPEND` requests on that URL, distinguished by the
//! `Request-Type` header, and steer the client through response status codes
//! and headers.

pub mod constants;
pub mod response;
pub mod types;

pub use response::{
    AppendResponse, ChunkOutcome, InitResponse, MasterResponse, TransferGrant,
    has_recovery_header,
};
pub use types::{FileKind, GroupSizes, InitRequest};

/// Errors raised while interpreting a server response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("missing response header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid {name} header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("master returned an empty upload url")]
    EmptyUploadUrl,

    #[error("server asked for {requested}-byte chunks after rejecting a {sent}-byte chunk")]
    ChunkNotShrunk { requested: u64, sent: u64 },
}
