//! Interpretation of master and data-node responses.

use crate::ProtocolError;
use crate::constants::{
    HEADER_ID, HEADER_MAX_REQUEST_SIZE, HEADER_OFFSET, STATUS_CREATED, STATUS_OK,
};

/// Reply of a master to the upload URL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterResponse {
    pub status: u16,
    pub body: String,
}

impl MasterResponse {
    /// Extracts the upload URL. The whole body is the URL.
    pub fn into_upload_url(self) -> Result<String, ProtocolError> {
        if self.status != STATUS_OK {
            return Err(ProtocolError::UnexpectedStatus {
                status: self.status,
                body: self.body,
            });
        }

        let url = self.body.trim();
        if url.is_empty() {
            return Err(ProtocolError::EmptyUploadUrl);
        }
        Ok(url.to_string())
    }
}

/// What the data node granted when a transfer was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferGrant {
    pub transfer_id: String,
    /// Chunk size the server requires for the whole session, if any.
    pub chunk_size: Option<u64>,
}

/// Reply of the data node to an init request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitResponse {
    pub status: u16,
    pub transfer_id: Option<String>,
    pub max_request_size: Option<String>,
    pub body: String,
}

impl InitResponse {
    pub fn into_grant(self) -> Result<TransferGrant, ProtocolError> {
        if self.status != STATUS_CREATED {
            return Err(ProtocolError::UnexpectedStatus {
                status: self.status,
                body: self.body,
            });
        }

        let transfer_id = present(self.transfer_id.as_deref())
            .ok_or(ProtocolError::MissingHeader(HEADER_ID))?
            .to_string();
        let chunk_size = match present(self.max_request_size.as_deref()) {
            Some(value) => Some(parse_chunk_size(value)?),
            None => None,
        };

        Ok(TransferGrant {
            transfer_id,
            chunk_size,
        })
    }
}

/// Reply of the data node to an append request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendResponse {
    pub status: u16,
    pub offset: Option<String>,
    pub max_request_size: Option<String>,
    pub body: String,
}

/// Result of one chunk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk stored; continue. Following chunks use `max_request_size` when
    /// the server sent one.
    Accepted { max_request_size: Option<u64> },
    /// Server acknowledged the final byte of the transfer.
    Completed,
    /// Server reports its true offset; the client must reposition.
    ResumeAt(u64),
    /// Chunk rejected as too large; resend the same bytes in smaller chunks.
    ShrinkChunk(u64),
    Fatal(ProtocolError),
}

impl AppendResponse {
    /// Classifies the response. `Offset` wins over `Max-Request-Size` when a
    /// failure status carries both.
    pub fn outcome(&self) -> ChunkOutcome {
        match self.status {
            STATUS_CREATED => ChunkOutcome::Completed,
            STATUS_OK => match present(self.max_request_size.as_deref()).map(parse_chunk_size) {
                None => ChunkOutcome::Accepted {
                    max_request_size: None,
                },
                Some(Ok(size)) => ChunkOutcome::Accepted {
                    max_request_size: Some(size),
                },
                Some(Err(e)) => ChunkOutcome::Fatal(e),
            },
            status => {
                if let Some(value) = present(self.offset.as_deref()) {
                    return match parse_u64(HEADER_OFFSET, value) {
                        Ok(offset) => ChunkOutcome::ResumeAt(offset),
                        Err(e) => ChunkOutcome::Fatal(e),
                    };
                }
                if let Some(value) = present(self.max_request_size.as_deref()) {
                    return match parse_chunk_size(value) {
                        Ok(size) => ChunkOutcome::ShrinkChunk(size),
                        Err(e) => ChunkOutcome::Fatal(e),
                    };
                }
                ChunkOutcome::Fatal(ProtocolError::UnexpectedStatus {
                    status,
                    body: self.body.clone(),
                })
            }
        }
    }
}

/// Returns `true` if a failure response carries a header the uploader
/// knows how to recover from.
pub fn has_recovery_header(offset: Option<&str>, max_request_size: Option<&str>) -> bool {
    present(offset).is_some() || present(max_request_size).is_some()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

fn parse_chunk_size(value: &str) -> Result<u64, ProtocolError> {
    match parse_u64(HEADER_MAX_REQUEST_SIZE, value)? {
        0 => Err(ProtocolError::InvalidHeader {
            name: HEADER_MAX_REQUEST_SIZE,
            value: value.to_string(),
        }),
        size => Ok(size),
    }
}
