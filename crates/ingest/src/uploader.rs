//! The chunked stream uploader.
//!
//! Streams a file group as one virtual byte stream, one `APPEND` request per
//! chunk, and follows the data node's steering: continue, complete, resume
//! at another offset, or resend in smaller chunks.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use videra_protocol::{ChunkOutcome, ProtocolError};
use videra_transfer::{GroupReader, resolve_offset};

use crate::error::IngestError;
use crate::session::TransferSession;
use crate::transport::IngestTransport;
use crate::types::UploadEvent;

/// Resume signals tolerated in a row without an accepted chunk.
pub const MAX_CONSECUTIVE_RESUMES: u32 = 16;

/// Sends the bytes of one initiated transfer.
pub struct ChunkUploader<'a> {
    transport: &'a dyn IngestTransport,
    events: Option<&'a mpsc::Sender<UploadEvent>>,
}

impl<'a> ChunkUploader<'a> {
    pub fn new(
        transport: &'a dyn IngestTransport,
        events: Option<&'a mpsc::Sender<UploadEvent>>,
    ) -> Self {
        Self { transport, events }
    }

    /// Uploads the session's group from its current global offset until the
    /// server signals completion.
    ///
    /// Running out of bytes without a completion signal is an error: the
    /// server has not confirmed the transfer.
    pub async fn upload(&self, session: &mut TransferSession<'_>) -> Result<(), IngestError> {
        let group = session.group();
        let sizes = group.sizes();
        let total = group.total_size();

        let mut reader = GroupReader::new(group);
        if session.global_offset() > 0 {
            reader.seek_global(session.global_offset()).await?;
        }
        let mut resumes_in_a_row = 0u32;

        loop {
            let Some(chunk) = reader.next_chunk(session.chunk_size()).await? else {
                warn!(
                    transfer_id = %session.transfer_id(),
                    offset = session.global_offset(),
                    total,
                    "reached end of last file without completion"
                );
                return Err(IngestError::Incomplete {
                    transfer_id: session.transfer_id().to_string(),
                    offset: session.global_offset(),
                    total,
                });
            };
            let sent = chunk.len();
            let offset = session.global_offset();

            let resp = self
                .transport
                .send_append(session.upload_url(), session.transfer_id(), offset, chunk.data)
                .await?;

            match resp.outcome() {
                ChunkOutcome::Completed => {
                    session.advance(sent);
                    self.emit(UploadEvent::Progress {
                        offset: session.global_offset(),
                        total,
                    })
                    .await;
                    info!(
                        transfer_id = %session.transfer_id(),
                        bytes = session.global_offset(),
                        "transfer completed"
                    );
                    return Ok(());
                }
                ChunkOutcome::Accepted { max_request_size } => {
                    resumes_in_a_row = 0;
                    session.advance(sent);
                    debug!(
                        transfer_id = %session.transfer_id(),
                        offset = session.global_offset(),
                        total,
                        "chunk accepted"
                    );
                    if let Some(size) = max_request_size
                        && size != session.chunk_size()
                    {
                        self.change_chunk_size(session, size).await;
                    }
                    self.emit(UploadEvent::Progress {
                        offset: session.global_offset(),
                        total,
                    })
                    .await;
                }
                ChunkOutcome::ResumeAt(new_offset) => {
                    resumes_in_a_row += 1;
                    if resumes_in_a_row > MAX_CONSECUTIVE_RESUMES {
                        return Err(IngestError::Stalled {
                            transfer_id: session.transfer_id().to_string(),
                            offset: new_offset,
                        });
                    }

                    warn!(
                        transfer_id = %session.transfer_id(),
                        from = offset,
                        to = new_offset,
                        "offset mismatch, resuming at server offset"
                    );
                    let position = resolve_offset(&sizes, new_offset)?;
                    session.resume_at(new_offset);
                    self.emit(UploadEvent::Resumed {
                        from: offset,
                        to: new_offset,
                    })
                    .await;

                    if position.is_end(sizes.len()) {
                        info!(
                            transfer_id = %session.transfer_id(),
                            bytes = new_offset,
                            "server already holds the whole group"
                        );
                        return Ok(());
                    }
                    reader.seek(position).await?;
                }
                ChunkOutcome::ShrinkChunk(size) => {
                    if size >= sent {
                        return Err(ProtocolError::ChunkNotShrunk {
                            requested: size,
                            sent,
                        }
                        .into());
                    }
                    reader.rewind(sent).await?;
                    self.change_chunk_size(session, size).await;
                }
                ChunkOutcome::Fatal(e) => {
                    warn!(
                        transfer_id = %session.transfer_id(),
                        offset,
                        error = %e,
                        "append rejected"
                    );
                    return Err(e.into());
                }
            }
        }
    }

    async fn change_chunk_size(&self, session: &mut TransferSession<'_>, size: u64) {
        let from = session.chunk_size();
        info!(
            transfer_id = %session.transfer_id(),
            from,
            to = size,
            "chunk size changed by server"
        );
        session.set_chunk_size(size);
        self.emit(UploadEvent::ChunkSizeChanged { from, to: size }).await;
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}
