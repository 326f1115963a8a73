//! In-memory master and data node for tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use videra_protocol::constants::{STATUS_CREATED, STATUS_OK};
use videra_protocol::{AppendResponse, InitRequest, InitResponse, MasterResponse};

use crate::error::IngestError;
use crate::transport::{IngestTransport, TransportFuture};

pub const UPLOAD_URL: &str = "http://datanode:8080/upload";

/// Writes `len` bytes of a repeating pattern and returns the path.
pub fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    write_pattern(dir, name, len, 0)
}

/// Like [`write_file`], with the pattern shifted by `seed` so files differ.
pub fn write_pattern(dir: &Path, name: &str, len: usize, seed: u8) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len)
        .map(|i| (i % 251) as u8 ^ seed.wrapping_mul(37))
        .collect();
    std::fs::write(&path, data).unwrap();
    path
}

#[derive(Debug, Clone)]
pub struct AppendCall {
    pub transfer_id: String,
    pub offset: u64,
    pub len: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Transfer {
    total: u64,
    stored: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    master_calls: Vec<String>,
    init_calls: Vec<InitRequest>,
    init_replies: Vec<InitResponse>,
    append_calls: Vec<AppendCall>,
    replies: Vec<u16>,
    transfers: HashMap<String, Transfer>,
    order: Vec<String>,
    next_id: u32,
}

/// Simulated ingestion service.
///
/// Masters hand out [`UPLOAD_URL`]. The data node keeps the durable bytes of
/// every transfer and steers the client the way a real one does: `409` with
/// `Offset` on a mismatch, `413` with `Max-Request-Size` when a chunk is too
/// large, `201` once the last byte is stored.
#[derive(Debug, Default)]
pub struct MockTransport {
    unreachable_masters: HashSet<String>,
    master_replies: HashMap<String, (u16, String)>,
    init_chunk_size: Option<u64>,
    preload: Option<Vec<u8>>,
    max_request_size: Option<u64>,
    never_complete: bool,
    always_resume_at: Option<u64>,
    scripted: HashMap<usize, AppendResponse>,
    append_errors: HashSet<usize>,
    state: Mutex<State>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable_master(mut self, master: &str) -> Self {
        self.unreachable_masters.insert(master.to_string());
        self
    }

    pub fn with_master_reply(mut self, master: &str, status: u16, body: &str) -> Self {
        self.master_replies
            .insert(master.to_string(), (status, body.to_string()));
        self
    }

    pub fn with_init_chunk_size(mut self, size: u64) -> Self {
        self.init_chunk_size = Some(size);
        self
    }

    /// Queues a reply for the next init request. Queued replies are used in
    /// order before the node falls back to its normal behavior.
    pub fn with_init_reply(self, reply: InitResponse) -> Self {
        self.state.lock().unwrap().init_replies.push(reply);
        self
    }

    /// Bytes the node already holds for the first transfer it opens.
    pub fn with_stored(mut self, bytes: &[u8]) -> Self {
        self.preload = Some(bytes.to_vec());
        self
    }

    pub fn with_max_request_size(mut self, size: u64) -> Self {
        self.max_request_size = Some(size);
        self
    }

    /// Stores everything but never answers `201`.
    pub fn never_complete(mut self) -> Self {
        self.never_complete = true;
        self
    }

    pub fn always_resume_at(mut self, offset: u64) -> Self {
        self.always_resume_at = Some(offset);
        self
    }

    /// Replaces the reply to the append call with the given index (0-based,
    /// counted across all transfers). A `200`/`201` script still stores the
    /// chunk; an `Offset` script truncates the durable bytes to that offset.
    pub fn with_append_reply_at(mut self, index: usize, reply: AppendResponse) -> Self {
        self.scripted.insert(index, reply);
        self
    }

    /// Fails the append call with the given index at the transport level.
    pub fn with_append_error_at(mut self, index: usize) -> Self {
        self.append_errors.insert(index);
        self
    }

    pub fn master_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().master_calls.clone()
    }

    pub fn init_calls(&self) -> Vec<InitRequest> {
        self.state.lock().unwrap().init_calls.clone()
    }

    pub fn append_calls(&self) -> Vec<AppendCall> {
        self.state.lock().unwrap().append_calls.clone()
    }

    /// Statuses of the append replies, in order.
    pub fn replies(&self) -> Vec<u16> {
        self.state.lock().unwrap().replies.clone()
    }

    /// Durable bytes of the first transfer opened.
    pub fn stored(&self) -> Vec<u8> {
        self.stored_for(0)
    }

    /// Durable bytes of the `n`-th transfer opened.
    pub fn stored_for(&self, n: usize) -> Vec<u8> {
        let state = self.state.lock().unwrap();
        state
            .order
            .get(n)
            .and_then(|id| state.transfers.get(id))
            .map(|t| t.stored.clone())
            .unwrap_or_default()
    }

    fn master(&self, master: &str) -> Result<MasterResponse, IngestError> {
        self.state
            .lock()
            .unwrap()
            .master_calls
            .push(master.to_string());
        if self.unreachable_masters.contains(master) {
            return Err(connection_error());
        }
        let (status, body) = self
            .master_replies
            .get(master)
            .cloned()
            .unwrap_or((STATUS_OK, UPLOAD_URL.to_string()));
        Ok(MasterResponse { status, body })
    }

    fn init(&self, request: &InitRequest) -> InitResponse {
        let mut state = self.state.lock().unwrap();
        state.init_calls.push(request.clone());
        if !state.init_replies.is_empty() {
            return state.init_replies.remove(0);
        }

        state.next_id += 1;
        let id = format!("t-{}", state.next_id);
        let stored = if state.order.is_empty() {
            self.preload.clone().unwrap_or_default()
        } else {
            Vec::new()
        };
        state.transfers.insert(
            id.clone(),
            Transfer {
                total: request.sizes.total(),
                stored,
            },
        );
        state.order.push(id.clone());

        InitResponse {
            status: STATUS_CREATED,
            transfer_id: Some(id),
            max_request_size: self.init_chunk_size.map(|s| s.to_string()),
            body: String::new(),
        }
    }

    fn append(
        &self,
        transfer_id: &str,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<AppendResponse, IngestError> {
        let mut state = self.state.lock().unwrap();
        let index = state.append_calls.len();
        state.append_calls.push(AppendCall {
            transfer_id: transfer_id.to_string(),
            offset,
            len: data.len() as u64,
            data: data.clone(),
        });

        if self.append_errors.contains(&index) {
            return Err(connection_error());
        }

        let reply = self.append_reply(&mut state, index, transfer_id, offset, &data);
        state.replies.push(reply.status);
        Ok(reply)
    }

    fn append_reply(
        &self,
        state: &mut State,
        index: usize,
        transfer_id: &str,
        offset: u64,
        data: &[u8],
    ) -> AppendResponse {
        if let Some(reply) = self.scripted.get(&index) {
            if let Some(transfer) = state.transfers.get_mut(transfer_id) {
                let resume = reply.offset.as_deref().and_then(|o| o.parse::<usize>().ok());
                if let Some(at) = resume {
                    transfer.stored.truncate(at);
                } else if matches!(reply.status, STATUS_OK | STATUS_CREATED)
                    && offset == transfer.stored.len() as u64
                {
                    transfer.stored.extend_from_slice(data);
                }
            }
            return reply.clone();
        }

        if let Some(at) = self.always_resume_at {
            return conflict(at);
        }

        let Some(transfer) = state.transfers.get_mut(transfer_id) else {
            return AppendResponse {
                status: 404,
                body: format!("unknown transfer {transfer_id}"),
                ..Default::default()
            };
        };

        let durable = transfer.stored.len() as u64;
        if offset != durable {
            return conflict(durable);
        }
        if let Some(max) = self.max_request_size
            && data.len() as u64 > max
        {
            return AppendResponse {
                status: 413,
                max_request_size: Some(max.to_string()),
                ..Default::default()
            };
        }

        transfer.stored.extend_from_slice(data);
        let status = if transfer.stored.len() as u64 >= transfer.total && !self.never_complete {
            STATUS_CREATED
        } else {
            STATUS_OK
        };
        AppendResponse {
            status,
            ..Default::default()
        }
    }
}

/// A real `reqwest::Error`: the request for an invalid URL never leaves the
/// client.
fn connection_error() -> IngestError {
    match reqwest::Client::new().get("http://[::1").build() {
        Ok(_) => panic!("invalid URL built a request"),
        Err(e) => IngestError::Http(e),
    }
}

fn conflict(offset: u64) -> AppendResponse {
    AppendResponse {
        status: 409,
        offset: Some(offset.to_string()),
        ..Default::default()
    }
}

impl IngestTransport for MockTransport {
    fn query_master<'a>(&'a self, master: &'a str) -> TransportFuture<'a, MasterResponse> {
        Box::pin(async move { self.master(master) })
    }

    fn send_init<'a>(
        &'a self,
        _upload_url: &'a str,
        request: &'a InitRequest,
    ) -> TransportFuture<'a, InitResponse> {
        Box::pin(async move { Ok(self.init(request)) })
    }

    fn send_append<'a>(
        &'a self,
        _upload_url: &'a str,
        transfer_id: &'a str,
        offset: u64,
        data: Vec<u8>,
    ) -> TransportFuture<'a, AppendResponse> {
        Box::pin(async move { self.append(transfer_id, offset, data) })
    }
}
