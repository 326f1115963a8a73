use videra_protocol::TransferGrant;
use videra_transfer::FileGroup;

/// State of one upload attempt.
///
/// Everything a server negotiates (upload URL, transfer id, chunk size,
/// acknowledged offset) lives here and is dropped with the attempt. A retry
/// may land on a different data node and starts from a fresh session.
#[derive(Debug, Clone)]
pub struct TransferSession<'g> {
    group: &'g FileGroup,
    master: String,
    upload_url: String,
    transfer_id: String,
    chunk_size: u64,
    global_offset: u64,
}

impl<'g> TransferSession<'g> {
    pub fn new(
        group: &'g FileGroup,
        master: impl Into<String>,
        upload_url: impl Into<String>,
        chunk_size: u64,
    ) -> Self {
        Self {
            group,
            master: master.into(),
            upload_url: upload_url.into(),
            transfer_id: String::new(),
            chunk_size,
            global_offset: 0,
        }
    }

    /// Records the transfer id and any server-dictated chunk size.
    pub fn apply_grant(&mut self, grant: TransferGrant) {
        self.transfer_id = grant.transfer_id;
        if let Some(size) = grant.chunk_size {
            self.chunk_size = size;
        }
    }

    pub fn group(&self) -> &'g FileGroup {
        self.group
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Empty until the transfer has been initiated.
    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Bytes of the group the server has acknowledged.
    pub fn global_offset(&self) -> u64 {
        self.global_offset
    }

    pub fn total_size(&self) -> u64 {
        self.group.total_size()
    }

    /// Counts `len` acknowledged bytes.
    pub(crate) fn advance(&mut self, len: u64) {
        self.global_offset += len;
    }

    /// Takes the server's offset as the truth, in either direction.
    pub(crate) fn resume_at(&mut self, offset: u64) {
        self.global_offset = offset;
    }

    pub(crate) fn set_chunk_size(&mut self, size: u64) {
        self.chunk_size = size;
    }
}
