use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::offset::{StreamPosition, resolve_offset};
use crate::types::FileGroup;
use crate::TransferError;

/// A slice of group bytes read from a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Starting offset within the group's virtual byte stream.
    pub offset: u64,
    /// File the bytes were read from.
    pub file_index: usize,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads a file group as one virtual byte stream.
///
/// Chunks never span two files. Reads are bounded by the sizes recorded
/// when the group was built, so the stream length always matches what the
/// data node was told at init time.
pub struct GroupReader<'a> {
    group: &'a FileGroup,
    /// Cumulative size of all files before each index.
    starts: Vec<u64>,
    index: usize,
    local_offset: u64,
    file: Option<File>,
}

impl<'a> GroupReader<'a> {
    /// Creates a reader positioned at the start of the group. Files are
    /// opened lazily.
    pub fn new(group: &'a FileGroup) -> Self {
        let starts = group
            .files()
            .iter()
            .scan(0u64, |acc, f| {
                let start = *acc;
                *acc += f.size;
                Some(start)
            })
            .collect();
        Self {
            group,
            starts,
            index: 0,
            local_offset: 0,
            file: None,
        }
    }

    /// Current read position.
    pub fn position(&self) -> StreamPosition {
        StreamPosition {
            file_index: self.index,
            local_offset: self.local_offset,
        }
    }

    /// Current read position as a global stream offset.
    pub fn global_offset(&self) -> u64 {
        match self.starts.get(self.index) {
            Some(start) => start + self.local_offset,
            None => self.group.total_size(),
        }
    }

    /// Returns `true` once every file has been consumed.
    pub fn is_finished(&self) -> bool {
        self.index >= self.group.files().len()
    }

    /// Closes the current file and reopens the stream at `position`.
    pub async fn seek(&mut self, position: StreamPosition) -> Result<(), TransferError> {
        let group = self.group;
        let len = group.files().len();
        if position.file_index > len {
            return Err(TransferError::FileIndexOutOfRange {
                index: position.file_index,
                len,
            });
        }

        self.file = None;
        self.index = position.file_index;
        self.local_offset = 0;
        if position.is_end(len) {
            return Ok(());
        }

        let spec = &group.files()[self.index];
        if position.local_offset > spec.size {
            return Err(TransferError::OffsetOutOfRange {
                offset: position.local_offset,
                total: spec.size,
            });
        }
        self.local_offset = position.local_offset;
        self.open_current().await
    }

    /// Repositions the stream at a global offset.
    pub async fn seek_global(&mut self, offset: u64) -> Result<StreamPosition, TransferError> {
        let position = resolve_offset(&self.group.sizes(), offset)?;
        self.seek(position).await?;
        Ok(position)
    }

    /// Moves the read position back by `len` bytes within the current file.
    ///
    /// Used to resend a chunk the server rejected as a whole.
    pub async fn rewind(&mut self, len: u64) -> Result<(), TransferError> {
        if len > self.local_offset {
            return Err(TransferError::OffsetOutOfRange {
                offset: len,
                total: self.local_offset,
            });
        }
        self.local_offset -= len;
        let group = self.group;
        if let Some(file) = self.file.as_mut() {
            let path = &group.files()[self.index].path;
            file.seek(SeekFrom::Start(self.local_offset))
                .await
                .map_err(|e| TransferError::io("seek", path, e))?;
        }
        Ok(())
    }

    /// Reads up to `chunk_size` bytes from the current file, moving on to
    /// the next file at end-of-file. Returns `None` once the last file is
    /// exhausted.
    pub async fn next_chunk(&mut self, chunk_size: u64) -> Result<Option<Chunk>, TransferError> {
        let group = self.group;
        loop {
            let Some(spec) = group.files().get(self.index) else {
                return Ok(None);
            };

            let remaining = spec.size.saturating_sub(self.local_offset);
            if remaining == 0 {
                debug!(file = %spec.name, path = %spec.path.display(), "finished file");
                self.file = None;
                self.index += 1;
                self.local_offset = 0;
                continue;
            }

            if self.file.is_none() {
                self.open_current().await?;
            }
            let Some(file) = self.file.as_mut() else {
                continue;
            };

            let want = usize::try_from(remaining.min(chunk_size)).unwrap_or(usize::MAX);
            let mut buf = vec![0u8; want];
            let mut filled = 0;
            while filled < want {
                let n = file
                    .read(&mut buf[filled..])
                    .await
                    .map_err(|e| TransferError::io("read", &spec.path, e))?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                return Err(TransferError::io(
                    "read",
                    &spec.path,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "file ended at {} of {} bytes",
                            self.local_offset, spec.size
                        ),
                    ),
                ));
            }
            buf.truncate(filled);

            let chunk = Chunk {
                offset: self.starts[self.index] + self.local_offset,
                file_index: self.index,
                data: buf,
            };
            self.local_offset += filled as u64;
            return Ok(Some(chunk));
        }
    }

    async fn open_current(&mut self) -> Result<(), TransferError> {
        let group = self.group;
        let spec = &group.files()[self.index];
        let mut file = File::open(&spec.path)
            .await
            .map_err(|e| TransferError::io("open", &spec.path, e))?;
        if self.local_offset > 0 {
            file.seek(SeekFrom::Start(self.local_offset))
                .await
                .map_err(|e| TransferError::io("seek", &spec.path, e))?;
        }
        debug!(
            file = %spec.name,
            path = %spec.path.display(),
            local_offset = self.local_offset,
            "opened file"
        );
        self.file = Some(file);
        Ok(())
    }
}
