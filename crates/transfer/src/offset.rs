use crate::TransferError;

/// A position inside a file group: which file, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPosition {
    /// Index into the group's files. Equal to the number of files when the
    /// whole group has been consumed.
    pub file_index: usize,
    pub local_offset: u64,
}

impl StreamPosition {
    /// Returns `true` if this is the end-of-group sentinel for `file_count`
    /// files.
    pub fn is_end(&self, file_count: usize) -> bool {
        self.file_index >= file_count
    }
}

/// Maps a global stream offset to the file containing it.
///
/// The target is the first file whose inclusive cumulative size exceeds
/// `offset`. An offset equal to the total size maps to the sentinel
/// `file_index == sizes.len()` with local offset 0. Larger offsets fail.
pub fn resolve_offset(sizes: &[u64], offset: u64) -> Result<StreamPosition, TransferError> {
    let mut before = 0u64;
    for (file_index, &size) in sizes.iter().enumerate() {
        let end = before + size;
        if end > offset {
            return Ok(StreamPosition {
                file_index,
                local_offset: offset - before,
            });
        }
        before = end;
    }

    if offset > before {
        return Err(TransferError::OffsetOutOfRange {
            offset,
            total: before,
        });
    }
    Ok(StreamPosition {
        file_index: sizes.len(),
        local_offset: 0,
    })
}
