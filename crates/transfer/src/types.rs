use std::fmt;

/// Handle for a task registered with a [`ProgressSink`](crate::ProgressSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Wraps a raw id, for sinks that allocate their own handles.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric id, stable for the lifetime of the tracker.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Which side of a transfer a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    Remote,
    Local,
}

impl fmt::Display for PathOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathOrigin::Remote => f.write_str("remote"),
            PathOrigin::Local => f.write_str("local"),
        }
    }
}

/// A single file transfer as seen by the progress tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Display name (usually the file name).
    pub name: String,
    /// Expected size in bytes.
    pub total_bytes: u64,
    /// Bytes reported so far.
    pub completed_bytes: u64,
    /// Set once the transfer has been marked complete.
    pub finished: bool,
}

/// A contiguous range of file data read for upload.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Number of bytes in this chunk.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte range this chunk covers within a file of `total` bytes.
    pub fn content_range(&self, total: u64) -> ContentRange {
        ContentRange::new(self.offset, self.data.len() as u64, total)
    }
}

/// Value of an HTTP `Content-Range` header (`bytes start-end/total`).
///
/// `end` is inclusive, as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    /// Range of `len` bytes starting at `start`. `len` must be non-zero;
    /// an empty range has no inclusive end on the wire.
    pub fn new(start: u64, len: u64, total: u64) -> Self {
        debug_assert!(len > 0, "empty content range at offset {start}");
        Self {
            start,
            end: (start + len).saturating_sub(1),
            total,
        }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_header_value() {
        let range = ContentRange::new(0, 4 * 1024 * 1024, 10_000_000);
        assert_eq!(range.to_string(), "bytes 0-4194303/10000000");
        assert_eq!(range.len(), 4 * 1024 * 1024);
    }

    #[test]
    fn content_range_last_partial_chunk() {
        let range = ContentRange::new(8, 2, 10);
        assert_eq!(range.to_string(), "bytes 8-9/10");
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn inverted_range_is_empty() {
        let range = ContentRange {
            start: 5,
            end: 4,
            total: 10,
        };
        assert_eq!(range.len(), 0);
        assert!(range.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "empty content range")]
    fn zero_length_range_is_rejected() {
        let _ = ContentRange::new(5, 0, 10);
    }

    #[test]
    fn chunk_content_range_uses_offset() {
        let chunk = Chunk {
            offset: 100,
            data: vec![0u8; 50],
        };
        assert_eq!(chunk.content_range(1000).to_string(), "bytes 100-149/1000");
        assert_eq!(chunk.len(), 50);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn path_origin_display() {
        assert_eq!(PathOrigin::Remote.to_string(), "remote");
        assert_eq!(PathOrigin::Local.to_string(), "local");
    }
}
