use core::fmt;

use crate::{align_up, TAG_ALIGN};

/// Append-only bump cursor over a preallocated info block region.
///
/// `allocate(n)` hands out the next `n` bytes and advances the cursor by
/// `n` rounded up to the tag alignment; nothing is ever reused or
/// shrunk. The region must have been sized by the size pass first, but
/// writes past the end are still rejected instead of corrupting memory.
pub struct TagWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The region sized by the size pass is too small. Always a defect in
    /// the size pass, never a runtime condition to recover from.
    OutOfSpace { needed: usize, available: usize },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::OutOfSpace { needed, available } => write!(
                f,
                "info block region exhausted: need {} bytes, {} available",
                needed, available
            ),
        }
    }
}

impl<'a> TagWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset from the start of the block.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next `n` bytes and advances the cursor to the
    /// following tag alignment boundary.
    pub fn allocate(&mut self, n: usize) -> Result<&mut [u8], WriteError> {
        let start = self.pos;
        let end = start + n;

        if end > self.buf.len() {
            return Err(WriteError::OutOfSpace {
                needed: end,
                available: self.buf.len(),
            });
        }

        self.pos = align_up(end, TAG_ALIGN as usize).min(self.buf.len());
        Ok(&mut self.buf[start..end])
    }

    /// Overwrites bytes that were already allocated. Used for the block
    /// header fields that are only known once all tags are written.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.pos);
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], off: usize, value: u64) {
    buf[off..off + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_to_alignment() {
        let mut buf = [0u8; 64];
        let mut writer = TagWriter::new(&mut buf);

        writer.allocate(10).unwrap();
        assert_eq!(writer.position(), 16);

        writer.allocate(8).unwrap();
        assert_eq!(writer.position(), 24);
    }

    #[test]
    fn rejects_writes_past_the_end() {
        let mut buf = [0u8; 16];
        let mut writer = TagWriter::new(&mut buf);

        writer.allocate(8).unwrap();
        let err = writer.allocate(9).unwrap_err();
        assert_eq!(
            err,
            WriteError::OutOfSpace {
                needed: 17,
                available: 16
            }
        );
    }

    #[test]
    fn allocation_is_append_only() {
        let mut buf = [0u8; 32];
        let mut writer = TagWriter::new(&mut buf);

        writer.allocate(8).unwrap().fill(0xaa);
        writer.allocate(8).unwrap().fill(0xbb);

        assert_eq!(&buf[0..8], &[0xaa; 8]);
        assert_eq!(&buf[8..16], &[0xbb; 8]);
    }
}
