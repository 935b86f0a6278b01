//! Fixed-capacity bump arena holding every index record.
//!
//! Records are carved from one zeroed buffer by advancing a cursor. Nothing is
//! freed individually; the arena is cleared or destroyed as a unit. Records
//! refer to each other by [`RecordOffset`], never by address, so the used
//! prefix of the buffer can be copied anywhere and stays valid.

use std::fmt;

use crate::error::{Error, Result};

/// Byte position of a record inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RecordOffset(u32);

impl RecordOffset {
    /// Offset of the index root record.
    pub const ROOT: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Offset `bytes` further into the arena.
    #[inline]
    #[must_use]
    pub const fn add(self, bytes: u32) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for RecordOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:#x}", self.0)
    }
}

/// Append-only byte arena with a fixed capacity.
///
/// # Invariants
/// - `ptr <= buf.len()`; `buf.len()` is the capacity and never changes
///   except through [`Arena::destroy`]
/// - every region handed out by [`Arena::allocate`] lies in `[0, ptr)`
#[derive(Clone, PartialEq, Eq)]
pub struct Arena {
    buf: Vec<u8>,
    ptr: usize,
}

impl Arena {
    /// Create an arena of `capacity` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfMemory` if the buffer cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory {
                requested: capacity,
            })?;
        buf.resize(capacity, 0);
        Ok(Self { buf, ptr: 0 })
    }

    /// Rebuild an arena of `capacity` bytes whose used prefix is `used`.
    pub(crate) fn from_used(capacity: usize, used: &[u8]) -> Result<Self> {
        if used.len() > capacity {
            return Err(Error::InvalidIndex("used bytes exceed arena capacity"));
        }
        let mut arena = Self::new(capacity)?;
        arena.buf[..used.len()].copy_from_slice(used);
        arena.ptr = used.len();
        Ok(arena)
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes handed out so far.
    #[inline]
    #[must_use]
    pub fn used(&self) -> usize {
        self.ptr
    }

    /// Bytes still available.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.ptr
    }

    /// The used prefix of the buffer.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.ptr]
    }

    /// Carve a zeroed region of `size` bytes.
    ///
    /// Returns `None` when the arena cannot fit the region. Callers treat this
    /// as a signal to index more coarsely, not as a failure.
    pub fn allocate(&mut self, size: usize) -> Option<RecordOffset> {
        if self.remaining() < size {
            tracing::trace!(size, remaining = self.remaining(), "arena exhausted");
            return None;
        }
        let start = self.ptr;
        self.ptr += size;
        self.buf[start..self.ptr].fill(0);
        Some(RecordOffset(start as u32))
    }

    /// Reset the cursor to the start of the buffer, keeping the buffer.
    pub fn clear(&mut self) {
        self.ptr = 0;
    }

    /// Release the buffer. Calling it again is a no-op.
    pub fn destroy(&mut self) {
        self.buf = Vec::new();
        self.ptr = 0;
    }

    /// Offset of a record view that points into this arena's used bytes.
    ///
    /// Returns `None` for slices that do not start inside `[0, used)`.
    #[must_use]
    pub fn offset_for(&self, record: &[u8]) -> Option<RecordOffset> {
        let base = self.buf.as_ptr() as usize;
        let addr = record.as_ptr() as usize;
        let offset = addr.checked_sub(base)?;
        if offset >= self.ptr {
            return None;
        }
        Some(RecordOffset(offset as u32))
    }

    /// View of the used bytes starting at `offset`.
    #[must_use]
    pub fn ptr_for_offset(&self, offset: RecordOffset) -> Option<&[u8]> {
        let start = offset.0 as usize;
        if start >= self.ptr {
            return None;
        }
        Some(&self.buf[start..self.ptr])
    }

    /// Read a little-endian word from the used bytes.
    pub(crate) fn read_u32(&self, at: RecordOffset) -> Result<u32> {
        let start = at.0 as usize;
        let bytes = self
            .as_bytes()
            .get(start..start + 4)
            .ok_or(Error::RecordOutOfBounds {
                offset: at.0,
                used: self.ptr,
            })?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Overwrite a little-endian word inside the used bytes.
    pub(crate) fn write_u32(&mut self, at: RecordOffset, value: u32) -> Result<()> {
        self.bytes_mut(at, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read `len` used bytes starting at `at`.
    pub(crate) fn bytes(&self, at: RecordOffset, len: usize) -> Result<&[u8]> {
        let start = at.0 as usize;
        let used = self.ptr;
        self.as_bytes()
            .get(start..start + len)
            .ok_or(Error::RecordOutOfBounds { offset: at.0, used })
    }

    /// Mutable view of `len` used bytes starting at `at`.
    pub(crate) fn bytes_mut(&mut self, at: RecordOffset, len: usize) -> Result<&mut [u8]> {
        let start = at.0 as usize;
        let used = self.ptr;
        self.buf[..used]
            .get_mut(start..start + len)
            .ok_or(Error::RecordOutOfBounds { offset: at.0, used })
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_advances_cursor() {
        let mut arena = Arena::new(32).unwrap();
        assert_eq!(arena.capacity(), 32);
        assert_eq!(arena.used(), 0);

        let a = arena.allocate(8).unwrap();
        let b = arena.allocate(16).unwrap();
        assert_eq!(a, RecordOffset::new(0));
        assert_eq!(b, RecordOffset::new(8));
        assert_eq!(arena.used(), 24);
        assert_eq!(arena.remaining(), 8);
    }

    #[test]
    fn exhaustion_is_a_signal() {
        let mut arena = Arena::new(16).unwrap();
        assert!(arena.allocate(12).is_some());
        assert_eq!(arena.allocate(8), None);
        // a failed request leaves the cursor alone
        assert_eq!(arena.used(), 12);
        assert!(arena.allocate(4).is_some());
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn allocations_are_zeroed_after_clear() {
        let mut arena = Arena::new(8).unwrap();
        let at = arena.allocate(8).unwrap();
        arena.write_u32(at, 0xDEAD_BEEF).unwrap();
        arena.clear();
        assert_eq!(arena.used(), 0);

        let at = arena.allocate(8).unwrap();
        assert_eq!(arena.read_u32(at).unwrap(), 0);
    }

    #[test]
    fn offset_roundtrip() {
        let mut arena = Arena::new(64).unwrap();
        let offsets: Vec<_> = [8, 24, 16].iter().map(|&n| arena.allocate(n).unwrap()).collect();

        for offset in offsets {
            let record = arena.ptr_for_offset(offset).unwrap();
            assert_eq!(arena.offset_for(record), Some(offset));
            let again = arena.ptr_for_offset(arena.offset_for(record).unwrap()).unwrap();
            assert_eq!(again.as_ptr(), record.as_ptr());
        }
    }

    #[test]
    fn offset_for_foreign_slice() {
        let mut arena = Arena::new(16).unwrap();
        arena.allocate(8).unwrap();
        let other = [0u8; 8];
        assert_eq!(arena.offset_for(&other), None);
        assert_eq!(arena.ptr_for_offset(RecordOffset::new(8)), None);
    }

    #[test]
    fn word_access_is_bounded_by_used() {
        let mut arena = Arena::new(16).unwrap();
        let at = arena.allocate(4).unwrap();
        arena.write_u32(at, 7).unwrap();
        assert_eq!(arena.read_u32(at).unwrap(), 7);
        assert_eq!(
            arena.read_u32(RecordOffset::new(4)),
            Err(Error::RecordOutOfBounds { offset: 4, used: 4 })
        );
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut arena = Arena::new(16).unwrap();
        arena.allocate(8).unwrap();
        arena.destroy();
        assert_eq!(arena.capacity(), 0);
        assert_eq!(arena.used(), 0);
        arena.destroy();
        assert_eq!(arena.allocate(1), None);
    }

    #[test]
    fn absurd_capacity_is_out_of_memory() {
        let err = Arena::new(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfMemory {
                requested: usize::MAX
            }
        );
    }

    #[test]
    fn from_used_restores_cursor() {
        let arena = Arena::from_used(32, &[1, 2, 3, 4]).unwrap();
        assert_eq!(arena.used(), 4);
        assert_eq!(arena.capacity(), 32);
        assert_eq!(arena.as_bytes(), &[1, 2, 3, 4]);
        assert!(Arena::from_used(2, &[1, 2, 3]).is_err());
    }
}
