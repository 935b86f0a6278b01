//! Packed record format of the index.
//!
//! Every record starts with a 32-bit little-endian header word:
//!
//! ```text
//!  31   30   29..24  23..0
//! [P]  [K]   kind    size
//! ```
//!
//! - `P` (`PointerIsIndex`): the record's offset field is a [`RecordOffset`]
//!   into the index instead of a stream offset
//! - `K` (`KeySmall`): a hash slot stores its key bytes inline
//! - `kind`: Empty, Scalar, Array or Hash
//! - `size`: element count, slot count or key length
//!
//! Three shapes are built from that header:
//!
//! | shape   | layout                                   | bytes          |
//! |---------|------------------------------------------|----------------|
//! | element | header, offset                           | 8              |
//! | array   | header, offset, `size` x element         | 8 + 8 x size   |
//! | hash    | header, offset, `size` x hash slot       | 8 + 16 x size  |
//!
//! A hash slot is `header, value offset, key[8]`; see [`crate::keys`].

use crate::arena::{Arena, RecordOffset};
use crate::error::{Error, Result};

/// Size of an element record or array slot.
pub const ELEMENT_SIZE: usize = 8;
/// Size of a hash slot.
pub const HASH_SLOT_SIZE: usize = 16;
/// Size of the fixed part of array and hash records.
pub const CONTAINER_HEADER_SIZE: usize = 8;
/// Largest value the 24-bit size field can hold.
pub const MAX_SIZE: u32 = 0x00FF_FFFF;

const KIND_SHIFT: u32 = 24;
const KIND_BITS: u32 = 0x3F;
const FLAG_POINTER_IS_INDEX: u32 = 1 << 31;
const FLAG_KEY_SMALL: u32 = 1 << 30;

/// Record kind stored in the header's kind bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Empty = 0,
    Scalar = 1,
    Array = 2,
    Hash = 3,
}

impl Kind {
    /// Decode kind bits (flags already masked out).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKind` for values above 3.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Kind::Empty),
            1 => Ok(Kind::Scalar),
            2 => Ok(Kind::Array),
            3 => Ok(Kind::Hash),
            other => Err(Error::InvalidKind(other)),
        }
    }

    /// Get the kind name as a string (for errors and dumps).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Kind::Empty => "empty",
            Kind::Scalar => "scalar",
            Kind::Array => "array",
            Kind::Hash => "hash",
        }
    }
}

/// Unpacked record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: Kind,
    pub pointer_is_index: bool,
    pub key_small: bool,
    pub size: u32,
}

impl Header {
    /// Header of the given kind with no flags and size 0.
    #[inline]
    #[must_use]
    pub const fn new(kind: Kind) -> Self {
        Self {
            kind,
            pointer_is_index: false,
            key_small: false,
            size: 0,
        }
    }

    /// Scalar header whose offset refers to another index record.
    #[inline]
    #[must_use]
    pub const fn indirection() -> Self {
        Self {
            kind: Kind::Scalar,
            pointer_is_index: true,
            key_small: false,
            size: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_pointer_is_index(mut self, on: bool) -> Self {
        self.pointer_is_index = on;
        self
    }

    /// Pack into the on-arena word. `size` is truncated to 24 bits.
    #[must_use]
    pub fn pack(self) -> u32 {
        let mut word = ((self.kind as u32) << KIND_SHIFT) | (self.size & MAX_SIZE);
        if self.pointer_is_index {
            word |= FLAG_POINTER_IS_INDEX;
        }
        if self.key_small {
            word |= FLAG_KEY_SMALL;
        }
        word
    }

    /// Unpack an on-arena word.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKind` if the kind bits are out of range.
    pub fn unpack(word: u32) -> Result<Self> {
        Ok(Self {
            kind: Kind::from_bits(((word >> KIND_SHIFT) & KIND_BITS) as u8)?,
            pointer_is_index: word & FLAG_POINTER_IS_INDEX != 0,
            key_small: word & FLAG_KEY_SMALL != 0,
            size: word & MAX_SIZE,
        })
    }
}

/// Header and offset pair: a scalar record, an array slot, or the value half
/// of a hash slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub header: Header,
    pub offset: u32,
}

impl Element {
    /// Read the element at `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if `at` is outside the used arena or the header is
    /// invalid.
    pub fn read(arena: &Arena, at: RecordOffset) -> Result<Self> {
        Ok(Self {
            header: Header::unpack(arena.read_u32(at)?)?,
            offset: arena.read_u32(at.add(4))?,
        })
    }

    /// Write this element at `at`.
    pub(crate) fn write(self, arena: &mut Arena, at: RecordOffset) -> Result<()> {
        arena.write_u32(at, self.header.pack())?;
        arena.write_u32(at.add(4), self.offset)
    }
}

/// Allocate and fill an element record.
pub fn allocate_scalar(arena: &mut Arena, header: Header, offset: u32) -> Option<RecordOffset> {
    tracing::trace!(kind = header.kind.name(), offset, "allocate element");
    let at = arena.allocate(ELEMENT_SIZE)?;
    Element { header, offset }.write(arena, at).ok()?;
    Some(at)
}

/// Allocate an array record with `len` zeroed slots.
///
/// Returns `None` when `len` does not fit the size field or the arena is
/// exhausted.
pub fn allocate_array(
    arena: &mut Arena,
    len: usize,
    header: Header,
    offset: u32,
) -> Option<RecordOffset> {
    allocate_container(arena, len, ELEMENT_SIZE, header, offset)
}

/// Allocate a hash record with `slots` zeroed hash slots.
///
/// Returns `None` when `slots` does not fit the size field or the arena is
/// exhausted.
pub fn allocate_hash(
    arena: &mut Arena,
    slots: usize,
    header: Header,
    offset: u32,
) -> Option<RecordOffset> {
    allocate_container(arena, slots, HASH_SLOT_SIZE, header, offset)
}

fn allocate_container(
    arena: &mut Arena,
    len: usize,
    slot_size: usize,
    header: Header,
    offset: u32,
) -> Option<RecordOffset> {
    tracing::trace!(kind = header.kind.name(), len, "allocate container");
    if len > MAX_SIZE as usize {
        return None;
    }
    let at = arena.allocate(CONTAINER_HEADER_SIZE + len * slot_size)?;
    let header = header.with_size(len as u32);
    Element { header, offset }.write(arena, at).ok()?;
    Some(at)
}

/// Offset of the first slot of a container record.
#[inline]
#[must_use]
pub fn table_start(record: RecordOffset) -> RecordOffset {
    record.add(CONTAINER_HEADER_SIZE as u32)
}

/// Offset of array slot `i` in a table starting at `table`.
#[inline]
#[must_use]
pub fn array_slot(table: RecordOffset, i: u32) -> RecordOffset {
    table.add(i * ELEMENT_SIZE as u32)
}

/// Offset of hash slot `i` in a table starting at `table`.
#[inline]
#[must_use]
pub fn hash_slot(table: RecordOffset, i: u32) -> RecordOffset {
    table.add(i * HASH_SLOT_SIZE as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_bits() {
        assert_eq!(Kind::from_bits(0).unwrap(), Kind::Empty);
        assert_eq!(Kind::from_bits(1).unwrap(), Kind::Scalar);
        assert_eq!(Kind::from_bits(2).unwrap(), Kind::Array);
        assert_eq!(Kind::from_bits(3).unwrap(), Kind::Hash);
        assert_eq!(Kind::from_bits(4), Err(Error::InvalidKind(4)));
    }

    #[test]
    fn header_words() {
        assert_eq!(Header::new(Kind::Empty).pack(), 0x0000_0000);
        assert_eq!(Header::new(Kind::Scalar).pack(), 0x0100_0000);
        assert_eq!(Header::new(Kind::Array).with_size(3).pack(), 0x0200_0003);
        assert_eq!(Header::indirection().pack(), 0x8100_0000);

        let key = Header {
            kind: Kind::Hash,
            pointer_is_index: true,
            key_small: true,
            size: 5,
        };
        assert_eq!(key.pack(), 0xC300_0005);
    }

    #[test]
    fn kind_masks_flags() {
        let header = Header::unpack(0xC100_0002).unwrap();
        assert_eq!(header.kind, Kind::Scalar);
        assert!(header.pointer_is_index);
        assert!(header.key_small);
        assert_eq!(header.size, 2);

        assert_eq!(Header::unpack(0x0400_0000), Err(Error::InvalidKind(4)));
    }

    #[test]
    fn size_is_24_bits() {
        let header = Header::new(Kind::Array).with_size(MAX_SIZE);
        assert_eq!(Header::unpack(header.pack()).unwrap().size, MAX_SIZE);
    }

    #[test]
    fn scalar_record() {
        let mut arena = Arena::new(16).unwrap();
        let at = allocate_scalar(&mut arena, Header::new(Kind::Scalar), 42).unwrap();
        assert_eq!(at, RecordOffset::ROOT);
        assert_eq!(arena.as_bytes(), &[0, 0, 0, 1, 42, 0, 0, 0]);

        let element = Element::read(&arena, at).unwrap();
        assert_eq!(element.header, Header::new(Kind::Scalar));
        assert_eq!(element.offset, 42);
    }

    #[test]
    fn container_sizes() {
        let mut arena = Arena::new(1024).unwrap();
        let header = Header::new(Kind::Array).with_pointer_is_index(true);
        let array = allocate_array(&mut arena, 3, header, 7).unwrap();
        assert_eq!(arena.used(), 8 + 3 * 8);

        let header = Header::new(Kind::Hash).with_pointer_is_index(true);
        let hash = allocate_hash(&mut arena, 4, header, 9).unwrap();
        assert_eq!(arena.used(), 32 + 8 + 4 * 16);

        let element = Element::read(&arena, array).unwrap();
        assert_eq!(element.header.kind, Kind::Array);
        assert_eq!(element.header.size, 3);
        assert_eq!(element.offset, 7);

        let element = Element::read(&arena, hash).unwrap();
        assert_eq!(element.header.kind, Kind::Hash);
        assert_eq!(element.header.size, 4);
        assert!(element.header.pointer_is_index);
    }

    #[test]
    fn container_allocation_fails_softly() {
        let mut arena = Arena::new(16).unwrap();
        assert_eq!(allocate_array(&mut arena, 2, Header::new(Kind::Array), 0), None);
        assert_eq!(arena.used(), 0);
        assert_eq!(
            allocate_hash(&mut arena, MAX_SIZE as usize + 1, Header::new(Kind::Hash), 0),
            None
        );
    }

    #[test]
    fn slot_offsets() {
        let table = table_start(RecordOffset::new(8));
        assert_eq!(table, RecordOffset::new(16));
        assert_eq!(array_slot(table, 2), RecordOffset::new(32));
        assert_eq!(hash_slot(table, 2), RecordOffset::new(48));
    }
}
