//! Read access to a built index.
//!
//! Every slot of the index decodes to an [`Entry`]: nothing, a node that lives
//! only in the original stream, or a nested array or hash record. Indirections
//! (`PointerIsIndex` set on a scalar-shaped slot) are followed transparently.
//!
//! ```
//! use stream_index::{Entry, Index, IndexOptions};
//! use stream_index::stream::from_json;
//!
//! let stream = from_json(r#"{"tags": ["a", "b"]}"#).unwrap();
//! let index = Index::build(&mut stream.iter(), &IndexOptions::default()).unwrap();
//!
//! let Entry::Hash(root) = index.root_entry().unwrap() else { panic!("expected hash") };
//! let Some(Entry::Array(tags)) = root.get(b"tags", &stream).unwrap() else {
//!     panic!("expected array")
//! };
//! assert_eq!(tags.len(), 2);
//! ```

use std::fmt;

use crate::arena::{Arena, RecordOffset};
use crate::error::{Error, Result};
use crate::keys::{KeySource, SlotKey, find_key, read_key};
use crate::record::{
    CONTAINER_HEADER_SIZE, ELEMENT_SIZE, Element, HASH_SLOT_SIZE, Kind, array_slot, hash_slot,
    table_start,
};

/// Decoded content of one index slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<'a> {
    /// Nothing was stored here.
    Empty,
    /// A node to be read from the original stream at `offset`. For
    /// containers this means the subtree was not indexed.
    Stream { kind: Kind, offset: u32 },
    /// A nested array record.
    Array(ArrayRecord<'a>),
    /// A nested hash record.
    Hash(HashRecord<'a>),
}

impl<'a> Entry<'a> {
    /// Decode the element at `at`, following an indirection if there is one.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecordOutOfBounds` or `Error::InvalidKind` for a
    /// damaged arena and `Error::InvalidIndex` for an indirection that does
    /// not land on a container record further into the arena. Records are
    /// always allocated after the slot that refers to them, so following
    /// entries can never loop.
    pub fn read(arena: &'a Arena, at: RecordOffset) -> Result<Self> {
        let element = Element::read(arena, at)?;
        let header = element.header;
        match (header.kind, header.pointer_is_index) {
            (Kind::Empty, _) => Ok(Entry::Empty),
            (kind, false) => Ok(Entry::Stream {
                kind,
                offset: element.offset,
            }),
            (Kind::Scalar, true) => {
                let target = RecordOffset::new(element.offset);
                if target <= at {
                    return Err(Error::InvalidIndex("indirection does not point forward"));
                }
                match Element::read(arena, target)?.header {
                    h if h.pointer_is_index && h.kind != Kind::Scalar => Self::record(arena, target),
                    _ => Err(Error::InvalidIndex("indirection to a non-container record")),
                }
            }
            (Kind::Array | Kind::Hash, true) => Self::record(arena, at),
        }
    }

    fn record(arena: &'a Arena, at: RecordOffset) -> Result<Self> {
        let element = Element::read(arena, at)?;
        match element.header.kind {
            Kind::Array => Ok(Entry::Array(ArrayRecord::new(arena, at, element)?)),
            Kind::Hash => Ok(Entry::Hash(HashRecord::new(arena, at, element)?)),
            other => Err(Error::UnexpectedKind {
                expected: "array or hash record",
                found: other.name(),
            }),
        }
    }

    /// Kind of the node this entry describes.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Entry::Empty => Kind::Empty,
            Entry::Stream { kind, .. } => *kind,
            Entry::Array(_) => Kind::Array,
            Entry::Hash(_) => Kind::Hash,
        }
    }

    /// Stream offset of the node this entry describes, if any.
    #[must_use]
    pub fn stream_offset(&self) -> Option<u32> {
        match self {
            Entry::Empty => None,
            Entry::Stream { offset, .. } => Some(*offset),
            Entry::Array(a) => Some(a.stream_offset()),
            Entry::Hash(h) => Some(h.stream_offset()),
        }
    }

    /// True when the entry has a nested record in the index.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        matches!(self, Entry::Array(_) | Entry::Hash(_))
    }
}

/// An array record and its element table.
#[derive(Clone, Copy)]
pub struct ArrayRecord<'a> {
    arena: &'a Arena,
    at: RecordOffset,
    len: u32,
    stream_offset: u32,
}

impl<'a> ArrayRecord<'a> {
    fn new(arena: &'a Arena, at: RecordOffset, element: Element) -> Result<Self> {
        let len = element.header.size;
        arena.bytes(at, CONTAINER_HEADER_SIZE + len as usize * ELEMENT_SIZE)?;
        Ok(Self {
            arena,
            at,
            len,
            stream_offset: element.offset,
        })
    }

    /// Offset of this record in the index.
    #[must_use]
    pub fn offset(&self) -> RecordOffset {
        self.at
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stream offset of the array node.
    #[must_use]
    pub fn stream_offset(&self) -> u32 {
        self.stream_offset
    }

    /// Entry for element `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexOutOfBounds` if `index >= len()`.
    pub fn get(&self, index: u32) -> Result<Entry<'a>> {
        if index >= self.len {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.len,
            });
        }
        Entry::read(self.arena, array_slot(table_start(self.at), index))
    }

    /// Entries of all elements, in stream order.
    pub fn entries(&self) -> impl Iterator<Item = Result<Entry<'a>>> + use<'a> {
        let this = *self;
        (0..self.len).map(move |i| this.get(i))
    }
}

impl PartialEq for ArrayRecord<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.len == other.len && self.stream_offset == other.stream_offset
    }
}

impl fmt::Debug for ArrayRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayRecord({}, len={}, stream={})", self.at, self.len, self.stream_offset)
    }
}

/// A hash record and its open-addressed slot table.
#[derive(Clone, Copy)]
pub struct HashRecord<'a> {
    arena: &'a Arena,
    at: RecordOffset,
    slots: u32,
    stream_offset: u32,
}

impl<'a> HashRecord<'a> {
    fn new(arena: &'a Arena, at: RecordOffset, element: Element) -> Result<Self> {
        let slots = element.header.size;
        arena.bytes(at, CONTAINER_HEADER_SIZE + slots as usize * HASH_SLOT_SIZE)?;
        Ok(Self {
            arena,
            at,
            slots,
            stream_offset: element.offset,
        })
    }

    /// Offset of this record in the index.
    #[must_use]
    pub fn offset(&self) -> RecordOffset {
        self.at
    }

    /// Number of slots, used or not.
    #[must_use]
    pub fn slot_count(&self) -> u32 {
        self.slots
    }

    /// Stream offset of the hash node.
    #[must_use]
    pub fn stream_offset(&self) -> u32 {
        self.stream_offset
    }

    /// Slot `index`, or `None` if it is free.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexOutOfBounds` if `index >= slot_count()`.
    pub fn slot(&self, index: u32) -> Result<Option<HashSlot<'a>>> {
        if index >= self.slots {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.slots,
            });
        }
        let at = hash_slot(table_start(self.at), index);
        if self.arena.read_u32(at)? == 0 {
            return Ok(None);
        }
        Ok(Some(HashSlot {
            arena: self.arena,
            at,
            index,
        }))
    }

    /// All occupied slots in table order.
    pub fn slots(&self) -> impl Iterator<Item = Result<HashSlot<'a>>> + use<'a> {
        let this = *self;
        (0..self.slots).filter_map(move |i| this.slot(i).transpose())
    }

    /// Entry stored under `key`.
    ///
    /// Keys too long to be stored inline are compared against the bytes
    /// `source` returns for their stream offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot table is damaged or `source` fails.
    pub fn get(&self, key: &[u8], source: &impl KeySource) -> Result<Option<Entry<'a>>> {
        let table = table_start(self.at);
        match find_key(self.arena, table, self.slots, key, source)? {
            Some(index) => Entry::read(self.arena, hash_slot(table, index)).map(Some),
            None => Ok(None),
        }
    }
}

impl PartialEq for HashRecord<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
            && self.slots == other.slots
            && self.stream_offset == other.stream_offset
    }
}

impl fmt::Debug for HashRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HashRecord({}, slots={}, stream={})",
            self.at, self.slots, self.stream_offset
        )
    }
}

/// One occupied slot of a hash record.
#[derive(Clone, Copy)]
pub struct HashSlot<'a> {
    arena: &'a Arena,
    at: RecordOffset,
    index: u32,
}

impl<'a> HashSlot<'a> {
    /// Position in the slot table.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read.
    pub fn key(&self) -> Result<SlotKey<'a>> {
        read_key(self.arena, self.at)
    }

    /// The value stored with the key. `Entry::Empty` if none was stored.
    ///
    /// # Errors
    ///
    /// As for [`Entry::read`].
    pub fn entry(&self) -> Result<Entry<'a>> {
        Entry::read(self.arena, self.at)
    }
}

impl fmt::Debug for HashSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashSlot({}, index={})", self.at, self.index)
    }
}
