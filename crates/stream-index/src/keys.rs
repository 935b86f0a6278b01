//! Open-addressed key table inside hash records.
//!
//! Keys are placed by linear probing from `hash_key(key) % slot_count`. A
//! slot is free while its header word is zero. Each hash slot is 16 bytes:
//!
//! ```text
//! header(4) value_offset(4) key(8)
//! ```
//!
//! Keys of up to [`KEY_INLINE_MAX`] bytes are copied into `key` and the
//! `KeySmall` flag is set. Longer keys store `hash(4) key_stream_offset(4)`
//! instead; readers fetch the bytes back from the stream through a
//! [`KeySource`] when the hash matches.

use std::borrow::Cow;

use crate::arena::{Arena, RecordOffset};
use crate::error::{Error, Result};
use crate::record::{Header, Kind, MAX_SIZE, hash_slot};

/// Longest key stored inline in a hash slot.
pub const KEY_INLINE_MAX: usize = 8;

const HASH_SEED: u32 = 5381;

/// Hash key bytes (djb2: `h * 33 + byte`).
#[must_use]
pub fn hash_key(key: &[u8]) -> u32 {
    key.iter().fold(HASH_SEED, |h, &b| {
        h.wrapping_shl(5).wrapping_add(h).wrapping_add(u32::from(b))
    })
}

/// Source of key bytes for keys stored by stream offset.
pub trait KeySource {
    /// Raw bytes of the key node at `offset` in the original stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no key node can be read at `offset`.
    fn key_at(&self, offset: u32) -> Result<Cow<'_, [u8]>>;
}

/// Stored form of a slot's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKey<'a> {
    /// Key bytes copied into the slot.
    Inline(&'a [u8]),
    /// Key too long to inline: its hash and stream offset.
    Stream { hash: u32, offset: u32, len: u32 },
}

/// Place `key` into the table of `slots` hash slots at `table`.
///
/// The value half of the slot is left empty for the caller to fill.
/// Returns the index of the chosen slot.
///
/// # Errors
///
/// Returns `Error::HashTableFull` if every slot is taken and
/// `Error::KeyTooLong` if the key length does not fit the size field.
pub fn place_key(
    arena: &mut Arena,
    table: RecordOffset,
    slots: u32,
    key: &[u8],
    stream_offset: u32,
) -> Result<u32> {
    if key.len() > MAX_SIZE as usize {
        return Err(Error::KeyTooLong { len: key.len() });
    }
    if slots == 0 {
        return Err(Error::HashTableFull { slots });
    }

    let hash = hash_key(key);
    let start = hash % slots;
    let mut pos = start;
    while arena.read_u32(hash_slot(table, pos))? != 0 {
        tracing::trace!(slot = pos, "slot taken, probing next");
        pos = (pos + 1) % slots;
        if pos == start {
            return Err(Error::HashTableFull { slots });
        }
    }

    let at = hash_slot(table, pos);
    let small = key.len() <= KEY_INLINE_MAX;
    let header = Header {
        kind: Kind::Empty,
        pointer_is_index: false,
        key_small: small,
        size: key.len() as u32,
    };
    arena.write_u32(at, header.pack())?;
    if small {
        arena.bytes_mut(at.add(8), key.len())?.copy_from_slice(key);
    } else {
        arena.write_u32(at.add(8), hash)?;
        arena.write_u32(at.add(12), stream_offset)?;
    }
    tracing::trace!(slot = pos, hash, len = key.len(), inline = small, "placed key");
    Ok(pos)
}

/// Store a value into a slot that already holds its key.
///
/// Keeps the key's `KeySmall` flag and length.
pub(crate) fn store_value(
    arena: &mut Arena,
    slot: RecordOffset,
    value: Header,
    offset: u32,
) -> Result<()> {
    let key = Header::unpack(arena.read_u32(slot)?)?;
    let header = Header {
        kind: value.kind,
        pointer_is_index: value.pointer_is_index,
        key_small: key.key_small,
        size: key.size,
    };
    arena.write_u32(slot, header.pack())?;
    arena.write_u32(slot.add(4), offset)
}

/// Read the key stored in the slot at `slot`.
///
/// # Errors
///
/// Returns an error if the slot lies outside the used arena.
pub fn read_key(arena: &Arena, slot: RecordOffset) -> Result<SlotKey<'_>> {
    let header = Header::unpack(arena.read_u32(slot)?)?;
    if header.key_small {
        Ok(SlotKey::Inline(arena.bytes(slot.add(8), header.size as usize)?))
    } else {
        Ok(SlotKey::Stream {
            hash: arena.read_u32(slot.add(8))?,
            offset: arena.read_u32(slot.add(12))?,
            len: header.size,
        })
    }
}

/// Find the slot holding `key` by following its probe sequence.
///
/// # Errors
///
/// Returns an error if a slot cannot be read or `source` fails to produce
/// the bytes of a candidate key.
pub fn find_key(
    arena: &Arena,
    table: RecordOffset,
    slots: u32,
    key: &[u8],
    source: &impl KeySource,
) -> Result<Option<u32>> {
    if slots == 0 {
        return Ok(None);
    }

    let hash = hash_key(key);
    let start = hash % slots;
    let mut pos = start;
    loop {
        let at = hash_slot(table, pos);
        if arena.read_u32(at)? == 0 {
            return Ok(None);
        }
        let found = match read_key(arena, at)? {
            SlotKey::Inline(bytes) => bytes == key,
            SlotKey::Stream {
                hash: h,
                offset,
                len,
            } => h == hash && len as usize == key.len() && *source.key_at(offset)? == *key,
        };
        if found {
            return Ok(Some(pos));
        }
        pos = (pos + 1) % slots;
        if pos == start {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{HASH_SLOT_SIZE, allocate_hash, table_start};

    struct Keys(Vec<(u32, &'static [u8])>);

    impl KeySource for Keys {
        fn key_at(&self, offset: u32) -> Result<Cow<'_, [u8]>> {
            self.0
                .iter()
                .find(|(o, _)| *o == offset)
                .map(|(_, k)| Cow::Borrowed(*k))
                .ok_or(Error::AddressOutOfBounds { addr: offset, len: 0 })
        }
    }

    fn new_table(arena: &mut Arena, slots: usize) -> RecordOffset {
        let record = allocate_hash(arena, slots, Header::new(Kind::Hash), 0).unwrap();
        table_start(record)
    }

    #[test]
    fn djb2() {
        assert_eq!(hash_key(b""), 5381);
        assert_eq!(hash_key(b"a"), 177_670);
        assert_eq!(hash_key(b"b"), 177_671);
        assert_eq!(hash_key(b"ab"), 177_670 * 33 + 98);
    }

    #[test]
    fn inline_key_placement() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 4);

        let pos = place_key(&mut arena, table, 4, b"a", 100).unwrap();
        assert_eq!(pos, 177_670 % 4);

        let at = hash_slot(table, pos);
        let header = Header::unpack(arena.read_u32(at).unwrap()).unwrap();
        assert!(header.key_small);
        assert_eq!(header.size, 1);
        assert_eq!(header.kind, Kind::Empty);
        assert_eq!(read_key(&arena, at).unwrap(), SlotKey::Inline(b"a"));
    }

    #[test]
    fn long_key_is_back_referenced() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 3);
        let key = b"longer_than_eight";

        let pos = place_key(&mut arena, table, 3, key, 77).unwrap();
        let at = hash_slot(table, pos);
        assert_eq!(
            read_key(&arena, at).unwrap(),
            SlotKey::Stream {
                hash: hash_key(key),
                offset: 77,
                len: key.len() as u32
            }
        );
        // key bytes are not copied
        assert!(!arena.as_bytes().windows(key.len()).any(|w| w == key));
        assert_eq!(arena.used(), 8 + 3 * HASH_SLOT_SIZE);
    }

    #[test]
    fn exactly_inline_max_is_inline() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 2);
        let pos = place_key(&mut arena, table, 2, b"12345678", 0).unwrap();
        assert_eq!(
            read_key(&arena, hash_slot(table, pos)).unwrap(),
            SlotKey::Inline(b"12345678")
        );
        let pos = place_key(&mut arena, table, 2, b"123456789", 0).unwrap();
        assert!(matches!(
            read_key(&arena, hash_slot(table, pos)).unwrap(),
            SlotKey::Stream { len: 9, .. }
        ));
    }

    #[test]
    fn collisions_probe_forward_and_wrap() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 2);
        // "a" and "c" both hash to slot 0 of 2
        assert_eq!(place_key(&mut arena, table, 2, b"a", 0).unwrap(), 0);
        assert_eq!(place_key(&mut arena, table, 2, b"c", 0).unwrap(), 1);

        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 2);
        // "b" hashes to slot 1, "d" wraps around to 0
        assert_eq!(place_key(&mut arena, table, 2, b"b", 0).unwrap(), 1);
        assert_eq!(place_key(&mut arena, table, 2, b"d", 0).unwrap(), 0);
    }

    #[test]
    fn full_table_is_an_error() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 2);
        place_key(&mut arena, table, 2, b"a", 0).unwrap();
        place_key(&mut arena, table, 2, b"b", 0).unwrap();
        assert_eq!(
            place_key(&mut arena, table, 2, b"c", 0),
            Err(Error::HashTableFull { slots: 2 })
        );
        assert_eq!(
            place_key(&mut arena, table, 0, b"c", 0),
            Err(Error::HashTableFull { slots: 0 })
        );
    }

    #[test]
    fn oversized_key_is_an_error() {
        let mut arena = Arena::new(64).unwrap();
        let table = new_table(&mut arena, 2);
        let key = vec![b'k'; MAX_SIZE as usize + 1];
        assert_eq!(
            place_key(&mut arena, table, 2, &key, 9),
            Err(Error::KeyTooLong { len: key.len() })
        );
        // nothing was written
        assert_eq!(arena.read_u32(hash_slot(table, 0)).unwrap(), 0);
        assert_eq!(arena.read_u32(hash_slot(table, 1)).unwrap(), 0);

        let key = vec![b'k'; MAX_SIZE as usize];
        assert!(place_key(&mut arena, table, 2, &key, 9).is_ok());
    }

    #[test]
    fn store_value_keeps_key() {
        let mut arena = Arena::new(256).unwrap();
        let table = new_table(&mut arena, 1);
        let pos = place_key(&mut arena, table, 1, b"k", 0).unwrap();
        let at = hash_slot(table, pos);
        store_value(&mut arena, at, Header::indirection(), 40).unwrap();

        let header = Header::unpack(arena.read_u32(at).unwrap()).unwrap();
        assert_eq!(header.kind, Kind::Scalar);
        assert!(header.pointer_is_index);
        assert!(header.key_small);
        assert_eq!(header.size, 1);
        assert_eq!(arena.read_u32(at.add(4)).unwrap(), 40);
        assert_eq!(read_key(&arena, at).unwrap(), SlotKey::Inline(b"k"));
    }

    #[test]
    fn find_follows_probe_sequence() {
        let long_a: &'static [u8] = b"a_long_key_one";
        let long_b: &'static [u8] = b"a_long_key_two";
        let source = Keys(vec![(10, long_a), (20, long_b)]);

        let mut arena = Arena::new(512).unwrap();
        let table = new_table(&mut arena, 5);
        let pa = place_key(&mut arena, table, 5, b"a", 1).unwrap();
        let pc = place_key(&mut arena, table, 5, b"c", 2).unwrap();
        let pl = place_key(&mut arena, table, 5, long_a, 10).unwrap();
        let pm = place_key(&mut arena, table, 5, long_b, 20).unwrap();

        assert_eq!(find_key(&arena, table, 5, b"a", &source).unwrap(), Some(pa));
        assert_eq!(find_key(&arena, table, 5, b"c", &source).unwrap(), Some(pc));
        assert_eq!(find_key(&arena, table, 5, long_a, &source).unwrap(), Some(pl));
        assert_eq!(find_key(&arena, table, 5, long_b, &source).unwrap(), Some(pm));
        assert_eq!(find_key(&arena, table, 5, b"zz", &source).unwrap(), None);
    }
}
