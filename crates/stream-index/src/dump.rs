//! Text rendering of an index for debugging.
//!
//! ```text
//! index used=80 capacity=65536
//! root hash@0x8 slots=4 stream=4
//!   [2] "a" => scalar stream=15
//!   [3] "b" => scalar stream=26
//! ```

use std::fmt;

use crate::error::Result;
use crate::index::Index;
use crate::keys::SlotKey;
use crate::lookup::Entry;

/// Displays the record tree of an [`Index`], starting at the root.
pub struct IndexDump<'a> {
    index: &'a Index,
}

impl<'a> IndexDump<'a> {
    pub(crate) fn new(index: &'a Index) -> Self {
        Self { index }
    }
}

impl fmt::Display for IndexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "index used={} capacity={}",
            self.index.used(),
            self.index.capacity()
        )?;
        if self.index.used() == 0 {
            return writeln!(f, "(empty)");
        }
        write!(f, "root ")?;
        write_entry(f, self.index.root_entry(), 0)
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = depth * 2)
}

fn write_entry(f: &mut fmt::Formatter<'_>, entry: Result<Entry<'_>>, depth: usize) -> fmt::Result {
    match entry {
        Err(err) => writeln!(f, "<{err}>"),
        Ok(Entry::Empty) => writeln!(f, "empty"),
        Ok(Entry::Stream { kind, offset }) => writeln!(f, "{} stream={offset}", kind.name()),
        Ok(Entry::Array(array)) => {
            writeln!(
                f,
                "array{} len={} stream={}",
                array.offset(),
                array.len(),
                array.stream_offset()
            )?;
            for (i, child) in array.entries().enumerate() {
                indent(f, depth + 1)?;
                write!(f, "[{i}] ")?;
                write_entry(f, child, depth + 1)?;
            }
            Ok(())
        }
        Ok(Entry::Hash(hash)) => {
            writeln!(
                f,
                "hash{} slots={} stream={}",
                hash.offset(),
                hash.slot_count(),
                hash.stream_offset()
            )?;
            for slot in hash.slots() {
                indent(f, depth + 1)?;
                let slot = match slot {
                    Ok(slot) => slot,
                    Err(err) => {
                        writeln!(f, "<{err}>")?;
                        continue;
                    }
                };
                write!(f, "[{}] ", slot.index())?;
                match slot.key() {
                    Ok(SlotKey::Inline(bytes)) => write!(f, "{:?}", String::from_utf8_lossy(bytes))?,
                    Ok(SlotKey::Stream { hash, offset, len }) => {
                        write!(f, "key#{hash:08x} len={len} stream={offset}")?;
                    }
                    Err(err) => write!(f, "<{err}>")?,
                }
                write!(f, " => ")?;
                write_entry(f, slot.entry(), depth + 1)?;
            }
            Ok(())
        }
    }
}
