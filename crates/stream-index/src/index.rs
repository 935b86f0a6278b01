//! A built index and its serialized form.

use tracing::{Level, debug, trace};

use crate::arena::{Arena, RecordOffset};
use crate::dump::IndexDump;
use crate::error::{Error, Result};
use crate::footer::{FOOTER_SIZE, Footer};
use crate::iter::NodeIterator;
use crate::lookup::Entry;
use crate::options::IndexOptions;
use crate::record::ELEMENT_SIZE;
use crate::walker::{self, WalkStats};

/// Secondary index over one serialized document.
///
/// The index owns its arena. Once built it is never mutated through the
/// public API except by [`Index::destroy`], so it can be shared between
/// readers freely.
#[derive(Debug, Clone)]
pub struct Index {
    arena: Arena,
    options: IndexOptions,
    stats: WalkStats,
}

impl Index {
    /// Walk `iter` from its root and build an index.
    ///
    /// Containers that cannot be indexed because of `index_depth` or because
    /// the arena is full are kept as stream offsets; that is not an error.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidOptions` if `options` fail validation
    /// - `Error::OutOfMemory` if the arena cannot be reserved
    /// - `Error::NestingTooDeep`, `Error::HashTableFull`, `Error::KeyTooLong`
    ///   and `Error::MalformedStream` from the walk
    /// - any error returned by `iter`
    pub fn build<I>(iter: &mut I, options: &IndexOptions) -> Result<Self>
    where
        I: NodeIterator + ?Sized,
    {
        options.validate()?;
        let mut arena = Arena::new(options.memory_size)?;
        let stats = walker::walk(iter, &mut arena, options)?;
        debug!(
            used = arena.used(),
            capacity = arena.capacity(),
            nodes = stats.nodes,
            indexed = stats.indexed,
            over_depth = stats.over_depth,
            out_of_memory = stats.out_of_memory,
            skipped = stats.skipped,
            "index built"
        );

        let index = Self {
            arena,
            options: options.clone(),
            stats,
        };
        if tracing::enabled!(Level::TRACE) {
            trace!("index dump:\n{}", index.dump());
        }
        Ok(index)
    }

    /// Offset of the root record.
    #[must_use]
    pub fn root(&self) -> RecordOffset {
        RecordOffset::ROOT
    }

    /// Bytes of the arena in use.
    #[must_use]
    pub fn used(&self) -> usize {
        self.arena.used()
    }

    /// Arena capacity; 0 after [`Index::destroy`].
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Counters from the walk that built this index. All zero for an index
    /// restored with [`Index::from_bytes`].
    #[must_use]
    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The packed records.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.arena.as_bytes()
    }

    /// Entry for the record at `offset`, following indirections.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` does not address a valid record.
    pub fn entry(&self, offset: RecordOffset) -> Result<Entry<'_>> {
        Entry::read(&self.arena, offset)
    }

    /// Entry for the document root.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecordOutOfBounds` after [`Index::destroy`].
    pub fn root_entry(&self) -> Result<Entry<'_>> {
        self.entry(self.root())
    }

    /// Release the arena. Calling it again is a no-op.
    pub fn destroy(&mut self) {
        debug!(capacity = self.arena.capacity(), "destroying index");
        self.arena.destroy();
    }

    /// Human-readable rendering of the record tree. Reads only.
    #[must_use]
    pub fn dump(&self) -> IndexDump<'_> {
        IndexDump::new(self)
    }

    /// Serialize as the used arena bytes followed by a footer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let footer = Footer {
            used: self.arena.used() as u32,
            memory_size: self.options.memory_size as u32,
            index_depth: u32::try_from(self.options.index_depth).unwrap_or(u32::MAX),
            hash_factor: self.options.hash_factor,
        };
        let mut out = Vec::with_capacity(self.arena.used() + FOOTER_SIZE);
        out.extend_from_slice(self.arena.as_bytes());
        out.extend_from_slice(&footer.to_bytes());
        out
    }

    /// Restore an index serialized with [`Index::to_bytes`].
    ///
    /// The restored arena holds exactly the serialized records, so its
    /// capacity is `used()`; the footer's `memory_size` is kept in
    /// [`Index::options`]. Every reachable record is checked before the
    /// index is returned.
    ///
    /// # Errors
    ///
    /// - `Error::DocumentTooSmall` if there is no room for a footer
    /// - `Error::InvalidMagic` if the footer magic is wrong
    /// - `Error::InvalidIndex` if the footer disagrees with the blob or the
    ///   records do not form a tree
    /// - `Error::RecordOutOfBounds` or `Error::InvalidKind` for damaged
    ///   records
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body_len = bytes
            .len()
            .checked_sub(FOOTER_SIZE)
            .ok_or(Error::DocumentTooSmall)?;
        let trailer: &[u8; FOOTER_SIZE] = bytes[body_len..]
            .try_into()
            .map_err(|_| Error::DocumentTooSmall)?;
        let footer = Footer::new(trailer).ok_or(Error::InvalidMagic)?;

        if footer.used as usize != body_len {
            return Err(Error::InvalidIndex("record length does not match footer"));
        }
        if body_len < ELEMENT_SIZE {
            return Err(Error::InvalidIndex("missing root record"));
        }
        let options = IndexOptions::default()
            .with_memory_size(footer.memory_size as usize)
            .with_index_depth(footer.index_depth as usize)
            .with_hash_factor(footer.hash_factor);
        options
            .validate()
            .map_err(|_| Error::InvalidIndex("footer holds invalid options"))?;

        if body_len > options.memory_size {
            return Err(Error::InvalidIndex("record length exceeds memory_size"));
        }

        let index = Self {
            arena: Arena::from_used(body_len, &bytes[..body_len])?,
            options,
            stats: WalkStats::default(),
        };
        index.check_records()?;
        Ok(index)
    }

    /// Visit every record reachable from the root.
    ///
    /// Indirections only point forward, so the visit ends; sharing is caught
    /// by bounding the number of entries by what the arena can hold.
    fn check_records(&self) -> Result<()> {
        let limit = self.arena.used() / ELEMENT_SIZE;
        let mut visited = 0;
        let mut pending = vec![(self.root_entry()?, 0)];
        while let Some((entry, depth)) = pending.pop() {
            visited += 1;
            if visited > limit {
                return Err(Error::InvalidIndex("records are shared between slots"));
            }
            if entry.is_indexed() && depth > self.options.max_nesting {
                return Err(Error::InvalidIndex("records nest deeper than max_nesting"));
            }
            match entry {
                Entry::Array(array) => {
                    for child in array.entries() {
                        pending.push((child?, depth + 1));
                    }
                }
                Entry::Hash(hash) => {
                    for slot in hash.slots() {
                        pending.push((slot?.entry()?, depth + 1));
                    }
                }
                Entry::Empty | Entry::Stream { .. } => {}
            }
        }
        Ok(())
    }
}
