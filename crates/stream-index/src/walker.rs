//! Depth-first walk that fills the arena with index records.
//!
//! The walker drives a [`NodeIterator`] over the whole document and keeps one
//! [`Frame`] per open container. Every node is stored into the slot its parent
//! frame points at:
//!
//! - the root record for the document root
//! - the next element slot for array children
//! - for hash children, keys at even positions are placed into the key table
//!   and the value that follows goes into the slot chosen for its key
//!
//! Containers get a nested record when the depth budget and the arena allow
//! it. Otherwise the parent slot keeps the container's stream offset and the
//! whole subtree is stepped over.

use tracing::{Level, debug, trace, warn};

use crate::arena::{Arena, RecordOffset};
use crate::error::{Error, Result};
use crate::iter::{NodeIterator, NodeKind};
use crate::keys::{place_key, store_value};
use crate::options::IndexOptions;
use crate::record::{
    ELEMENT_SIZE, Element, Header, Kind, allocate_array, allocate_hash, array_slot, hash_slot,
    table_start,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Top,
    Array,
    Hash,
}

/// Fill state of one nesting level.
#[derive(Debug, Clone, Copy)]
struct Frame {
    parent: Parent,
    /// Children visited so far.
    pos: u32,
    /// Children expected; keys and values count separately for hashes.
    len: u32,
    /// First slot of the table being filled.
    table: RecordOffset,
    /// Hash slot count.
    slots: u32,
    /// Hash slot chosen for the most recent key.
    probe: u32,
}

impl Frame {
    fn top() -> Self {
        Self {
            parent: Parent::Top,
            pos: 0,
            len: 1,
            table: RecordOffset::ROOT,
            slots: 0,
            probe: 0,
        }
    }

    fn at_key(&self) -> bool {
        self.parent == Parent::Hash && self.pos % 2 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AtNode,
    SteppingOut,
    Done,
}

/// Counters reported after a walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Nodes visited, hash keys included.
    pub nodes: usize,
    /// Containers that got a nested record.
    pub indexed: usize,
    /// Containers kept as stream offsets because of the depth budget.
    pub over_depth: usize,
    /// Containers kept as stream offsets because the arena was full.
    pub out_of_memory: usize,
    /// Nodes of unsupported kind.
    pub skipped: usize,
}

/// Walk `iter` from its root and write the index into `arena`.
///
/// `arena` must be empty; the root record is reserved at
/// [`RecordOffset::ROOT`] before anything else.
pub(crate) fn walk<I>(iter: &mut I, arena: &mut Arena, options: &IndexOptions) -> Result<WalkStats>
where
    I: NodeIterator + ?Sized,
{
    Walker::new(iter, arena, options)?.run()
}

struct Walker<'a, I: ?Sized> {
    iter: &'a mut I,
    arena: &'a mut Arena,
    options: &'a IndexOptions,
    stack: Vec<Frame>,
    stats: WalkStats,
}

impl<'a, I: NodeIterator + ?Sized> Walker<'a, I> {
    fn new(iter: &'a mut I, arena: &'a mut Arena, options: &'a IndexOptions) -> Result<Self> {
        iter.reset();
        arena.allocate(ELEMENT_SIZE).ok_or(Error::OutOfMemory {
            requested: ELEMENT_SIZE,
        })?;
        Ok(Self {
            iter,
            arena,
            options,
            stack: vec![Frame::top()],
            stats: WalkStats::default(),
        })
    }

    fn run(mut self) -> Result<WalkStats> {
        let mut state = State::AtNode;
        while state != State::Done {
            state = match state {
                State::AtNode => self.at_node()?,
                State::SteppingOut => self.step_out()?,
                State::Done => State::Done,
            };
        }
        Ok(self.stats)
    }

    fn at_node(&mut self) -> Result<State> {
        let Some(&frame) = self.stack.last() else {
            return Ok(State::Done);
        };
        if frame.pos >= frame.len {
            return Ok(State::SteppingOut);
        }
        if self.iter.is_eof() {
            if frame.parent == Parent::Top {
                trace!("end of stream");
                return Ok(State::Done);
            }
            return Err(Error::MalformedStream("container ended before its last child"));
        }

        let (kind, count) = self.iter.info()?;
        let offset = self.iter.offset();
        self.stats.nodes += 1;

        if frame.at_key() {
            if kind != NodeKind::Scalar {
                return Err(Error::MalformedStream("hash key is not a scalar"));
            }
            let key = self.iter.hash_key()?;
            let probe = place_key(self.arena, frame.table, frame.slots, key, offset)?;
            if let Some(top) = self.stack.last_mut() {
                top.probe = probe;
            }
            self.advance()?;
            return Ok(State::AtNode);
        }

        match kind {
            NodeKind::Scalar => {
                self.trace_scalar(offset);
                self.store(&frame, Header::new(Kind::Scalar), offset)?;
                self.advance()?;
            }
            NodeKind::Array => self.container(&frame, Kind::Array, count, offset)?,
            NodeKind::Hash => self.container(&frame, Kind::Hash, count, offset)?,
            NodeKind::Root => {
                warn!(offset, "nested document root cannot be indexed, skipping");
                self.stats.skipped += 1;
                self.advance()?;
            }
        }
        Ok(State::AtNode)
    }

    fn container(&mut self, frame: &Frame, kind: Kind, count: u32, offset: u32) -> Result<()> {
        let depth = self.stack.len() - 1;
        if self.options.depth_exceeded(depth) {
            self.stats.over_depth += 1;
            return self.degrade(frame, kind, offset, depth, "depth");
        }
        if count > 0 && depth >= self.options.max_nesting {
            return Err(Error::NestingTooDeep {
                max: self.options.max_nesting,
            });
        }

        let header = Header::new(kind).with_pointer_is_index(true);
        let (record, slots) = if kind == Kind::Hash {
            let slots = self.options.hash_slots(count);
            (allocate_hash(self.arena, slots, header, offset), slots)
        } else {
            (allocate_array(self.arena, count as usize, header, offset), count as usize)
        };
        let Some(record) = record else {
            self.stats.out_of_memory += 1;
            return self.degrade(frame, kind, offset, depth, "memory");
        };

        self.store(frame, Header::indirection(), record.get())?;
        self.stats.indexed += 1;
        if count == 0 {
            return self.advance();
        }

        debug!(depth, kind = kind.name(), count, slots, %record, "step in");
        let (parent, len) = if kind == Kind::Hash {
            (Parent::Hash, count * 2)
        } else {
            (Parent::Array, count)
        };
        self.stack.push(Frame {
            parent,
            pos: 0,
            len,
            table: table_start(record),
            slots: slots as u32,
            probe: 0,
        });
        self.iter.step_in(1)
    }

    fn degrade(
        &mut self,
        frame: &Frame,
        kind: Kind,
        offset: u32,
        depth: usize,
        reason: &'static str,
    ) -> Result<()> {
        debug!(
            depth,
            kind = kind.name(),
            offset,
            reason,
            "container not indexed, keeping stream offset"
        );
        self.store(frame, Header::new(kind), offset)?;
        self.advance()
    }

    fn step_out(&mut self) -> Result<State> {
        let Some(frame) = self.stack.pop() else {
            return Ok(State::Done);
        };
        if frame.parent == Parent::Top {
            trace!(nodes = self.stats.nodes, "walk complete");
            return Ok(State::Done);
        }
        self.iter.step_out(1)?;
        debug!(depth = self.stack.len().saturating_sub(1), "step out");
        self.bump();
        Ok(State::AtNode)
    }

    /// Write `header` and `offset` into the slot `frame` is filling.
    fn store(&mut self, frame: &Frame, header: Header, offset: u32) -> Result<()> {
        match frame.parent {
            Parent::Top => Element { header, offset }.write(self.arena, RecordOffset::ROOT),
            Parent::Array => {
                Element { header, offset }.write(self.arena, array_slot(frame.table, frame.pos))
            }
            Parent::Hash => {
                store_value(self.arena, hash_slot(frame.table, frame.probe), header, offset)
            }
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.iter.step_over(1)?;
        self.bump();
        Ok(())
    }

    fn bump(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.pos += 1;
        }
    }

    fn trace_scalar(&self, offset: u32) {
        if !tracing::enabled!(Level::TRACE) {
            return;
        }
        match self.iter.decode() {
            Ok(value) => trace!(offset, ?value, "scalar"),
            Err(err) => trace!(offset, %err, "scalar not decodable"),
        }
    }
}
