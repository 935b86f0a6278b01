//! Iterator boundary between the walker and a serialized stream.

use crate::error::Result;

/// Node kind reported by a [`NodeIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Array,
    Hash,
    /// A nested document root. Not indexable; the walker skips it.
    Root,
}

/// Decoded scalar, used only for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
}

/// Cursor over the nodes of a serialized tree.
///
/// The cursor sits on one node of one level at a time. Containers are entered
/// with [`step_in`](NodeIterator::step_in) and left with
/// [`step_out`](NodeIterator::step_out); hashes present their children as
/// alternating key and value nodes.
pub trait NodeIterator {
    /// Reposition at the document root.
    fn reset(&mut self);

    /// True when no node is left at the current level.
    fn is_eof(&self) -> bool;

    /// Stream offset of the current node.
    fn offset(&self) -> u32;

    /// Kind of the current node and its element count (pairs for hashes, 0
    /// for scalars).
    fn info(&self) -> Result<(NodeKind, u32)>;

    /// Move past `n` sibling nodes.
    fn step_over(&mut self, n: u32) -> Result<()>;

    /// Descend into `n` nested containers, landing on the first child.
    fn step_in(&mut self, n: u32) -> Result<()>;

    /// Ascend `n` levels, landing after the container that was left.
    fn step_out(&mut self, n: u32) -> Result<()>;

    /// Raw bytes of the hash key at the current position.
    fn hash_key(&self) -> Result<&[u8]>;

    /// Decode the current scalar node.
    fn decode(&self) -> Result<ScalarValue<'_>>;
}
