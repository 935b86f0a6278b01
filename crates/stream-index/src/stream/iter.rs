//! [`NodeIterator`] over a node stream.

use crate::error::{Error, Result};
use crate::iter::{NodeIterator, NodeKind, ScalarValue};
use crate::stream::document::MAGIC;
use crate::stream::tag::NodeType;
use crate::stream::value::{TypedValue, Value};

/// Cursor over the nodes of a stream.
///
/// `ends` holds the end address of every container stepped into; the current
/// level ends at the last entry, or at the end of the buffer at top level.
#[derive(Debug, Clone)]
pub struct StreamIterator<'a> {
    data: &'a [u8],
    pos: usize,
    ends: Vec<usize>,
}

impl<'a> StreamIterator<'a> {
    /// Iterator positioned at the root node of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: MAGIC.len(),
            ends: Vec::new(),
        }
    }

    /// Number of containers currently stepped into.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ends.len()
    }

    fn level_end(&self) -> usize {
        self.ends.last().copied().unwrap_or(self.data.len())
    }

    fn current(&self) -> Result<Value<'a>> {
        if self.is_eof() {
            return Err(Error::UnexpectedEof);
        }
        Value::new(self.data, self.pos as u32)
    }
}

impl NodeIterator for StreamIterator<'_> {
    fn reset(&mut self) {
        self.pos = MAGIC.len();
        self.ends.clear();
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.level_end()
    }

    fn offset(&self) -> u32 {
        self.pos as u32
    }

    fn info(&self) -> Result<(NodeKind, u32)> {
        Ok(match self.current()?.typed()? {
            TypedValue::Arr { count } => (NodeKind::Array, count),
            TypedValue::Map { count } => (NodeKind::Hash, count),
            _ => (NodeKind::Scalar, 0),
        })
    }

    fn step_over(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            let size = self.current()?.node_size()?;
            self.pos = self
                .pos
                .checked_add(size)
                .filter(|&next| next <= self.level_end())
                .ok_or(Error::TruncatedValue)?;
        }
        Ok(())
    }

    fn step_in(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            let value = self.current()?;
            let node_type = value.node_type();
            if !node_type.is_container() {
                return Err(Error::UnexpectedKind {
                    expected: "arr or map",
                    found: node_type.name(),
                });
            }
            let end = self
                .pos
                .checked_add(value.node_size()?)
                .filter(|&end| end <= self.level_end())
                .ok_or(Error::TruncatedValue)?;
            self.ends.push(end);
            self.pos = value.body_start() as usize;
        }
        Ok(())
    }

    fn step_out(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.pos = self
                .ends
                .pop()
                .ok_or(Error::MalformedStream("step out of top level"))?;
        }
        Ok(())
    }

    fn hash_key(&self) -> Result<&[u8]> {
        self.current()?.payload_bytes()
    }

    fn decode(&self) -> Result<ScalarValue<'_>> {
        let value = self.current()?;
        value.typed()?.scalar().ok_or(Error::UnexpectedKind {
            expected: "scalar",
            found: match value.node_type() {
                NodeType::Arr => "arr",
                _ => "map",
            },
        })
    }
}
