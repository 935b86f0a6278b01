//! Node stream document.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::keys::KeySource;
use crate::stream::iter::StreamIterator;
use crate::stream::value::Value;

/// Magic bytes at the start of every stream.
pub const MAGIC: &[u8; 4] = b"NSTR";

/// A serialized node tree: magic bytes followed by one root node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream<'a> {
    buffer: Cow<'a, [u8]>,
}

impl<'a> Stream<'a> {
    /// Borrow a stream from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentTooSmall` if there is no room for a root node
    /// and `Error::InvalidMagic` if the magic bytes are wrong.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() <= MAGIC.len() {
            return Err(Error::DocumentTooSmall);
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::InvalidMagic);
        }
        Ok(Self {
            buffer: Cow::Borrowed(bytes),
        })
    }

    pub(crate) fn from_vec(bytes: Vec<u8>) -> Stream<'static> {
        Stream {
            buffer: Cow::Owned(bytes),
        }
    }

    /// Get the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Address of the root node.
    #[must_use]
    pub fn root_addr(&self) -> u32 {
        MAGIC.len() as u32
    }

    /// View of the node at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AddressOutOfBounds` for addresses past the end.
    pub fn value(&self, addr: u32) -> Result<Value<'_>> {
        Value::new(&self.buffer, addr)
    }

    /// Iterator positioned at the root node.
    #[must_use]
    pub fn iter(&self) -> StreamIterator<'_> {
        StreamIterator::new(&self.buffer)
    }
}

impl KeySource for Stream<'_> {
    fn key_at(&self, offset: u32) -> Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(self.value(offset)?.payload_bytes()?))
    }
}
