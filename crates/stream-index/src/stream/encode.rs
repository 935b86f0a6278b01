//! Writing node streams.
//!
//! [`StreamWriter`] appends nodes in document order. Containers are opened
//! with their element count and closed with [`StreamWriter::end`], which
//! patches the body length into the container header.
//!
//! ```
//! use stream_index::stream::StreamWriter;
//!
//! let mut w = StreamWriter::new();
//! w.begin_map(1);
//! w.str("tags");
//! w.begin_array(2);
//! w.str("a");
//! w.int(7);
//! w.end().unwrap();
//! w.end().unwrap();
//! let stream = w.finish().unwrap();
//! assert!(stream.as_bytes().starts_with(b"NSTR"));
//! ```

use crate::error::{Error, Result};
use crate::stream::document::{MAGIC, Stream};
use crate::stream::tag::{Tag, minimal_uint_encoding};

/// Encode a nil node (1 byte).
#[inline]
#[must_use]
pub fn encode_nil() -> [u8; 1] {
    [Tag::encode_nil()]
}

/// Encode a bool node (1 byte).
#[inline]
#[must_use]
pub fn encode_bool(value: bool) -> [u8; 1] {
    [Tag::encode_bool(value)]
}

/// Encode an int node (9 bytes).
#[inline]
#[must_use]
pub fn encode_int(value: i64) -> [u8; 9] {
    let mut buf = [0u8; 9];
    buf[0] = Tag::encode_int();
    buf[1..9].copy_from_slice(&value.to_le_bytes());
    buf
}

/// Encode a float node (9 bytes).
#[inline]
#[must_use]
pub fn encode_float(value: f64) -> [u8; 9] {
    let mut buf = [0u8; 9];
    buf[0] = Tag::encode_float();
    buf[1..9].copy_from_slice(&value.to_le_bytes());
    buf
}

/// Encode a str node; up to 15 bytes pack the length into the tag.
#[must_use]
pub fn encode_str(s: &str) -> Vec<u8> {
    encode_str_or_bin(s.as_bytes(), true)
}

/// Encode a bin node; up to 15 bytes pack the length into the tag.
#[must_use]
pub fn encode_bin(data: &[u8]) -> Vec<u8> {
    encode_str_or_bin(data, false)
}

fn encode_str_or_bin(data: &[u8], is_str: bool) -> Vec<u8> {
    let len = data.len();

    if len <= 15 {
        let mut result = Vec::with_capacity(1 + len);
        let tag = if is_str {
            Tag::encode_str_packed(len as u8)
        } else {
            Tag::encode_bin_packed(len as u8)
        };
        result.push(tag);
        result.extend_from_slice(data);
        result
    } else {
        let (n, len_bytes) = minimal_uint_encoding(len);
        let mut result = Vec::with_capacity(1 + n + len);
        let tag = if is_str {
            Tag::encode_str_unpacked(n as u8)
        } else {
            Tag::encode_bin_unpacked(n as u8)
        };
        result.push(tag);
        result.extend_from_slice(&len_bytes[..n]);
        result.extend_from_slice(data);
        result
    }
}

/// Encode an arr/map header: tag, element count, body length.
#[must_use]
pub fn encode_container(tag: u8, count: u32, body_len: u32) -> [u8; 9] {
    let mut buf = [0u8; 9];
    buf[0] = tag;
    buf[1..5].copy_from_slice(&count.to_le_bytes());
    buf[5..9].copy_from_slice(&body_len.to_le_bytes());
    buf
}

/// Appends nodes to a stream buffer.
#[derive(Debug)]
pub struct StreamWriter {
    buffer: Vec<u8>,
    /// Start addresses of containers that have not been closed yet.
    open: Vec<usize>,
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: MAGIC.to_vec(),
            open: Vec::new(),
        }
    }

    /// Address the next node will be written at.
    #[must_use]
    pub fn current_addr(&self) -> u32 {
        self.buffer.len() as u32
    }

    fn append(&mut self, bytes: &[u8]) -> u32 {
        let addr = self.current_addr();
        self.buffer.extend_from_slice(bytes);
        addr
    }

    pub fn nil(&mut self) -> u32 {
        self.append(&encode_nil())
    }

    pub fn bool(&mut self, value: bool) -> u32 {
        self.append(&encode_bool(value))
    }

    pub fn int(&mut self, value: i64) -> u32 {
        self.append(&encode_int(value))
    }

    pub fn float(&mut self, value: f64) -> u32 {
        self.append(&encode_float(value))
    }

    pub fn str(&mut self, value: &str) -> u32 {
        self.append(&encode_str(value))
    }

    pub fn bin(&mut self, value: &[u8]) -> u32 {
        self.append(&encode_bin(value))
    }

    /// Open an array of `count` elements.
    pub fn begin_array(&mut self, count: u32) -> u32 {
        self.begin(Tag::encode_arr(), count)
    }

    /// Open a map of `count` pairs; write key then value for each pair.
    pub fn begin_map(&mut self, count: u32) -> u32 {
        self.begin(Tag::encode_map(), count)
    }

    fn begin(&mut self, tag: u8, count: u32) -> u32 {
        let addr = self.append(&encode_container(tag, count, 0));
        self.open.push(addr as usize);
        addr
    }

    /// Close the innermost open container.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedStream` if no container is open.
    pub fn end(&mut self) -> Result<()> {
        let start = self
            .open
            .pop()
            .ok_or(Error::MalformedStream("end without open container"))?;
        let body_len = (self.buffer.len() - start - 9) as u32;
        self.buffer[start + 5..start + 9].copy_from_slice(&body_len.to_le_bytes());
        Ok(())
    }

    /// Finish writing and return the stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedStream` if a container is still open or no
    /// root node was written.
    pub fn finish(self) -> Result<Stream<'static>> {
        if !self.open.is_empty() {
            return Err(Error::MalformedStream("unclosed container"));
        }
        if self.buffer.len() == MAGIC.len() {
            return Err(Error::MalformedStream("no root node"));
        }
        Ok(Stream::from_vec(self.buffer))
    }
}
