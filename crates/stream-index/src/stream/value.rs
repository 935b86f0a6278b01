//! Zero-copy node views over stream bytes.
//!
//! A [`Value`] is a stream slice plus the address of a tag byte. Nothing is
//! parsed up front; accessors read straight from the bytes.
//!
//! ```
//! use stream_index::stream::value::{TypedValue, Value};
//!
//! let data = [0x02, 0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]; // int(42)
//! let value = Value::new(&data, 0).unwrap();
//!
//! match value.typed().unwrap() {
//!     TypedValue::Int(n) => assert_eq!(n, 42),
//!     _ => panic!("expected int"),
//! }
//! ```

use crate::error::{Error, Result};
use crate::iter::ScalarValue;
use crate::stream::tag::{NodeType, Tag, read_uint_le};

/// Bytes before the first child of an arr/map: tag, count u32, body length u32.
pub const CONTAINER_PREFIX: usize = 9;

/// A typed view of a node for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    /// Array with `count` elements.
    Arr { count: u32 },
    /// Map with `count` key/value pairs.
    Map { count: u32 },
}

impl<'a> TypedValue<'a> {
    /// Scalar view of this value, `None` for containers.
    #[must_use]
    pub fn scalar(self) -> Option<ScalarValue<'a>> {
        match self {
            TypedValue::Nil => Some(ScalarValue::Nil),
            TypedValue::Bool(b) => Some(ScalarValue::Bool(b)),
            TypedValue::Int(n) => Some(ScalarValue::Int(n)),
            TypedValue::Float(n) => Some(ScalarValue::Float(n)),
            TypedValue::Str(s) => Some(ScalarValue::Str(s)),
            TypedValue::Bytes(b) => Some(ScalarValue::Bytes(b)),
            TypedValue::Arr { .. } | TypedValue::Map { .. } => None,
        }
    }
}

/// A zero-copy view of the node at `addr`.
#[derive(Clone, Copy)]
pub struct Value<'a> {
    data: &'a [u8],
    addr: u32,
}

impl<'a> Value<'a> {
    /// Create a view of the node at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AddressOutOfBounds` if `addr` is outside `data`.
    #[inline]
    pub fn new(data: &'a [u8], addr: u32) -> Result<Self> {
        if addr as usize >= data.len() {
            return Err(Error::AddressOutOfBounds {
                addr,
                len: data.len(),
            });
        }
        Ok(Self { data, addr })
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> u32 {
        self.addr
    }

    #[inline]
    fn tag(&self) -> Tag {
        Tag::from_byte(self.data[self.addr as usize])
    }

    /// Node type from the tag byte.
    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.tag().node_type()
    }

    /// Get a typed view of this node.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is truncated, a length is malformed, or
    /// str bytes are not UTF-8.
    pub fn typed(&self) -> Result<TypedValue<'a>> {
        match self.node_type() {
            NodeType::Nil => Ok(TypedValue::Nil),
            NodeType::Bool => Ok(TypedValue::Bool(self.tag().bool_value())),
            NodeType::Int => Ok(TypedValue::Int(i64::from_le_bytes(self.fixed8()?))),
            NodeType::Float => Ok(TypedValue::Float(f64::from_le_bytes(self.fixed8()?))),
            NodeType::Str => {
                let bytes = self.payload_bytes()?;
                let s = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
                Ok(TypedValue::Str(s))
            }
            NodeType::Bin => Ok(TypedValue::Bytes(self.payload_bytes()?)),
            NodeType::Arr => Ok(TypedValue::Arr {
                count: self.container_word(1)?,
            }),
            NodeType::Map => Ok(TypedValue::Map {
                count: self.container_word(1)?,
            }),
        }
    }

    /// Raw payload of a str or bin node.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnexpectedKind` for other node types.
    pub fn payload_bytes(&self) -> Result<&'a [u8]> {
        match self.node_type() {
            NodeType::Str | NodeType::Bin => {
                self.txt_or_bin_bytes().ok_or(Error::InvalidLengthEncoding)
            }
            other => Err(Error::UnexpectedKind {
                expected: "str or bin",
                found: other.name(),
            }),
        }
    }

    fn fixed8(&self) -> Result<[u8; 8]> {
        let start = self.addr as usize + 1;
        self.data
            .get(start..start + 8)
            .ok_or(Error::TruncatedValue)?
            .try_into()
            .map_err(|_| Error::TruncatedValue)
    }

    /// The `index`-th u32 after the tag of a container (1 = count, 2 = body length).
    fn container_word(&self, index: usize) -> Result<u32> {
        let start = self.addr as usize + 1 + (index - 1) * 4;
        let bytes = self
            .data
            .get(start..start + 4)
            .ok_or(Error::TruncatedValue)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn txt_or_bin_bytes(&self) -> Option<&'a [u8]> {
        let tag = self.tag();
        let base = self.addr as usize;

        if tag.is_packed() {
            let len = tag.packed_length() as usize;
            let start = base + 1;
            self.data.get(start..start + len)
        } else {
            let n = tag.length_byte_count() as usize;
            if n == 0 || n > 8 {
                return None;
            }
            let len_start = base + 1;
            let len = read_uint_le(self.data.get(len_start..len_start + n)?)?;
            let payload_start = len_start + n;
            self.data.get(payload_start..payload_start.checked_add(len)?)
        }
    }

    /// Address of the first child of an arr/map node.
    #[must_use]
    pub fn body_start(&self) -> u32 {
        self.addr.saturating_add(CONTAINER_PREFIX as u32)
    }

    /// Total byte size of this node, children included.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLengthEncoding` or `Error::TruncatedValue` if
    /// the node header is malformed.
    pub fn node_size(&self) -> Result<usize> {
        let tag = self.tag();
        let base = self.addr as usize;

        match tag.node_type() {
            NodeType::Nil | NodeType::Bool => Ok(1),
            NodeType::Int | NodeType::Float => Ok(9),
            NodeType::Str | NodeType::Bin => {
                if tag.is_packed() {
                    Ok(1 + tag.packed_length() as usize)
                } else {
                    let n = tag.length_byte_count() as usize;
                    let len_start = base + 1;
                    let len = read_uint_le(
                        self.data
                            .get(len_start..len_start + n)
                            .ok_or(Error::InvalidLengthEncoding)?,
                    )
                    .ok_or(Error::InvalidLengthEncoding)?;
                    (1 + n).checked_add(len).ok_or(Error::InvalidLengthEncoding)
                }
            }
            NodeType::Arr | NodeType::Map => {
                Ok(CONTAINER_PREFIX + self.container_word(2)? as usize)
            }
        }
    }
}

impl std::fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.typed() {
            Ok(TypedValue::Nil) => write!(f, "Value::Nil"),
            Ok(TypedValue::Bool(b)) => write!(f, "Value::Bool({b:?})"),
            Ok(TypedValue::Int(n)) => write!(f, "Value::Int({n:?})"),
            Ok(TypedValue::Float(n)) => write!(f, "Value::Float({n:?})"),
            Ok(TypedValue::Str(s)) => write!(f, "Value::Str({s:?})"),
            Ok(TypedValue::Bytes(b)) => write!(f, "Value::Bytes({b:?})"),
            Ok(TypedValue::Arr { count }) => write!(f, "Value::Arr(@{:#x}, {count})", self.addr),
            Ok(TypedValue::Map { count }) => write!(f, "Value::Map(@{:#x}, {count})", self.addr),
            Err(e) => write!(f, "Value::Invalid({e})"),
        }
    }
}
