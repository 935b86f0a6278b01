//! Tag byte parsing and encoding for stream nodes.
//!
//! Each node starts with a 1-byte tag. The bottom 3 bits encode the node
//! type (0-7), and the upper 5 bits are type-specific.

/// Node type encoded in the bottom 3 bits of the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    Str = 4,
    Bin = 5,
    Arr = 6,
    Map = 7,
}

impl NodeType {
    /// Parse node type from the bottom 3 bits of a tag byte.
    #[inline]
    #[must_use]
    pub fn from_tag(tag: u8) -> Self {
        match tag & 0b111 {
            0 => NodeType::Nil,
            1 => NodeType::Bool,
            2 => NodeType::Int,
            3 => NodeType::Float,
            4 => NodeType::Str,
            5 => NodeType::Bin,
            6 => NodeType::Arr,
            7 => NodeType::Map,
            _ => unreachable!(),
        }
    }

    /// Get the type name as a string (for error messages).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Nil => "nil",
            NodeType::Bool => "bool",
            NodeType::Int => "int",
            NodeType::Float => "float",
            NodeType::Str => "str",
            NodeType::Bin => "bin",
            NodeType::Arr => "arr",
            NodeType::Map => "map",
        }
    }

    /// Whether nodes of this type carry children.
    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, NodeType::Arr | NodeType::Map)
    }
}

/// Parsed tag byte.
#[derive(Debug, Clone, Copy)]
pub struct Tag(u8);

impl Tag {
    #[inline]
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Tag(b)
    }

    /// Get the node type (bottom 3 bits).
    #[inline]
    #[must_use]
    pub fn node_type(self) -> NodeType {
        NodeType::from_tag(self.0)
    }

    /// Boolean value (bit 3). Only valid for bool tags.
    #[inline]
    #[must_use]
    pub fn bool_value(self) -> bool {
        (self.0 >> 3) & 1 == 1
    }

    /// Whether a str/bin length is packed into the tag (bit 3).
    #[inline]
    #[must_use]
    pub fn is_packed(self) -> bool {
        (self.0 >> 3) & 1 == 1
    }

    /// Packed length from the high 4 bits (0-15).
    #[inline]
    #[must_use]
    pub fn packed_length(self) -> u8 {
        self.0 >> 4
    }

    /// Number of bytes encoding an unpacked str/bin length (1-8).
    #[inline]
    #[must_use]
    pub fn length_byte_count(self) -> u8 {
        self.0 >> 4
    }

    #[inline]
    #[must_use]
    pub const fn encode_nil() -> u8 {
        0x00
    }

    #[inline]
    #[must_use]
    pub const fn encode_bool(value: bool) -> u8 {
        if value { 0x09 } else { 0x01 }
    }

    #[inline]
    #[must_use]
    pub const fn encode_int() -> u8 {
        0x02
    }

    #[inline]
    #[must_use]
    pub const fn encode_float() -> u8 {
        0x03
    }

    /// Str tag with packed length (0-15).
    #[inline]
    #[must_use]
    pub const fn encode_str_packed(len: u8) -> u8 {
        (len << 4) | 0x08 | 0x04
    }

    /// Str tag followed by `n` length bytes (1-8).
    #[inline]
    #[must_use]
    pub const fn encode_str_unpacked(n: u8) -> u8 {
        (n << 4) | 0x04
    }

    /// Bin tag with packed length (0-15).
    #[inline]
    #[must_use]
    pub const fn encode_bin_packed(len: u8) -> u8 {
        (len << 4) | 0x08 | 0x05
    }

    /// Bin tag followed by `n` length bytes (1-8).
    #[inline]
    #[must_use]
    pub const fn encode_bin_unpacked(n: u8) -> u8 {
        (n << 4) | 0x05
    }

    #[inline]
    #[must_use]
    pub const fn encode_arr() -> u8 {
        0x06
    }

    #[inline]
    #[must_use]
    pub const fn encode_map() -> u8 {
        0x07
    }
}

/// Read a little-endian unsigned integer of 1-8 bytes.
#[must_use]
pub fn read_uint_le(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf) as usize)
}

/// Minimal byte count (1-8) needed to encode a value, and its LE bytes.
#[must_use]
pub fn minimal_uint_encoding(value: usize) -> (usize, [u8; 8]) {
    let bytes = (value as u64).to_le_bytes();
    let n = if value == 0 {
        1
    } else {
        8 - ((value as u64).leading_zeros() / 8) as usize
    };
    (n.max(1), bytes)
}
