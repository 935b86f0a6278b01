//! Serialized index footer.

/// Magic bytes closing a serialized index.
pub const MAGIC: &[u8; 4] = b"SIDX";
/// Footer size in bytes.
pub const FOOTER_SIZE: usize = 24;

/// Trailer of a serialized index: build parameters needed to restore it.
#[derive(Debug, PartialEq)]
pub struct Footer {
    pub used: u32,
    pub memory_size: u32,
    pub index_depth: u32,
    pub hash_factor: f64,
}

impl Footer {
    pub fn new(data: &[u8; FOOTER_SIZE]) -> Option<Self> {
        if data.get(20..24)? != MAGIC {
            return None;
        }
        Some(Self {
            used: u32::from_le_bytes(data.get(0..4)?.try_into().ok()?),
            memory_size: u32::from_le_bytes(data.get(4..8)?.try_into().ok()?),
            index_depth: u32::from_le_bytes(data.get(8..12)?.try_into().ok()?),
            hash_factor: f64::from_le_bytes(data.get(12..20)?.try_into().ok()?),
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..4].copy_from_slice(&self.used.to_le_bytes());
        buf[4..8].copy_from_slice(&self.memory_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.index_depth.to_le_bytes());
        buf[12..20].copy_from_slice(&self.hash_factor.to_le_bytes());
        buf[20..24].copy_from_slice(MAGIC);
        buf
    }
}
