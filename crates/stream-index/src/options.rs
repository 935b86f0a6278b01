//! Index build options.
//!
//! Options can be built in code or loaded from JSON:
//!
//! ```
//! use stream_index::IndexOptions;
//!
//! let options = IndexOptions::from_json(r#"{"memory_size": 4096, "index_depth": 2}"#).unwrap();
//! assert_eq!(options.memory_size, 4096);
//! assert_eq!(options.hash_factor, IndexOptions::default().hash_factor);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::ELEMENT_SIZE;

/// Options controlling one index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexOptions {
    /// Arena capacity in bytes.
    pub memory_size: usize,
    /// Deepest container level eligible for a nested record (0 = unlimited).
    pub index_depth: usize,
    /// Hash slot count multiplier, at least 1.0.
    pub hash_factor: f64,
    /// Hard bound on open containers during a walk.
    pub max_nesting: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            memory_size: 64 * 1024,
            index_depth: 0,
            hash_factor: 1.5,
            max_nesting: 1024,
        }
    }
}

impl IndexOptions {
    /// Parse options from a JSON object and validate them.
    ///
    /// Missing fields take their default value; unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns `Error::JsonParse` for malformed input and
    /// `Error::InvalidOptions` if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: IndexOptions =
            serde_json::from_str(json).map_err(|e| Error::JsonParse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    #[must_use]
    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }

    #[must_use]
    pub fn with_index_depth(mut self, index_depth: usize) -> Self {
        self.index_depth = index_depth;
        self
    }

    #[must_use]
    pub fn with_hash_factor(mut self, hash_factor: f64) -> Self {
        self.hash_factor = hash_factor;
        self
    }

    #[must_use]
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Check that the options describe a buildable index.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptions` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.memory_size < ELEMENT_SIZE {
            return Err(Error::InvalidOptions(format!(
                "memory_size {} is smaller than the {ELEMENT_SIZE}-byte root record",
                self.memory_size
            )));
        }
        if u32::try_from(self.memory_size).is_err() {
            return Err(Error::InvalidOptions(format!(
                "memory_size {} does not fit 32-bit record offsets",
                self.memory_size
            )));
        }
        if !self.hash_factor.is_finite() || self.hash_factor < 1.0 {
            return Err(Error::InvalidOptions(format!(
                "hash_factor must be a finite number >= 1.0, got {}",
                self.hash_factor
            )));
        }
        if self.max_nesting == 0 {
            return Err(Error::InvalidOptions("max_nesting must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether a container opened at `depth` is past the indexing budget.
    #[inline]
    #[must_use]
    pub fn depth_exceeded(&self, depth: usize) -> bool {
        self.index_depth != 0 && depth >= self.index_depth
    }

    /// Number of slots a hash record gets for `len` key/value pairs.
    #[must_use]
    pub fn hash_slots(&self, len: u32) -> usize {
        let len = len as usize;
        if self.hash_factor > 1.0 {
            ((len as f64 * self.hash_factor) as usize).max(len)
        } else {
            len
        }
    }
}
