//! Secondary index over serialized node streams.
//!
//! [`build`] walks a document through a [`NodeIterator`] and packs the
//! positions of its nodes into a fixed-size arena: arrays become element
//! tables, hashes become open-addressed key tables. Containers that do not
//! fit the depth budget or the arena are kept as offsets into the original
//! stream, so a build always yields a navigable index.
//!
//! ```
//! use stream_index::{Entry, IndexOptions};
//! use stream_index::stream::from_json;
//!
//! let stream = from_json(r#"[10, 20, 30]"#).unwrap();
//! let index = stream_index::build(&mut stream.iter(), &IndexOptions::default()).unwrap();
//!
//! let Entry::Array(array) = index.root_entry().unwrap() else { panic!() };
//! let second = array.get(1).unwrap();
//! assert_eq!(second.stream_offset(), Some(22));
//! ```

pub mod arena;
pub mod dump;
pub mod error;
pub mod footer;
pub mod index;
pub mod iter;
pub mod keys;
pub mod lookup;
pub mod options;
pub mod record;
pub mod stream;
mod walker;

pub use arena::{Arena, RecordOffset};
pub use error::{Error, Result};
pub use index::Index;
pub use iter::{NodeIterator, NodeKind, ScalarValue};
pub use keys::{KeySource, SlotKey};
pub use lookup::{ArrayRecord, Entry, HashRecord, HashSlot};
pub use options::IndexOptions;
pub use record::{Header, Kind};
pub use walker::WalkStats;

/// Build an index over the document behind `iter`.
///
/// Shorthand for [`Index::build`].
///
/// # Errors
///
/// See [`Index::build`].
pub fn build<I>(iter: &mut I, options: &IndexOptions) -> Result<Index>
where
    I: NodeIterator + ?Sized,
{
    Index::build(iter, options)
}
