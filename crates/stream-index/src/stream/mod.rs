//! Reference node stream: a compact tagged binary tree format with a
//! [`NodeIterator`](crate::NodeIterator) implementation, a writer and JSON
//! conversion.

pub mod document;
pub mod encode;
pub mod iter;
pub mod json;
pub mod tag;
pub mod value;

pub use document::{MAGIC, Stream};
pub use encode::StreamWriter;
pub use iter::StreamIterator;
pub use json::{from_json, to_json, value_to_json};
pub use value::{TypedValue, Value};
