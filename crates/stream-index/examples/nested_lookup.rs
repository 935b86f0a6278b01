//! Example of navigating a document through its index.
//!
//! cargo run --package stream-index --example nested_lookup

use stream_index::stream::{TypedValue, from_json, value_to_json};
use stream_index::{Entry, IndexOptions};

fn main() -> Result<(), stream_index::Error> {
    let doc = from_json(r#"{"users": [{"name": "Amy"}, {"name": "Bob"}]}"#)?;
    let index = stream_index::build(&mut doc.iter(), &IndexOptions::default())?;

    // node = root
    let Entry::Hash(node) = index.root_entry()? else {
        panic!()
    };

    // node = root["users"]
    let Some(Entry::Array(node)) = node.get(b"users", &doc)? else {
        panic!()
    };

    // node = root["users"][1]
    let Entry::Hash(node) = node.get(1)? else {
        panic!()
    };

    // node = root["users"][1]["name"]
    let Some(Entry::Stream { offset, .. }) = node.get(b"name", &doc)? else {
        panic!()
    };
    let TypedValue::Str(name) = doc.value(offset)?.typed()? else {
        panic!()
    };
    println!("{name}");

    // With a depth budget of 1 the users array stays in the stream.
    let options = IndexOptions::default().with_index_depth(1);
    let index = stream_index::build(&mut doc.iter(), &options)?;
    let Entry::Hash(node) = index.root_entry()? else {
        panic!()
    };
    let Some(Entry::Stream { offset, .. }) = node.get(b"users", &doc)? else {
        panic!()
    };
    println!("{}", value_to_json(&doc, offset)?);

    print!("{}", index.dump());
    Ok(())
}
