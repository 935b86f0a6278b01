//! End-to-end index builds over reference streams.

use stream_index::record::Element;
use stream_index::stream::{Stream, from_json};
use stream_index::{
    Entry, Error, Header, Index, IndexOptions, Kind, NodeIterator, NodeKind, RecordOffset,
    SlotKey, build,
};

fn stream(json: &str) -> Stream<'static> {
    from_json(json).unwrap()
}

fn build_index(stream: &Stream, options: &IndexOptions) -> Index {
    build(&mut stream.iter(), options).unwrap()
}

fn root_element(index: &Index) -> Element {
    Element::read(index.arena(), index.root()).unwrap()
}

/// Stream offsets of the children of the container at the iterator position.
fn child_offsets(it: &mut impl NodeIterator) -> Vec<u32> {
    let mut out = Vec::new();
    it.step_in(1).unwrap();
    while !it.is_eof() {
        out.push(it.offset());
        it.step_over(1).unwrap();
    }
    it.step_out(1).unwrap();
    out
}

/// Visit every entry below `entry`; `depth` is the nesting depth of the
/// container `entry` describes.
fn visit<'a>(entry: Entry<'a>, depth: usize, f: &mut impl FnMut(Entry<'a>, usize)) {
    f(entry, depth);
    match entry {
        Entry::Array(array) => {
            for child in array.entries() {
                visit(child.unwrap(), depth + 1, f);
            }
        }
        Entry::Hash(hash) => {
            for slot in hash.slots() {
                visit(slot.unwrap().entry().unwrap(), depth + 1, f);
            }
        }
        Entry::Empty | Entry::Stream { .. } => {}
    }
}

const NESTED: &str = r#"{
    "users": [
        {"name": "Amy", "roles": ["admin", "dev"], "address": {"city": "Oslo"}},
        {"name": "Bob", "roles": [], "address": {"city": "Lima", "zip": [1, 2]}}
    ],
    "meta": {"count": 2, "tags": [[1], [2, [3]]]},
    "a_rather_long_key": null
}"#;

#[test]
fn scenario_a_top_level_scalar() {
    let s = stream("42");
    let index = build_index(&s, &IndexOptions::default());

    assert_eq!(index.used(), 8);
    assert_eq!(index.as_bytes(), &[0, 0, 0, 0x01, 4, 0, 0, 0]);
    let root = root_element(&index);
    assert_eq!(root.header.kind, Kind::Scalar);
    assert!(!root.header.pointer_is_index);
    assert_eq!(root.offset, s.root_addr());
}

#[test]
fn scenario_b_array_of_scalars() {
    let s = stream("[1, 2, 3]");
    let index = build_index(&s, &IndexOptions::default());

    assert_eq!(index.used(), 8 + 8 + 3 * 8);
    let root = root_element(&index);
    assert_eq!(root.header, Header::indirection());
    assert_eq!(root.offset, 8);

    let record = Element::read(index.arena(), RecordOffset::new(8)).unwrap();
    assert_eq!(record.header.kind, Kind::Array);
    assert_eq!(record.header.size, 3);
    assert_eq!(record.offset, 4);

    let Entry::Array(array) = index.root_entry().unwrap() else {
        panic!("expected array");
    };
    let offsets: Vec<_> = array
        .entries()
        .map(|e| e.unwrap().stream_offset().unwrap())
        .collect();
    assert_eq!(offsets, vec![13, 22, 31]);
    assert_eq!(offsets, child_offsets(&mut s.iter()));
}

#[test]
fn scenario_c_array_without_room() {
    let s = stream("[1, 2, 3]");
    let options = IndexOptions::default().with_memory_size(39);
    let index = build_index(&s, &options);

    assert_eq!(index.used(), 8);
    let root = root_element(&index);
    assert_eq!(root.header.kind, Kind::Array);
    assert!(!root.header.pointer_is_index);
    assert_eq!(root.offset, 4);
    assert_eq!(
        index.root_entry().unwrap(),
        Entry::Stream {
            kind: Kind::Array,
            offset: 4
        }
    );
}

#[test]
fn scenario_d_hash_with_factor() {
    let s = stream(r#"{"a": 1, "b": 2}"#);
    let options = IndexOptions::default().with_hash_factor(2.0);
    let index = build_index(&s, &options);

    let Entry::Hash(hash) = index.root_entry().unwrap() else {
        panic!("expected hash");
    };
    assert_eq!(hash.slot_count(), 4);

    // djb2("a") = 177670, djb2("b") = 177671
    let a = hash.slot(2).unwrap().unwrap();
    let b = hash.slot(3).unwrap().unwrap();
    assert_eq!(a.key().unwrap(), SlotKey::Inline(b"a"));
    assert_eq!(b.key().unwrap(), SlotKey::Inline(b"b"));
    assert!(hash.slot(0).unwrap().is_none());
    assert!(hash.slot(1).unwrap().is_none());

    assert_eq!(a.entry().unwrap().stream_offset(), Some(15));
    assert_eq!(hash.get(b"b", &s).unwrap().unwrap().stream_offset(), Some(26));
}

#[test]
fn capacity_invariant() {
    let s = stream(NESTED);
    for memory_size in (8..1024).step_by(24) {
        let options = IndexOptions::default().with_memory_size(memory_size);
        let index = build_index(&s, &options);
        assert!(index.used() <= memory_size);
        assert_eq!(index.capacity(), memory_size);
    }
}

#[test]
fn depth_bounded_indexing() {
    let s = stream(NESTED);
    for d in 1..5 {
        let options = IndexOptions::default().with_index_depth(d);
        let index = build_index(&s, &options);
        let mut deepest = 0;
        visit(index.root_entry().unwrap(), 0, &mut |entry, depth| {
            if entry.is_indexed() {
                assert!(depth < d, "indexed container at depth {depth} with index_depth {d}");
                deepest = deepest.max(depth);
            }
        });
        assert_eq!(deepest, d - 1);
    }
}

#[test]
fn degrades_under_memory_pressure() {
    let s = stream(NESTED);
    let full = build_index(&s, &IndexOptions::default()).used();

    for memory_size in 8..=full {
        let options = IndexOptions::default().with_memory_size(memory_size);
        let index = build_index(&s, &options);
        let stats = *index.stats();
        assert!(stats.indexed + stats.out_of_memory > 0);
        if memory_size < full {
            assert!(stats.out_of_memory > 0, "memory_size {memory_size}");
        }

        visit(index.root_entry().unwrap(), 0, &mut |entry, _| {
            if let Entry::Stream { kind, offset } = entry {
                let node = s.value(offset).unwrap();
                match kind {
                    Kind::Array => assert_eq!(node.node_type().name(), "arr"),
                    Kind::Hash => assert_eq!(node.node_type().name(), "map"),
                    Kind::Scalar => assert!(!node.node_type().is_container()),
                    Kind::Empty => unreachable!(),
                }
            }
        });
    }
}

#[test]
fn record_offsets_round_trip() {
    let s = stream(NESTED);
    let index = build_index(&s, &IndexOptions::default());
    let arena = index.arena();

    let mut records = vec![index.root()];
    visit(index.root_entry().unwrap(), 0, &mut |entry, _| match entry {
        Entry::Array(a) => records.push(a.offset()),
        Entry::Hash(h) => records.push(h.offset()),
        _ => {}
    });
    assert!(records.len() > 5);

    for offset in records {
        let view = arena.ptr_for_offset(offset).unwrap();
        assert_eq!(arena.offset_for(view), Some(offset));
        assert_eq!(
            arena.ptr_for_offset(arena.offset_for(view).unwrap()).unwrap().as_ptr(),
            view.as_ptr()
        );
    }
}

#[test]
fn array_slots_follow_iteration_order() {
    let s = stream(r#"[true, "x", [1, 2], {"k": 0}, null, 2.5]"#);
    let index = build_index(&s, &IndexOptions::default());
    let Entry::Array(array) = index.root_entry().unwrap() else {
        panic!("expected array");
    };

    let expected = child_offsets(&mut s.iter());
    assert_eq!(array.len() as usize, expected.len());
    for (i, offset) in expected.into_iter().enumerate() {
        assert_eq!(array.get(i as u32).unwrap().stream_offset(), Some(offset));
    }
}

#[test]
fn hash_keys_are_found_by_probing() {
    let keys: Vec<String> = (0..40).map(|i| format!("key_{i}_{}", "x".repeat(i % 12))).collect();
    let json = serde_json::to_string(
        &keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), serde_json::Value::from(i)))
            .collect::<serde_json::Map<_, _>>(),
    )
    .unwrap();
    let s = stream(&json);

    for factor in [1.0, 1.3, 2.0] {
        let options = IndexOptions::default().with_hash_factor(factor);
        let index = build_index(&s, &options);
        let Entry::Hash(hash) = index.root_entry().unwrap() else {
            panic!("expected hash");
        };

        for key in &keys {
            let entry = hash.get(key.as_bytes(), &s).unwrap().unwrap();
            let offset = entry.stream_offset().unwrap();
            let value = s.value(offset).unwrap().typed().unwrap();
            let expected = keys.iter().position(|k| k == key).unwrap() as i64;
            assert_eq!(value, stream_index::stream::TypedValue::Int(expected));
        }
        assert!(hash.get(b"missing", &s).unwrap().is_none());

        for slot in hash.slots() {
            match slot.unwrap().key().unwrap() {
                SlotKey::Inline(bytes) => assert!(bytes.len() <= 8),
                SlotKey::Stream { len, offset, .. } => {
                    assert!(len > 8);
                    let key = s.value(offset).unwrap().payload_bytes().unwrap();
                    assert_eq!(key.len(), len as usize);
                }
            }
        }
    }
}

#[test]
fn nesting_bound_fails_cleanly() {
    let json = format!("{}1{}", "[".repeat(40), "]".repeat(40));
    let s = stream(&json);

    let options = IndexOptions::default().with_max_nesting(16);
    assert_eq!(
        build(&mut s.iter(), &options).unwrap_err(),
        Error::NestingTooDeep { max: 16 }
    );

    // a depth budget stops descent before the nesting bound is reached
    let options = options.with_index_depth(8);
    let index = build_index(&s, &options);
    assert_eq!(index.stats().over_depth, 1);
}

#[test]
fn serialized_index_restores_identical_entries() {
    let s = stream(NESTED);
    let options = IndexOptions::default().with_index_depth(3).with_hash_factor(1.5);
    let original = build_index(&s, &options);
    let restored = Index::from_bytes(&original.to_bytes()).unwrap();

    let mut a = Vec::new();
    visit(original.root_entry().unwrap(), 0, &mut |e, d| a.push((d, e.kind(), e.stream_offset())));
    let mut b = Vec::new();
    visit(restored.root_entry().unwrap(), 0, &mut |e, d| b.push((d, e.kind(), e.stream_offset())));
    assert_eq!(a, b);
    assert_eq!(restored.options(), original.options());
}

#[test]
fn dump_is_read_only() {
    let s = stream(NESTED);
    let index = build_index(&s, &IndexOptions::default());
    let bytes = index.as_bytes().to_vec();
    let dump = index.dump().to_string();
    assert!(dump.starts_with("index used="));
    assert!(dump.contains("\"users\""));
    assert_eq!(index.as_bytes(), &bytes[..]);
}

#[test]
fn options_from_json_drive_the_build() {
    let s = stream(NESTED);
    let options =
        IndexOptions::from_json(r#"{"memory_size": 512, "index_depth": 2, "hash_factor": 2.0}"#)
            .unwrap();
    let index = build_index(&s, &options);
    assert!(index.used() <= 512);
    assert_eq!(index.stats().skipped, 0);

    let root = index.root_entry().unwrap();
    let Entry::Hash(hash) = root else {
        panic!("expected hash");
    };
    assert_eq!(hash.slot_count(), 6);

    assert_eq!(s.iter().info().unwrap(), (NodeKind::Hash, 3));
}
