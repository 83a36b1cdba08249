//! Source map generation tests.

use nodent_common::source_map::{SourceMapGenerator, base64_encode, vlq};
use serde_json::Value;

#[derive(Debug)]
struct DecodedMapping {
    generated_line: u32,
    generated_column: u32,
    source_index: u32,
    original_line: u32,
    original_column: u32,
    name_index: Option<u32>,
}

fn decode_mappings(mappings: &str) -> Vec<DecodedMapping> {
    let mut decoded = Vec::new();
    let mut generated_line = 0u32;
    let mut prev_generated_column = 0i32;
    let mut prev_source_index = 0i32;
    let mut prev_original_line = 0i32;
    let mut prev_original_column = 0i32;
    let mut prev_name_index = 0i32;

    for line in mappings.split(';') {
        for segment in line.split(',') {
            if segment.is_empty() {
                continue;
            }

            let mut rest = segment;
            let (gen_col_delta, consumed) = vlq::decode(rest).expect("decode generated column");
            rest = &rest[consumed..];
            prev_generated_column += gen_col_delta;

            let (src_delta, consumed) = vlq::decode(rest).expect("decode source index");
            rest = &rest[consumed..];
            let (orig_line_delta, consumed) = vlq::decode(rest).expect("decode original line");
            rest = &rest[consumed..];
            let (orig_col_delta, consumed) = vlq::decode(rest).expect("decode original column");
            rest = &rest[consumed..];

            prev_source_index += src_delta;
            prev_original_line += orig_line_delta;
            prev_original_column += orig_col_delta;

            let name_index = if rest.is_empty() {
                None
            } else {
                let (name_delta, consumed) = vlq::decode(rest).expect("decode name index");
                rest = &rest[consumed..];
                prev_name_index += name_delta;
                Some(prev_name_index as u32)
            };

            assert!(
                rest.is_empty(),
                "unexpected trailing data in mappings segment: {segment}"
            );

            decoded.push(DecodedMapping {
                generated_line,
                generated_column: prev_generated_column as u32,
                source_index: prev_source_index as u32,
                original_line: prev_original_line as u32,
                original_column: prev_original_column as u32,
                name_index,
            });
        }
        generated_line += 1;
        prev_generated_column = 0;
    }

    decoded
}

#[test]
fn test_vlq_known_values() {
    assert_eq!(vlq::encode(0), "A");
    assert_eq!(vlq::encode(1), "C");
    assert_eq!(vlq::encode(-1), "D");
    assert_eq!(vlq::encode(16), "gB");
    assert_eq!(vlq::decode("gB"), Some((16, 2)));
    assert_eq!(vlq::decode("D"), Some((-1, 1)));
    assert_eq!(vlq::decode("g"), None);
}

#[test]
fn test_source_map_simple() {
    let mut generator = SourceMapGenerator::new("output.js".to_string());
    let source_idx = generator.add_source("input.js".to_string());

    generator.add_simple_mapping(0, 0, source_idx, 0, 0);
    generator.add_simple_mapping(0, 10, source_idx, 0, 5);
    generator.add_simple_mapping(1, 0, source_idx, 1, 0);

    let map: Value = serde_json::from_str(&generator.to_json()).expect("parse source map");
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "output.js");
    assert_eq!(map["sources"][0], "input.js");
    assert!(map.get("sourcesContent").is_none());
    assert!(map.get("sourceRoot").is_none());
}

#[test]
fn test_source_map_with_content_and_names() {
    let mut generator = SourceMapGenerator::new("output.js".to_string());
    let source_idx =
        generator.add_source_with_content("input.js".to_string(), "await x;".to_string());
    let name_idx = generator.add_name("x".to_string());
    assert_eq!(generator.add_name("x".to_string()), name_idx);

    generator.add_named_mapping(0, 6, source_idx, 0, 6, name_idx);

    let map: Value = serde_json::from_str(&generator.to_json()).expect("parse source map");
    assert_eq!(map["sourcesContent"][0], "await x;");
    assert_eq!(map["names"][0], "x");

    let decoded = decode_mappings(map["mappings"].as_str().unwrap_or(""));
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].name_index, Some(0));
}

#[test]
fn test_mappings_are_sorted_and_round_trip() {
    let mut generator = SourceMapGenerator::new("output.js".to_string());
    let source_idx = generator.add_source("input.js".to_string());

    // Added out of order on purpose.
    generator.add_simple_mapping(2, 4, source_idx, 1, 2);
    generator.add_simple_mapping(0, 0, source_idx, 0, 0);
    generator.add_simple_mapping(0, 5, source_idx, 0, 3);

    let decoded = decode_mappings(&generator.encode_mappings());
    assert_eq!(decoded.len(), 3);
    assert_eq!(
        (decoded[0].generated_line, decoded[0].generated_column),
        (0, 0)
    );
    assert_eq!(
        (decoded[1].generated_line, decoded[1].generated_column),
        (0, 5)
    );
    assert_eq!(decoded[1].original_column, 3);
    assert_eq!(
        (decoded[2].generated_line, decoded[2].generated_column),
        (2, 4)
    );
    assert_eq!(decoded[2].original_line, 1);
    assert_eq!(decoded[2].source_index, 0);
}

#[test]
fn test_inline_source_map() {
    let mut generator = SourceMapGenerator::new("output.js".to_string());
    generator.add_source("input.js".to_string());
    generator.add_simple_mapping(0, 0, 0, 0, 0);

    let inline = generator.to_inline_comment();
    assert!(
        inline.starts_with("//# sourceMappingURL=data:application/json;charset=utf-8;base64,")
    );
}

#[test]
fn test_base64_encode() {
    assert_eq!(base64_encode(b""), "");
    assert_eq!(base64_encode(b"f"), "Zg==");
    assert_eq!(base64_encode(b"fo"), "Zm8=");
    assert_eq!(base64_encode(b"foo"), "Zm9v");
    assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
}
