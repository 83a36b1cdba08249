//! Source Map v3 generation.
//!
//! The transform produces a list of synthesized-node → original-position
//! correspondences. Whoever prints the tree knows the generated line/column of
//! each node and feeds both into a `SourceMapGenerator` to obtain a standard
//! source map, optionally as an inline `sourceMappingURL` data comment.

use serde::Serialize;

/// A single generated → original mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_index: u32,
    pub original_line: u32,
    pub original_column: u32,
    pub name_index: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u32,
    file: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    source_root: &'a str,
    sources: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    sources_content: Option<Vec<Option<&'a str>>>,
    names: &'a [String],
    mappings: String,
}

/// Accumulates mappings and serializes them as a v3 source map.
#[derive(Debug, Clone, Default)]
pub struct SourceMapGenerator {
    file: String,
    source_root: String,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMapGenerator {
    pub fn new(file: String) -> Self {
        SourceMapGenerator {
            file,
            ..Default::default()
        }
    }

    pub fn set_source_root(&mut self, root: String) {
        self.source_root = root;
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, source: String) -> u32 {
        if let Some(existing) = self.sources.iter().position(|s| *s == source) {
            return existing as u32;
        }
        self.sources.push(source);
        self.sources_content.push(None);
        (self.sources.len() - 1) as u32
    }

    /// Register a source file together with its original text.
    pub fn add_source_with_content(&mut self, source: String, content: String) -> u32 {
        let idx = self.add_source(source);
        self.sources_content[idx as usize] = Some(content);
        idx
    }

    /// Register a symbol name and return its index.
    pub fn add_name(&mut self, name: String) -> u32 {
        if let Some(existing) = self.names.iter().position(|n| *n == name) {
            return existing as u32;
        }
        self.names.push(name);
        (self.names.len() - 1) as u32
    }

    pub fn add_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    pub fn add_simple_mapping(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        source_index: u32,
        original_line: u32,
        original_column: u32,
    ) {
        self.add_mapping(Mapping {
            generated_line,
            generated_column,
            source_index,
            original_line,
            original_column,
            name_index: None,
        });
    }

    pub fn add_named_mapping(
        &mut self,
        generated_line: u32,
        generated_column: u32,
        source_index: u32,
        original_line: u32,
        original_column: u32,
        name_index: u32,
    ) {
        self.add_mapping(Mapping {
            generated_line,
            generated_column,
            source_index,
            original_line,
            original_column,
            name_index: Some(name_index),
        });
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Encode the mappings field (sorted by generated position).
    pub fn encode_mappings(&self) -> String {
        let mut sorted = self.mappings.clone();
        sorted.sort_by_key(|m| (m.generated_line, m.generated_column));

        let mut out = String::new();
        let mut line = 0u32;
        let mut prev_generated_column = 0i64;
        let mut prev_source = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;
        let mut first_in_line = true;

        for m in &sorted {
            while line < m.generated_line {
                out.push(';');
                line += 1;
                prev_generated_column = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;

            vlq::encode_into(&mut out, m.generated_column as i64 - prev_generated_column);
            prev_generated_column = m.generated_column as i64;
            vlq::encode_into(&mut out, m.source_index as i64 - prev_source);
            prev_source = m.source_index as i64;
            vlq::encode_into(&mut out, m.original_line as i64 - prev_original_line);
            prev_original_line = m.original_line as i64;
            vlq::encode_into(&mut out, m.original_column as i64 - prev_original_column);
            prev_original_column = m.original_column as i64;
            if let Some(name) = m.name_index {
                vlq::encode_into(&mut out, name as i64 - prev_name);
                prev_name = name as i64;
            }
        }

        out
    }

    pub fn to_json(&self) -> String {
        let has_content = self.sources_content.iter().any(Option::is_some);
        let raw = RawSourceMap {
            version: 3,
            file: &self.file,
            source_root: &self.source_root,
            sources: &self.sources,
            sources_content: has_content
                .then(|| self.sources_content.iter().map(|c| c.as_deref()).collect()),
            names: &self.names,
            mappings: self.encode_mappings(),
        };
        // Serializing plain strings and vectors cannot fail.
        serde_json::to_string(&raw).unwrap_or_default()
    }

    /// The map as a trailing `//# sourceMappingURL=data:...` comment.
    pub fn to_inline_comment(&self) -> String {
        format!(
            "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
            base64_encode(self.to_json().as_bytes())
        )
    }
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(BASE64_CHARS[(triple >> 18) as usize & 63] as char);
        out.push(BASE64_CHARS[(triple >> 12) as usize & 63] as char);
        if chunk.len() > 1 {
            out.push(BASE64_CHARS[(triple >> 6) as usize & 63] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64_CHARS[triple as usize & 63] as char);
        } else {
            out.push('=');
        }
    }
    out
}

/// Base64 VLQ encoding used by the `mappings` field.
pub mod vlq {
    use super::BASE64_CHARS;

    const VLQ_BASE_SHIFT: u32 = 5;
    const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
    const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
    const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

    pub fn encode(value: i64) -> String {
        let mut out = String::new();
        encode_into(&mut out, value);
        out
    }

    pub fn encode_into(out: &mut String, value: i64) {
        let mut vlq = if value < 0 {
            ((-value) << 1) | 1
        } else {
            value << 1
        };

        loop {
            let mut digit = vlq & VLQ_BASE_MASK;
            vlq >>= VLQ_BASE_SHIFT;
            if vlq > 0 {
                digit |= VLQ_CONTINUATION_BIT;
            }
            out.push(BASE64_CHARS[digit as usize] as char);
            if vlq == 0 {
                break;
            }
        }
    }

    fn decode_digit(ch: u8) -> Option<i64> {
        BASE64_CHARS
            .iter()
            .position(|&c| c == ch)
            .map(|idx| idx as i64)
    }

    /// Decode one value; returns the value and the number of bytes consumed.
    pub fn decode(input: &str) -> Option<(i32, usize)> {
        let mut result = 0i64;
        let mut shift = 0u32;

        for (consumed, &byte) in input.as_bytes().iter().enumerate() {
            let digit = decode_digit(byte)?;
            result += (digit & VLQ_BASE_MASK) << shift;
            if digit & VLQ_CONTINUATION_BIT == 0 {
                let negative = result & 1 == 1;
                let magnitude = result >> 1;
                let value = if negative { -magnitude } else { magnitude };
                return Some((value as i32, consumed + 1));
            }
            shift += VLQ_BASE_SHIFT;
        }

        None
    }
}
