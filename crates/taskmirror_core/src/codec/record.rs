//! Line-level encode/decode for `[key:"value" ...]` records.

use super::{CodecError, CodecResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Canonical flattened record: field name to unescaped value, sorted by name.
pub type FieldMap = BTreeMap<String, String>;

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z0-9_.\-]+):"((?:[^"\\]|\\.)*)""#).expect("valid field regex")
});

/// Legacy entity forms still written by older tool versions.
const LEGACY_ENTITIES: &[(&str, &str)] = &[("&dquot;", "\""), ("&open;", "["), ("&close;", "]")];

/// One decoded line of a collection file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// 1-based line number in the source text.
    pub line: usize,
    pub fields: FieldMap,
}

/// Encodes a field map as one newline-terminated record line.
///
/// Fields with empty values are skipped entirely.
pub fn encode(fields: &FieldMap) -> String {
    let mut out = String::from("[");
    let mut first = true;
    for (key, value) in fields {
        if value.is_empty() {
            continue;
        }
        if !first {
            out.push(' ');
        }
        first = false;
        out.push_str(key);
        out.push_str(":\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    out.push_str("]\n");
    out
}

/// Decodes a single record line.
///
/// Errors report line `1`; use [`decode_collection`] for multi-line text.
pub fn decode(line: &str) -> CodecResult<FieldMap> {
    decode_line(line, 1)
}

/// Decodes every non-blank line of a collection file.
///
/// Stops at the first malformed line; nothing is returned for a partially
/// valid batch.
pub fn decode_collection(text: &str) -> CodecResult<Vec<DecodedRecord>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;
        records.push(DecodedRecord {
            line: line_no,
            fields: decode_line(line, line_no)?,
        });
    }
    Ok(records)
}

fn decode_line(line: &str, line_no: usize) -> CodecResult<FieldMap> {
    let leading = line.len() - line.trim_start().len();
    let body = line.trim();

    if !body.starts_with('[') {
        return Err(malformed(line_no, leading, "record must start with `[`"));
    }
    if body.len() < 2 || !body.ends_with(']') {
        return Err(malformed(
            line_no,
            leading + body.len(),
            "record must end with `]`",
        ));
    }

    let inner = &body[1..body.len() - 1];
    let inner_offset = leading + 1;
    let mut fields = FieldMap::new();
    let mut cursor = 0;

    for caps in FIELD_RE.captures_iter(inner) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        check_gap(inner, cursor, whole.start(), inner_offset, line_no)?;
        fields.insert(key.as_str().to_string(), unescape(value.as_str()));
        cursor = whole.end();
    }
    check_gap(inner, cursor, inner.len(), inner_offset, line_no)?;

    Ok(fields)
}

/// Only whitespace may separate two `key:"value"` pairs.
fn check_gap(
    inner: &str,
    from: usize,
    to: usize,
    inner_offset: usize,
    line_no: usize,
) -> CodecResult<()> {
    let gap = &inner[from..to];
    let stray = gap.trim_start();
    if stray.is_empty() {
        return Ok(());
    }
    let offset = inner_offset + from + (gap.len() - stray.len());
    let reason = if stray.contains('"') {
        "unbalanced quote"
    } else {
        "expected key:\"value\" pair"
    };
    Err(malformed(line_no, offset, reason))
}

fn malformed(line: usize, offset: usize, reason: &'static str) -> CodecError {
    CodecError::MalformedRecord {
        line,
        offset,
        reason,
    }
}

/// Escapes a raw value for insertion between quotes.
///
/// A literal `&` that would read as a legacy entity is written as `\&`.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (index, ch) in value.char_indices() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '&' if legacy_entity_at(&value[index..]).is_some() => out.push_str("\\&"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape`] and translates unprotected legacy entity forms.
///
/// Unknown backslash sequences are kept as written.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some((entity, replacement)) = legacy_entity_at(rest) {
                out.push_str(replacement);
                rest = &rest[entity.len()..];
                continue;
            }
        }
        rest = &rest[ch.len_utf8()..];
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(next) = rest.chars().next() else {
            out.push('\\');
            break;
        };
        rest = &rest[next.len_utf8()..];
        match next {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '/' => out.push('/'),
            '&' => out.push('&'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn legacy_entity_at(text: &str) -> Option<(&'static str, &'static str)> {
    LEGACY_ENTITIES
        .iter()
        .copied()
        .find(|(entity, _)| text.starts_with(entity))
}
