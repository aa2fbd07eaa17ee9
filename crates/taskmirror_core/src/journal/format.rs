//! `undo.data` block format.
//!
//! ```text
//! time <unix-ts>
//! old <record-line>      (omitted for a record's first entry)
//! new <record-line>
//! ---
//! ```

use crate::model::undo::UndoEntry;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SEPARATOR: &str = "---";
const TIME_KEYWORD: &str = "time ";
const OLD_KEYWORD: &str = "old ";
const NEW_KEYWORD: &str = "new ";

/// Undo text does not match the block grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalParseError {
    /// 1-based index of the offending block.
    pub block: usize,
    /// 1-based line number within the whole text.
    pub line: usize,
    pub reason: &'static str,
}

impl Display for JournalParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid undo block {} at line {}: {}",
            self.block, self.line, self.reason
        )
    }
}

impl Error for JournalParseError {}

/// Serializes entries ordered by time; equal times keep slice order.
pub fn serialize(entries: &[UndoEntry]) -> String {
    let mut ordered: Vec<&UndoEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.time);

    let mut out = String::new();
    for entry in ordered {
        out.push_str(TIME_KEYWORD);
        out.push_str(&entry.time.to_string());
        out.push('\n');
        if let Some(old) = &entry.old {
            push_record_line(&mut out, OLD_KEYWORD, old);
        }
        push_record_line(&mut out, NEW_KEYWORD, &entry.new);
        out.push_str(SEPARATOR);
        out.push('\n');
    }
    out
}

fn push_record_line(out: &mut String, keyword: &str, record: &str) {
    out.push_str(keyword);
    out.push_str(record);
    if !record.ends_with('\n') {
        out.push('\n');
    }
}

/// Parses undo text into entries.
///
/// Whitespace-only blocks (such as the one after the trailing separator) are
/// skipped. Record lines are returned with their trailing newline.
pub fn parse(text: &str) -> Result<Vec<UndoEntry>, JournalParseError> {
    let mut entries = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();
    let mut block_no = 1;

    for (index, line) in text.lines().enumerate() {
        if line.trim_end() == SEPARATOR {
            if let Some(entry) = parse_block(&block, block_no)? {
                entries.push(entry);
            }
            block.clear();
            block_no += 1;
            continue;
        }
        if !line.trim().is_empty() {
            block.push((index + 1, line));
        }
    }
    if let Some(entry) = parse_block(&block, block_no)? {
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_block(
    lines: &[(usize, &str)],
    block: usize,
) -> Result<Option<UndoEntry>, JournalParseError> {
    let Some(&(time_line, first)) = lines.first() else {
        return Ok(None);
    };
    let error = |line: usize, reason: &'static str| JournalParseError {
        block,
        line,
        reason,
    };

    let time = first
        .strip_prefix(TIME_KEYWORD)
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| error(time_line, "expected `time <unix-ts>`"))?;

    let (old, new_index) = match lines.get(1) {
        Some(&(line_no, line)) if line.starts_with(OLD_KEYWORD) => (
            Some(record_value(line, OLD_KEYWORD).ok_or_else(|| error(line_no, "expected bracketed record"))?),
            2,
        ),
        Some(_) => (None, 1),
        None => return Err(error(time_line, "block has no `new` line")),
    };

    let &(new_line_no, new_line) = lines
        .get(new_index)
        .ok_or_else(|| error(time_line, "block has no `new` line"))?;
    if !new_line.starts_with(NEW_KEYWORD) {
        return Err(error(new_line_no, "expected `new <record>`"));
    }
    let new = record_value(new_line, NEW_KEYWORD)
        .ok_or_else(|| error(new_line_no, "expected bracketed record"))?;

    if let Some(&(extra_line, _)) = lines.get(new_index + 1) {
        return Err(error(extra_line, "unexpected line after `new`"));
    }

    Ok(Some(UndoEntry { time, old, new }))
}

fn record_value(line: &str, keyword: &str) -> Option<String> {
    let record = line.strip_prefix(keyword)?.trim_end();
    if record.starts_with('[') && record.ends_with(']') {
        Some(format!("{record}\n"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, serialize, JournalParseError};
    use crate::model::undo::UndoEntry;

    const UNDO_SAMPLE: &str = r#"
time 1326338657
new [description:"note: this is a task\&dquot;" entry:"1326338657" status:"pending" uuid:"6f34e415-2441-4058-8c11-320f5c2b2792"]
---
time 1326338708
old [description:"foo \&dquot;bar\&dquot;" entry:"1326250353" status:"pending" uuid:"4300e85d-9bbc-49a6-ba89-89f024bc0795"]
new [description:"foo \&dquot;bar\&dquot;" end:"1326338705" entry:"1326250353" status:"deleted" uuid:"4300e85d-9bbc-49a6-ba89-89f024bc0795"]
"#;

    fn sample_entries() -> Vec<UndoEntry> {
        vec![
            UndoEntry {
                time: 1_326_338_657,
                old: None,
                new: "[description:\"note: this is a task\\&dquot;\" entry:\"1326338657\" status:\"pending\" uuid:\"6f34e415-2441-4058-8c11-320f5c2b2792\"]\n".to_string(),
            },
            UndoEntry {
                time: 1_326_338_708,
                old: Some("[description:\"foo \\&dquot;bar\\&dquot;\" entry:\"1326250353\" status:\"pending\" uuid:\"4300e85d-9bbc-49a6-ba89-89f024bc0795\"]\n".to_string()),
                new: "[description:\"foo \\&dquot;bar\\&dquot;\" end:\"1326338705\" entry:\"1326250353\" status:\"deleted\" uuid:\"4300e85d-9bbc-49a6-ba89-89f024bc0795\"]\n".to_string(),
            },
        ]
    }

    #[test]
    fn parse_reads_sample_without_trailing_separator() {
        assert_eq!(parse(UNDO_SAMPLE).unwrap(), sample_entries());
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let entries = sample_entries();
        assert_eq!(parse(&serialize(&entries)).unwrap(), entries);
    }

    #[test]
    fn conformant_text_reproduces_byte_for_byte() {
        let text = serialize(&sample_entries());
        assert!(text.ends_with("---\n"));
        assert_eq!(serialize(&parse(&text).unwrap()), text);
    }

    #[test]
    fn serialize_orders_by_time_and_keeps_ties_in_insertion_order() {
        let entry = |time: i64, tag: &str| UndoEntry {
            time,
            old: None,
            new: format!("[uuid:\"{tag}\"]\n"),
        };
        let text = serialize(&[entry(5, "b"), entry(1, "a"), entry(5, "c")]);
        let order: Vec<String> = parse(&text).unwrap().into_iter().map(|e| e.new).collect();
        assert_eq!(order, vec!["[uuid:\"a\"]\n", "[uuid:\"b\"]\n", "[uuid:\"c\"]\n"]);
    }

    #[test]
    fn whitespace_only_blocks_are_skipped() {
        let text = "time 1\nnew [uuid:\"a\"]\n---\n   \n---\n\n";
        assert_eq!(parse(text).unwrap().len(), 1);
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_broken_blocks() {
        let err = parse("time soon\nnew [uuid:\"a\"]\n---\n").unwrap_err();
        assert_eq!(
            err,
            JournalParseError {
                block: 1,
                line: 1,
                reason: "expected `time <unix-ts>`",
            }
        );

        let err = parse("time 1\nnew [uuid:\"a\"]\n---\ntime 2\nold [uuid:\"a\"]\n---\n").unwrap_err();
        assert_eq!(err.block, 2);

        let err = parse("time 1\nnew [uuid:\"a\"]\nnew [uuid:\"b\"]\n---\n").unwrap_err();
        assert_eq!(err.line, 3);
    }
}
