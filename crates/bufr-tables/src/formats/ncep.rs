//! NCEP pipe/semicolon tables.
//!
//! Line-oriented with `|` and `;` both acting as field separators. The first
//! line is a title and is discarded; a literal `END` row stops the table
//! early. Table D spreads one sequence over several rows: the header row
//! carries the sequence key in column 0, continuation rows leave column 0
//! empty and put the child key in column 1, flagged with a trailing `>`
//! while more children follow.

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use tracing::debug;

use super::{parse_num, skip_row, Parsed};

/// Parse an NCEP Table B: `F-XX-YYY | scale | reference | width | units | name`.
pub fn read_element_table(name: &str, location: &str, text: &str) -> Parsed<ElementTable> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        if raw.trim_start().starts_with("END") {
            break;
        }
        let fields = split_fields(raw);
        if fields.len() < 6 {
            skip_row(&mut skipped, location, line_no, "expected at least 6 fields");
            continue;
        }
        match parse_element_row(&fields) {
            Ok(entry) => {
                if let Some(prev) = table.insert(entry) {
                    debug!(location = %location, key = %prev.key, "duplicate element definition, keeping later row");
                }
            }
            Err(reason) => skip_row(&mut skipped, location, line_no, &reason),
        }
    }

    Parsed { table, skipped }
}

fn parse_element_row(fields: &[&str]) -> Result<ElementEntry, String> {
    let key = DescriptorKey::from_dash_notation(fields[0]).map_err(|e| e.to_string())?;
    Ok(ElementEntry {
        key,
        name: fields[5].trim().to_string(),
        units: fields[4].trim().to_string(),
        scale: parse_num(fields[1], "scale")?,
        reference: parse_num(fields[2], "reference")?,
        width: parse_num(fields[3], "width")?,
    })
}

/// Parse an NCEP Table D. Header rows have a dash-notation key in column 0
/// and the sequence name in column 3; continuation rows have an empty
/// column 0 and a child key in column 1.
pub fn read_sequence_table(name: &str, location: &str, text: &str) -> Parsed<SequenceTable> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        if raw.trim_start().starts_with("END") {
            break;
        }
        let fields = split_fields(raw);
        let head = fields.first().map(|f| f.trim()).unwrap_or("");

        if !head.is_empty() {
            match DescriptorKey::from_dash_notation(head) {
                Ok(key) => {
                    let seq_name = fields.get(3).map(|f| f.trim()).unwrap_or("");
                    table.begin_sequence(key, seq_name);
                }
                Err(e) => {
                    // Close out the previous sequence; this one's children
                    // surface as diagnostics below.
                    table.finish();
                    skip_row(&mut skipped, location, line_no, &e.to_string());
                }
            }
            continue;
        }

        let Some(child_field) = fields.get(1) else {
            skip_row(&mut skipped, location, line_no, "continuation row without child field");
            continue;
        };
        let trimmed = child_field.trim();
        let child_text = trimmed.strip_suffix('>').unwrap_or(trimmed);
        match DescriptorKey::from_dash_notation(child_text) {
            Ok(child) => {
                if let Err(e) = table.append_child(child) {
                    skip_row(&mut skipped, location, line_no, &e.to_string());
                }
            }
            Err(e) => skip_row(&mut skipped, location, line_no, &e.to_string()),
        }
    }

    table.finish();
    Parsed { table, skipped }
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c| c == '|' || c == ';').collect()
}
