//! MEL free-form tables.
//!
//! Two sub-dialects share the grammar: `mel-bufr` separates Table B fields
//! with semicolons, the "tabs" variant with tab characters (falling back to
//! semicolons on rows that carry none). Table D is looser still: a header
//! line `F X Y name...` (F must be 3) opens a sequence, each following line
//! contributes the first three integers found anywhere on it as one child,
//! and a leading `-1` commits the sequence. Title prose before the first
//! header is passed over without comment.

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use tracing::debug;

use super::{parse_num, skip_row, Parsed};

/// Field separator for the Table B sub-dialects.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Separator {
    Semicolon,
    Tab,
}

impl Separator {
    fn split(self, line: &str) -> Vec<&str> {
        match self {
            Separator::Semicolon => line.split(';').collect(),
            Separator::Tab => {
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() > 1 {
                    fields
                } else {
                    line.split(';').collect()
                }
            }
        }
    }
}

/// Parse a MEL Table B: `f; x; y; scale; reference; width; units; name`.
pub fn read_element_table(
    name: &str,
    location: &str,
    text: &str,
    separator: Separator,
) -> Parsed<ElementTable> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        let fields = separator.split(raw);
        if fields.len() < 8 {
            skip_row(&mut skipped, location, line_no, "expected at least 8 fields");
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
    let f: u32 = parse_num(fields[0], "F")?;
    let x: u32 = parse_num(fields[1], "X")?;
    let y: u32 = parse_num(fields[2], "Y")?;
    let key = DescriptorKey::new(f, x, y).map_err(|e| e.to_string())?;
    Ok(ElementEntry {
        key,
        name: fields[7].trim().to_string(),
        units: fields[6].trim().to_string(),
        scale: parse_num(fields[3], "scale")?,
        reference: parse_num(fields[4], "reference")?,
        width: parse_num(fields[5], "width")?,
    })
}

/// Parse a MEL Table D with the two-level line scanner.
pub fn read_sequence_table(name: &str, location: &str, text: &str) -> Parsed<SequenceTable> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();
    let mut accumulating = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.first() == Some(&"END") {
            break;
        }

        if !accumulating {
            // Only a `F X Y name...` header means anything here; anything
            // else is leading prose.
            let Some((f, x, y)) = leading_triple(&tokens) else {
                continue;
            };
            if f != 3 {
                skip_row(&mut skipped, location, line_no, "sequence header must have F=3");
                continue;
            }
            match DescriptorKey::new(f, x, y) {
                Ok(key) => {
                    let seq_name = tokens[3..].join(" ");
                    table.begin_sequence(key, strip_parens(&seq_name));
                    accumulating = true;
                }
                Err(e) => skip_row(&mut skipped, location, line_no, &e.to_string()),
            }
            continue;
        }

        if tokens.first().and_then(|t| t.parse::<i64>().ok()) == Some(-1) {
            table.finish();
            accumulating = false;
            continue;
        }
        match child_triple(&tokens) {
            Some(child) => {
                if let Err(e) = table.append_child(child) {
                    skip_row(&mut skipped, location, line_no, &e.to_string());
                }
            }
            None => skip_row(&mut skipped, location, line_no, "expected a child F X Y triple"),
        }
    }

    table.finish();
    Parsed { table, skipped }
}

fn leading_triple(tokens: &[&str]) -> Option<(u32, u32, u32)> {
    if tokens.len() < 3 {
        return None;
    }
    Some((
        tokens[0].parse().ok()?,
        tokens[1].parse().ok()?,
        tokens[2].parse().ok()?,
    ))
}

/// The first three integers found anywhere on the line, as a descriptor.
fn child_triple(tokens: &[&str]) -> Option<DescriptorKey> {
    let mut ints = tokens.iter().filter_map(|t| t.parse::<i64>().ok());
    let f = u32::try_from(ints.next()?).ok()?;
    let x = u32::try_from(ints.next()?).ok()?;
    let y = u32::try_from(ints.next()?).ok()?;
    DescriptorKey::new(f, x, y).ok()
}

fn strip_parens(name: &str) -> String {
    name.replace(['(', ')'], "").trim().to_string()
}
