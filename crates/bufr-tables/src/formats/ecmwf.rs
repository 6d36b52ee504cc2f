//! ECMWF fixed-format tables.
//!
//! Table B rows carry their fields at declared column positions; rows too
//! short to fill every column (titles, separators) are passed over without
//! comment, the way hand-formatted ECMWF files expect. Table D interleaves
//! a header line `seq-fxy child-count first-child` with one single-child
//! line per remaining slot; the count includes the first child, and a
//! malformed child line still consumes its slot so the stream stays
//! aligned.

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use tracing::debug;

use super::{parse_num, skip_row, Parsed};

/// Declared Table B columns: FXY, name, units, scale, reference, width.
const TABLE_B_COLUMNS: [(usize, usize); 6] =
    [(0, 8), (8, 72), (72, 97), (97, 102), (102, 115), (115, 120)];

/// Parse an ECMWF fixed-width Table B.
pub fn read_element_table(name: &str, location: &str, text: &str) -> Parsed<ElementTable> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let Some(fields) = scan_columns(raw) else {
            continue;
        };
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

/// Extract every declared column, or `None` when the row is too short to
/// populate them all.
fn scan_columns(line: &str) -> Option<[&str; 6]> {
    let mut fields = [""; 6];
    for (slot, (start, end)) in TABLE_B_COLUMNS.iter().enumerate() {
        let field = line.get(*start..(*end).min(line.len()))?.trim();
        if field.is_empty() {
            return None;
        }
        fields[slot] = field;
    }
    Some(fields)
}

fn parse_element_row(fields: &[&str; 6]) -> Result<ElementEntry, String> {
    let fxy: u32 = parse_num(fields[0], "FXY")?;
    let key = DescriptorKey::from_combined(fxy).map_err(|e| e.to_string())?;
    Ok(ElementEntry {
        key,
        name: fields[1].to_string(),
        units: fields[2].to_string(),
        scale: parse_num(fields[3], "scale")?,
        reference: parse_num(fields[4], "reference")?,
        width: parse_num(fields[5], "width")?,
    })
}

/// Parse an ECMWF Table D.
pub fn read_sequence_table(name: &str, location: &str, text: &str) -> Parsed<SequenceTable> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();
    // Children still owed to the open sequence.
    let mut remaining: u32 = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let mut tokens = raw.split_whitespace();

        if remaining == 0 {
            let (Some(seq_text), Some(count_text), Some(first_text)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                skip_row(&mut skipped, location, line_no, "expected `fxy count first-child` header");
                continue;
            };
            match parse_header(seq_text, count_text, first_text) {
                Ok((key, count, first)) => {
                    table.begin_sequence(key, "");
                    if let Err(e) = table.append_child(first) {
                        skip_row(&mut skipped, location, line_no, &e.to_string());
                    }
                    remaining = count.saturating_sub(1);
                    if remaining == 0 {
                        table.finish();
                    }
                }
                Err(reason) => skip_row(&mut skipped, location, line_no, &reason),
            }
            continue;
        }

        match parse_child(tokens.next().unwrap_or("")) {
            Ok(child) => {
                if let Err(e) = table.append_child(child) {
                    skip_row(&mut skipped, location, line_no, &e.to_string());
                }
            }
            Err(reason) => skip_row(&mut skipped, location, line_no, &reason),
        }
        remaining -= 1;
        if remaining == 0 {
            table.finish();
        }
    }

    table.finish();
    Parsed { table, skipped }
}

fn parse_header(
    seq_text: &str,
    count_text: &str,
    first_text: &str,
) -> Result<(DescriptorKey, u32, DescriptorKey), String> {
    let seq: u32 = parse_num(seq_text, "sequence FXY")?;
    let key = DescriptorKey::from_combined(seq).map_err(|e| e.to_string())?;
    let count: u32 = parse_num(count_text, "child count")?;
    if count == 0 {
        return Err("zero child count".to_string());
    }
    let first = parse_child(first_text)?;
    Ok((key, count, first))
}

fn parse_child(text: &str) -> Result<DescriptorKey, String> {
    let value: u32 = parse_num(text, "child FXY")?;
    DescriptorKey::from_combined(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(f: u32, x: u32, y: u32) -> DescriptorKey {
        DescriptorKey::new(f, x, y).unwrap()
    }

    fn b_line(fxy: &str, name: &str, units: &str, scale: i64, reference: i64, width: u16) -> String {
        format!(
            "{:<8}{:<64}{:<25}{:>5}{:>13}{:>5}",
            fxy, name, units, scale, reference, width
        )
    }

    #[test]
    fn test_element_table_fixed_columns() {
        let text = format!(
            "{}\n{}\n",
            b_line(" 001001", "WMO BLOCK NUMBER", "NUMERIC", 0, 0, 7),
            b_line(" 005001", "LATITUDE (HIGH ACCURACY)", "DEGREE", 5, -9000000, 25),
        );
        let parsed = read_element_table("ecmwf-b", "memory", &text);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 2);

        let lat = parsed.table.get(key(0, 5, 1)).unwrap();
        assert_eq!(lat.name, "LATITUDE (HIGH ACCURACY)");
        assert_eq!(lat.units, "DEGREE");
        assert_eq!(lat.scale, 5);
        assert_eq!(lat.reference, -9_000_000);
        assert_eq!(lat.width, 25);
    }

    #[test]
    fn test_short_rows_passed_over_silently() {
        let text = format!(
            "ECMWF TABLE B\n\n{}\n",
            b_line(" 012101", "TEMPERATURE/DRY-BULB TEMPERATURE", "K", 2, 0, 16),
        );
        let parsed = read_element_table("ecmwf-b", "memory", &text);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 1);
    }

    #[test]
    fn test_bad_numeric_in_full_row_reported() {
        let text = format!("{}\n", b_line(" 012101", "TEMPERATURE", "K", 2, 0, 16))
            .replace("    2", "   xx");
        let parsed = read_element_table("ecmwf-b", "memory", &text);
        assert!(parsed.table.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_sequence_count_includes_first_child() {
        let text = "\
 301001  2 001001
           001002
 301011  3 004001
           004002
           004003
";
        let parsed = read_sequence_table("ecmwf-d", "memory", text);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 2);

        let blocks = parsed.table.get(key(3, 1, 1)).unwrap();
        assert_eq!(blocks.children(), &[key(0, 1, 1), key(0, 1, 2)]);

        let date = parsed.table.get(key(3, 1, 11)).unwrap();
        assert_eq!(date.children(), &[key(0, 4, 1), key(0, 4, 2), key(0, 4, 3)]);
    }

    #[test]
    fn test_single_child_sequence_commits_immediately() {
        let text = " 360001  1 012101\n";
        let parsed = read_sequence_table("ecmwf-d", "memory", text);
        let seq = parsed.table.get(key(3, 60, 1)).unwrap();
        assert_eq!(seq.children(), &[key(0, 12, 101)]);
    }

    #[test]
    fn test_bad_child_line_consumes_its_slot() {
        let text = "\
 301001  3 001001
           junk
           001002
 301011  1 004001
";
        let parsed = read_sequence_table("ecmwf-d", "memory", text);
        assert_eq!(parsed.skipped.len(), 1);
        let blocks = parsed.table.get(key(3, 1, 1)).unwrap();
        assert_eq!(blocks.children(), &[key(0, 1, 1), key(0, 1, 2)]);
        assert!(parsed.table.get(key(3, 1, 11)).is_some());
    }
}
