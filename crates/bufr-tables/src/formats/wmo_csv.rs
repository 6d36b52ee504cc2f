//! WMO CSV tables.
//!
//! The layout WMO distributes Table B and Table D in: comma-separated rows,
//! one header line, descriptor keys as zero-padded combined decimals. Quoted
//! fields may themselves contain commas; those are blanked out before the
//! split, so a name like `"Year, month, day"` survives as one field (minus
//! its commas).

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use tracing::debug;

use super::{parse_num, skip_row, Parsed};

/// Parse a WMO CSV Table B: `class,FXY,name,units,scale,reference,width`.
pub fn read_element_table(name: &str, location: &str, text: &str) -> Parsed<ElementTable> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();
    let mut header = true;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        if header {
            header = false;
            continue;
        }
        let line = neutralize_quoted_commas(raw);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 7 {
            skip_row(&mut skipped, location, line_no, "expected at least 7 fields");
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
    let _class: u32 = parse_num(fields[0], "class")?;
    let xy: u32 = parse_num(fields[1], "FXY")?;
    let (x, y) = DescriptorKey::split_combined(xy);
    let key = DescriptorKey::new(0, x, y).map_err(|e| e.to_string())?;
    Ok(ElementEntry {
        key,
        name: strip_quotes(fields[2]),
        units: fields[3].trim().to_string(),
        scale: parse_num(fields[4], "scale")?,
        reference: parse_num(fields[5], "reference")?,
        width: parse_num(fields[6], "width")?,
    })
}

/// Parse a WMO CSV Table D: `sno,category,FXY1,title,FXY2[,child name]`.
///
/// Rows for one sequence share its FXY1 value; the group ends when FXY1
/// changes. A row with an empty FXY2 contributes no child.
pub fn read_sequence_table(name: &str, location: &str, text: &str) -> Parsed<SequenceTable> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();
    let mut header = true;
    let mut current_seq: Option<u32> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() || raw.starts_with('#') {
            continue;
        }
        if header {
            header = false;
            continue;
        }
        let line = neutralize_quoted_commas(raw);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 5 {
            skip_row(&mut skipped, location, line_no, "expected at least 5 fields");
            continue;
        }
        let (seq_fxy, seq_name, child_field) = match parse_sequence_row(&fields) {
            Ok(row) => row,
            Err(reason) => {
                skip_row(&mut skipped, location, line_no, &reason);
                continue;
            }
        };

        if current_seq != Some(seq_fxy) {
            current_seq = Some(seq_fxy);
            match DescriptorKey::from_combined(seq_fxy) {
                Ok(key) => table.begin_sequence(key, seq_name),
                Err(e) => {
                    // Close out the previous sequence; the orphaned child
                    // rows of this one surface as diagnostics below.
                    table.finish();
                    skip_row(
                        &mut skipped,
                        location,
                        line_no,
                        &format!("bad sequence FXY {}: {}", seq_fxy, e),
                    );
                    continue;
                }
            }
        }

        let child_text = child_field.trim();
        if child_text.is_empty() {
            continue;
        }
        let child = parse_num::<u32>(child_text, "child FXY")
            .and_then(|v| DescriptorKey::from_combined(v).map_err(|e| e.to_string()));
        match child {
            Ok(key) => {
                if let Err(e) = table.append_child(key) {
                    skip_row(&mut skipped, location, line_no, &e.to_string());
                }
            }
            Err(reason) => skip_row(&mut skipped, location, line_no, &reason),
        }
    }

    table.finish();
    Parsed { table, skipped }
}

fn parse_sequence_row<'a>(fields: &[&'a str]) -> Result<(u32, String, &'a str), String> {
    let _sno: u32 = parse_num(fields[0], "row number")?;
    let _category: u32 = parse_num(fields[1], "category")?;
    let seq_fxy: u32 = parse_num(fields[2], "sequence FXY")?;
    Ok((seq_fxy, strip_quotes(fields[3]), fields[4]))
}

/// Blank out commas inside double-quoted spans so a plain comma split works.
fn neutralize_quoted_commas(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            ',' if in_quotes => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

fn strip_quotes(field: &str) -> String {
    field.replace('"', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_B: &str = "\
# trimmed for tests
Class,FXY,ElementName,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits
05,005001,\"Latitude (high accuracy)\",deg,5,-9000000,25
12,012101,\"Temperature/air temperature\",K,2,0,16
";

    fn key(f: u32, x: u32, y: u32) -> DescriptorKey {
        DescriptorKey::new(f, x, y).unwrap()
    }

    #[test]
    fn test_element_table_parses_rows() {
        let parsed = read_element_table("wmo-b", "memory", TABLE_B);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 2);

        let lat = parsed.table.get(key(0, 5, 1)).unwrap();
        assert_eq!(lat.name, "Latitude (high accuracy)");
        assert_eq!(lat.units, "deg");
        assert_eq!(lat.scale, 5);
        assert_eq!(lat.reference, -9_000_000);
        assert_eq!(lat.width, 25);
    }

    #[test]
    fn test_malformed_row_skipped_not_fatal() {
        let text = "\
Class,FXY,ElementName,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits
05,005001,Latitude,deg,5,-9000000,25
this row has,too few fields
12,012101,Temperature,K,not-a-number,0,16
";
        let parsed = read_element_table("wmo-b", "memory", text);
        assert_eq!(parsed.table.len(), 1);
        assert!(parsed.table.get(key(0, 5, 1)).is_some());
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.skipped[0].line, 3);
    }

    #[test]
    fn test_quoted_commas_neutralized() {
        assert_eq!(neutralize_quoted_commas("a,\"b,c\",d"), "a,\"b c\",d");
        assert_eq!(neutralize_quoted_commas("\"x,y\",\"z,w\""), "\"x y\",\"z w\"");

        let text = "\
Class,FXY,ElementName,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits
12,012001,\"Temperature, dry-bulb\",K,1,0,12
";
        let parsed = read_element_table("wmo-b", "memory", text);
        let entry = parsed.table.get(key(0, 12, 1)).unwrap();
        assert_eq!(entry.name, "Temperature  dry-bulb");
        assert_eq!(entry.width, 12);
    }

    #[test]
    fn test_duplicate_key_last_row_wins() {
        let text = "\
Class,FXY,ElementName,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits
11,011002,\"Wind speed (old)\",m/s,0,0,10
11,011002,\"Wind speed\",m/s,1,0,12
";
        let parsed = read_element_table("wmo-b", "memory", text);
        assert_eq!(parsed.table.len(), 1);
        assert_eq!(parsed.table.get(key(0, 11, 2)).unwrap().name, "Wind speed");
    }

    #[test]
    fn test_sequence_groups_by_fxy1() {
        let text = "\
SNo,Category,FXY1,Title_en,FXY2,ElementName_en
1,01,301001,\"WMO block and station numbers\",001001,
2,01,301001,,001002,
3,01,301011,\"Year, month, day\",004001,Year
4,01,301011,,004002,Month
5,01,301011,,004003,Day
";
        let parsed = read_sequence_table("wmo-d", "memory", text);
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 2);

        let blocks = parsed.table.get(key(3, 1, 1)).unwrap();
        assert_eq!(blocks.children(), &[key(0, 1, 1), key(0, 1, 2)]);

        let date = parsed.table.get(key(3, 1, 11)).unwrap();
        assert_eq!(date.name, "Year  month  day");
        assert_eq!(date.children(), &[key(0, 4, 1), key(0, 4, 2), key(0, 4, 3)]);
    }

    #[test]
    fn test_sequence_header_row_with_empty_child() {
        let text = "\
SNo,Category,FXY1,Title_en,FXY2,ElementName_en
1,01,301001,\"WMO block and station numbers\",,
2,01,301001,,001001,
";
        let parsed = read_sequence_table("wmo-d", "memory", text);
        let seq = parsed.table.get(key(3, 1, 1)).unwrap();
        assert_eq!(seq.children(), &[key(0, 1, 1)]);
    }
}
