//! NCEP combined mnemonic tables (`bufrtab` files).
//!
//! One boxed ASCII stream defines both tables. Three sections, each opened
//! by a header row naming its columns: `MNEMONIC | NUMBER` binds mnemonics
//! to descriptor keys, `MNEMONIC | SEQUENCE` lists sequence children as
//! mnemonic tokens (a mnemonic repeated on later rows keeps extending the
//! same sequence), and `MNEMONIC | SCAL | REFERENCE | BIT | UNITS` carries
//! element numerics. Nothing is a complete definition until the sections
//! are cross-referenced, so parsing scans everything first and materializes
//! tables at the end.
//!
//! Sequence tokens understand the NCEP replication shorthand: `{M}` expands
//! to delayed replication (`1-01-000`, `0-31-001`, M), `<M>` to short
//! delayed replication (`1-01-000`, `0-31-000`, M), and `"M"N` to fixed
//! replication (`1-01-00N`, M). Tokens starting with `.` are the
//! following-value convention and are not representable as table entries.

use std::collections::HashMap;

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use tracing::debug;

use super::{parse_num, skip_row, LineDiagnostic};

/// Both tables parsed from one mnemonic stream, sharing one diagnostics
/// list.
#[derive(Debug)]
pub struct MnemonicTables {
    pub element: ElementTable,
    pub sequence: SequenceTable,
    pub skipped: Vec<LineDiagnostic>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Section {
    None,
    Bindings,
    Sequences,
    Elements,
}

struct ElementSpec {
    scale: i32,
    reference: i64,
    width: u16,
    units: String,
}

struct SequenceAccum {
    mnemonic: String,
    line: usize,
    tokens: Vec<String>,
}

#[derive(Default)]
struct Scan {
    // Bindings kept in file order so materialization diagnostics are stable.
    bindings: Vec<(String, DescriptorKey, usize)>,
    by_name: HashMap<String, DescriptorKey>,
    descriptions: HashMap<String, String>,
    specs: HashMap<String, ElementSpec>,
    sequences: Vec<SequenceAccum>,
}

/// Parse a combined mnemonic stream into both tables.
pub fn read_tables(name: &str, location: &str, text: &str) -> MnemonicTables {
    let mut skipped = Vec::new();
    let scan = scan_sections(location, text, &mut skipped);

    let mut element = ElementTable::new(name, location);
    let mut sequence = SequenceTable::new(name, location);
    materialize_elements(&scan, location, &mut element, &mut skipped);
    materialize_sequences(&scan, location, &mut sequence, &mut skipped);

    MnemonicTables { element, sequence, skipped }
}

fn scan_sections(location: &str, text: &str, skipped: &mut Vec<LineDiagnostic>) -> Scan {
    let mut scan = Scan::default();
    let mut section = Section::None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("END") {
            break;
        }
        if line.contains("MNEMONIC") {
            if line.contains("NUMBER") {
                section = Section::Bindings;
                continue;
            }
            if line.contains("SEQUENCE") {
                section = Section::Sequences;
                continue;
            }
            if line.contains("SCAL") {
                section = Section::Elements;
                continue;
            }
        }
        let Some(fields) = data_fields(line) else {
            continue;
        };
        match section {
            Section::None => {}
            Section::Bindings => scan_binding(&mut scan, &fields, location, line_no, skipped),
            Section::Sequences => scan_sequence(&mut scan, &fields, line_no),
            Section::Elements => scan_element(&mut scan, &fields, location, line_no, skipped),
        }
    }

    scan
}

/// Split a boxed `| a | b | c |` row into trimmed cells, rejecting ruling
/// and spacer rows.
fn data_fields(line: &str) -> Option<Vec<&str>> {
    let rest = line.strip_prefix('|')?;
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    let first = fields.first().copied().unwrap_or("");
    if first.is_empty() || first.chars().all(|c| c == '-') {
        return None;
    }
    Some(fields)
}

fn scan_binding(
    scan: &mut Scan,
    fields: &[&str],
    location: &str,
    line_no: usize,
    skipped: &mut Vec<LineDiagnostic>,
) {
    if fields.len() < 2 {
        skip_row(skipped, location, line_no, "binding row needs mnemonic and number");
        return;
    }
    let mnemonic = fields[0];
    let number = fields[1];
    if number.starts_with('A') {
        // Table A identifiers live in the same section; they are not
        // descriptors.
        return;
    }
    match DescriptorKey::from_combined_digits(number) {
        Ok(key) => {
            if let Some(slot) = scan.bindings.iter_mut().find(|(m, _, _)| m == mnemonic) {
                slot.1 = key;
                slot.2 = line_no;
            } else {
                scan.bindings.push((mnemonic.to_string(), key, line_no));
            }
            scan.by_name.insert(mnemonic.to_string(), key);
            if let Some(description) = fields.get(2) {
                if !description.is_empty() {
                    scan.descriptions.insert(mnemonic.to_string(), (*description).to_string());
                }
            }
        }
        Err(e) => skip_row(skipped, location, line_no, &e.to_string()),
    }
}

fn scan_sequence(scan: &mut Scan, fields: &[&str], line_no: usize) {
    let mnemonic = fields[0];
    let tokens = fields.get(1).copied().unwrap_or("");
    let tokens = tokens.split_whitespace().map(str::to_string);
    if let Some(accum) = scan.sequences.iter_mut().find(|a| a.mnemonic == mnemonic) {
        accum.tokens.extend(tokens);
    } else {
        scan.sequences.push(SequenceAccum {
            mnemonic: mnemonic.to_string(),
            line: line_no,
            tokens: tokens.collect(),
        });
    }
}

fn scan_element(
    scan: &mut Scan,
    fields: &[&str],
    location: &str,
    line_no: usize,
    skipped: &mut Vec<LineDiagnostic>,
) {
    if fields.len() < 5 {
        skip_row(skipped, location, line_no, "element row needs scale, reference, width, units");
        return;
    }
    match parse_element_spec(fields) {
        Ok(spec) => {
            scan.specs.insert(fields[0].to_string(), spec);
        }
        Err(reason) => skip_row(skipped, location, line_no, &reason),
    }
}

fn parse_element_spec(fields: &[&str]) -> Result<ElementSpec, String> {
    Ok(ElementSpec {
        scale: parse_num(fields[1], "scale")?,
        reference: parse_num(fields[2], "reference")?,
        width: parse_num(fields[3], "width")?,
        units: fields[4].to_string(),
    })
}

fn materialize_elements(
    scan: &Scan,
    location: &str,
    table: &mut ElementTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    for (mnemonic, key, line) in &scan.bindings {
        if !key.is_element() {
            continue;
        }
        let Some(spec) = scan.specs.get(mnemonic) else {
            skip_row(skipped, location, *line, &format!("no element spec for mnemonic {}", mnemonic));
            continue;
        };
        let entry = ElementEntry {
            key: *key,
            name: scan.descriptions.get(mnemonic).cloned().unwrap_or_default(),
            units: spec.units.clone(),
            scale: spec.scale,
            reference: spec.reference,
            width: spec.width,
        };
        if let Some(prev) = table.insert(entry) {
            debug!(location = %location, key = %prev.key, "duplicate element definition, keeping later binding");
        }
    }
}

fn materialize_sequences(
    scan: &Scan,
    location: &str,
    table: &mut SequenceTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    for accum in &scan.sequences {
        let Some(key) = scan.by_name.get(&accum.mnemonic) else {
            skip_row(
                skipped,
                location,
                accum.line,
                &format!("sequence for unbound mnemonic {}", accum.mnemonic),
            );
            continue;
        };
        if !key.is_sequence() {
            skip_row(
                skipped,
                location,
                accum.line,
                &format!("mnemonic {} is bound to {}, not a sequence key", accum.mnemonic, key),
            );
            continue;
        }
        let name = scan.descriptions.get(&accum.mnemonic).cloned().unwrap_or_default();
        table.begin_sequence(*key, name);
        for token in &accum.tokens {
            match resolve_token(token, &scan.by_name) {
                Ok(children) => {
                    for child in children {
                        if let Err(e) = table.append_child(child) {
                            skip_row(skipped, location, accum.line, &e.to_string());
                        }
                    }
                }
                Err(reason) => skip_row(skipped, location, accum.line, &reason),
            }
        }
    }
    table.finish();
}

// Replication descriptors spelled out by the shorthand below.
const DELAYED_REPLICATION: (u32, u32, u32) = (1, 1, 0);
const DELAYED_FACTOR: (u32, u32, u32) = (0, 31, 1);
const SHORT_DELAYED_FACTOR: (u32, u32, u32) = (0, 31, 0);

/// Expand one sequence token into the descriptors it stands for.
fn resolve_token(
    token: &str,
    by_name: &HashMap<String, DescriptorKey>,
) -> Result<Vec<DescriptorKey>, String> {
    if let Some(inner) = strip_wrapped(token, '{', '}') {
        let target = resolve_plain(inner, by_name)?;
        return Ok(vec![fixed_key(DELAYED_REPLICATION), fixed_key(DELAYED_FACTOR), target]);
    }
    if let Some(inner) = strip_wrapped(token, '<', '>') {
        let target = resolve_plain(inner, by_name)?;
        return Ok(vec![fixed_key(DELAYED_REPLICATION), fixed_key(SHORT_DELAYED_FACTOR), target]);
    }
    if let Some(rest) = token.strip_prefix('"') {
        let (inner, count_text) = rest
            .split_once('"')
            .ok_or_else(|| format!("unterminated quoted token {}", token))?;
        let count: u32 = parse_num(count_text, "replication count")?;
        let replication = DescriptorKey::new(1, 1, count).map_err(|e| e.to_string())?;
        let target = resolve_plain(inner, by_name)?;
        return Ok(vec![replication, target]);
    }
    if token.starts_with('.') {
        return Err(format!("following-value mnemonic {} has no table entry", token));
    }
    Ok(vec![resolve_plain(token, by_name)?])
}

fn resolve_plain(token: &str, by_name: &HashMap<String, DescriptorKey>) -> Result<DescriptorKey, String> {
    by_name
        .get(token)
        .copied()
        .ok_or_else(|| format!("unknown mnemonic {}", token))
}

fn strip_wrapped(token: &str, open: char, close: char) -> Option<&str> {
    token.strip_prefix(open)?.strip_suffix(close)
}

fn fixed_key((f, x, y): (u32, u32, u32)) -> DescriptorKey {
    // The constants above are all in range.
    DescriptorKey::from_packed(((f as u16) << 14) | ((x as u16) << 8) | y as u16)
}
