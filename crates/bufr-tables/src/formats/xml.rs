//! XML table dialects: the UK Met Office feature catalogue and the WMO
//! machine-readable BUFRCREX tables.
//!
//! Both are streamed with `quick_xml` pull parsing. A structurally broken
//! document is fatal and surfaces as [`TableError::Xml`]; a record missing
//! its descriptor key is skipped with a diagnostic; a bad scale, reference
//! or width never drops a record, each of the three parses independently
//! and falls back to zero with a warning.

use bufr_model::{DescriptorKey, ElementEntry, ElementTable, SequenceTable};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use super::{parse_num, skip_row, LineDiagnostic, Parsed};
use crate::error::{TableError, TableResult};

fn xml_fatal(location: &str, position: usize, e: quick_xml::Error) -> TableError {
    TableError::Xml {
        location: location.to_string(),
        message: format!("position {}: {:?}", position, e),
    }
}

/// Parse a numeric field that must not invalidate its record. Falls back
/// to zero on anything unparseable.
fn lenient_num<T>(text: &str, what: &str, location: &str) -> T
where
    T: std::str::FromStr + Default,
{
    match text.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(location = %location, field = what, text = %text, "unparseable numeric field, using 0");
            T::default()
        }
    }
}

fn feature_key(f: &str, x: &str, y: &str) -> Result<DescriptorKey, String> {
    let f: u32 = parse_num(f, "F")?;
    let x: u32 = parse_num(x, "X")?;
    let y: u32 = parse_num(y, "Y")?;
    DescriptorKey::new(f, x, y).map_err(|e| e.to_string())
}

// ============================================================================
// UK Met feature catalogue
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum UkmetLeaf {
    None,
    Name,
    F,
    X,
    Y,
    Units,
    Scale,
    Reference,
    Width,
    Child,
}

fn ukmet_leaf(tag: &[u8]) -> UkmetLeaf {
    match tag {
        b"documentation" => UkmetLeaf::Name,
        b"F" => UkmetLeaf::F,
        b"X" => UkmetLeaf::X,
        b"Y" => UkmetLeaf::Y,
        b"BUFR_units" => UkmetLeaf::Units,
        b"BUFR_scale" => UkmetLeaf::Scale,
        b"BUFR_reference" => UkmetLeaf::Reference,
        b"BUFR_width" => UkmetLeaf::Width,
        b"child" => UkmetLeaf::Child,
        _ => UkmetLeaf::None,
    }
}

#[derive(Default)]
struct UkmetRecord {
    name: String,
    f: String,
    x: String,
    y: String,
    units: String,
    scale: String,
    reference: String,
    width: String,
    child: String,
    children: Vec<String>,
}

impl UkmetRecord {
    fn field_mut(&mut self, leaf: UkmetLeaf) -> Option<&mut String> {
        match leaf {
            UkmetLeaf::None => None,
            UkmetLeaf::Name => Some(&mut self.name),
            UkmetLeaf::F => Some(&mut self.f),
            UkmetLeaf::X => Some(&mut self.x),
            UkmetLeaf::Y => Some(&mut self.y),
            UkmetLeaf::Units => Some(&mut self.units),
            UkmetLeaf::Scale => Some(&mut self.scale),
            UkmetLeaf::Reference => Some(&mut self.reference),
            UkmetLeaf::Width => Some(&mut self.width),
            UkmetLeaf::Child => Some(&mut self.child),
        }
    }
}

/// Table B from a `featureCatalogue` document: one `feature` element per
/// entry, numerics nested under its `BUFR` block.
pub fn read_ukmet_element_table(
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<ElementTable>> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut record: Option<UkmetRecord> = None;
    let mut leaf = UkmetLeaf::None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"feature" => {
                    record = Some(UkmetRecord::default());
                    leaf = UkmetLeaf::None;
                }
                tag if record.is_some() => leaf = ukmet_leaf(tag),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(field) = record.as_mut().and_then(|r| r.field_mut(leaf)) {
                    let position = reader.buffer_position();
                    field.push_str(&t.unescape().map_err(|e| xml_fatal(location, position, e))?);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"feature" => {
                    if let Some(rec) = record.take() {
                        let position = reader.buffer_position();
                        commit_ukmet_element(rec, location, position, &mut table, &mut skipped);
                    }
                }
                _ => leaf = UkmetLeaf::None,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_fatal(location, reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(Parsed { table, skipped })
}

fn commit_ukmet_element(
    rec: UkmetRecord,
    location: &str,
    position: usize,
    table: &mut ElementTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    let key = match feature_key(&rec.f, &rec.x, &rec.y) {
        Ok(key) => key,
        Err(reason) => {
            skip_row(skipped, location, position, &reason);
            return;
        }
    };
    let entry = ElementEntry {
        key,
        name: rec.name,
        units: rec.units,
        scale: lenient_num(&rec.scale, "scale", location),
        reference: lenient_num(&rec.reference, "reference", location),
        width: lenient_num(&rec.width, "width", location),
    };
    if let Some(prev) = table.insert(entry) {
        debug!(location = %location, key = %prev.key, "duplicate element definition, keeping later one");
    }
}

/// Table D from the catalogue's `sequence` elements. Children are 6-digit
/// combined FXY text nodes.
pub fn read_ukmet_sequence_table(
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<SequenceTable>> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut record: Option<UkmetRecord> = None;
    let mut leaf = UkmetLeaf::None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"sequence" => {
                    record = Some(UkmetRecord::default());
                    leaf = UkmetLeaf::None;
                }
                tag if record.is_some() => leaf = ukmet_leaf(tag),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(field) = record.as_mut().and_then(|r| r.field_mut(leaf)) {
                    let position = reader.buffer_position();
                    field.push_str(&t.unescape().map_err(|e| xml_fatal(location, position, e))?);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"sequence" => {
                    if let Some(rec) = record.take() {
                        let position = reader.buffer_position();
                        commit_ukmet_sequence(rec, location, position, &mut table, &mut skipped);
                    }
                }
                b"child" => {
                    if let Some(rec) = record.as_mut() {
                        rec.children.push(std::mem::take(&mut rec.child));
                    }
                    leaf = UkmetLeaf::None;
                }
                _ => leaf = UkmetLeaf::None,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_fatal(location, reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    table.finish();
    Ok(Parsed { table, skipped })
}

fn commit_ukmet_sequence(
    rec: UkmetRecord,
    location: &str,
    position: usize,
    table: &mut SequenceTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    let key = match feature_key(&rec.f, &rec.x, &rec.y) {
        Ok(key) => key,
        Err(reason) => {
            skip_row(skipped, location, position, &reason);
            return;
        }
    };
    table.begin_sequence(key, rec.name);
    for text in &rec.children {
        match DescriptorKey::from_combined_digits(text.trim()) {
            Ok(child) => {
                if let Err(e) = table.append_child(child) {
                    skip_row(skipped, location, position, &e.to_string());
                }
            }
            Err(e) => skip_row(skipped, location, position, &e.to_string()),
        }
    }
}

// ============================================================================
// WMO machine-readable tables
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum WmoLeaf {
    None,
    Fxy,
    Name,
    Unit,
    Scale,
    Reference,
    Width,
    Fxy1,
    Title,
    Fxy2,
}

fn wmo_element_leaf(tag: &[u8]) -> WmoLeaf {
    match tag {
        b"FXY" => WmoLeaf::Fxy,
        b"ElementName_en" => WmoLeaf::Name,
        b"BUFR_Unit" => WmoLeaf::Unit,
        b"BUFR_Scale" => WmoLeaf::Scale,
        b"BUFR_ReferenceValue" => WmoLeaf::Reference,
        b"BUFR_DataWidth_Bits" => WmoLeaf::Width,
        _ => WmoLeaf::None,
    }
}

fn wmo_sequence_leaf(tag: &[u8]) -> WmoLeaf {
    match tag {
        b"FXY1" => WmoLeaf::Fxy1,
        b"Title_en" => WmoLeaf::Title,
        b"FXY2" => WmoLeaf::Fxy2,
        _ => WmoLeaf::None,
    }
}

#[derive(Default)]
struct WmoRecord {
    fxy: String,
    name: String,
    unit: String,
    scale: String,
    reference: String,
    width: String,
    fxy1: String,
    title: String,
    fxy2: String,
}

impl WmoRecord {
    fn field_mut(&mut self, leaf: WmoLeaf) -> Option<&mut String> {
        match leaf {
            WmoLeaf::None => None,
            WmoLeaf::Fxy => Some(&mut self.fxy),
            WmoLeaf::Name => Some(&mut self.name),
            WmoLeaf::Unit => Some(&mut self.unit),
            WmoLeaf::Scale => Some(&mut self.scale),
            WmoLeaf::Reference => Some(&mut self.reference),
            WmoLeaf::Width => Some(&mut self.width),
            WmoLeaf::Fxy1 => Some(&mut self.fxy1),
            WmoLeaf::Title => Some(&mut self.title),
            WmoLeaf::Fxy2 => Some(&mut self.fxy2),
        }
    }
}

/// Table B from the WMO export. Record element names vary between
/// editions, so any element one level below the root that carries an
/// `FXY` child counts as a record.
pub fn read_wmo_element_table(
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<ElementTable>> {
    let mut table = ElementTable::new(name, location);
    let mut skipped = Vec::new();

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut record: Option<WmoRecord> = None;
    let mut leaf = WmoLeaf::None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match depth {
                    2 => {
                        record = Some(WmoRecord::default());
                        leaf = WmoLeaf::None;
                    }
                    3 => leaf = wmo_element_leaf(e.name().as_ref()),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = record.as_mut().and_then(|r| r.field_mut(leaf)) {
                    let position = reader.buffer_position();
                    field.push_str(&t.unescape().map_err(|e| xml_fatal(location, position, e))?);
                }
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    leaf = WmoLeaf::None;
                }
                if depth == 2 {
                    if let Some(rec) = record.take() {
                        if !rec.fxy.is_empty() {
                            let position = reader.buffer_position();
                            commit_wmo_element(rec, location, position, &mut table, &mut skipped);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_fatal(location, reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(Parsed { table, skipped })
}

fn commit_wmo_element(
    rec: WmoRecord,
    location: &str,
    position: usize,
    table: &mut ElementTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    let key = match DescriptorKey::from_combined_digits(rec.fxy.trim()) {
        Ok(key) => key,
        Err(e) => {
            skip_row(skipped, location, position, &e.to_string());
            return;
        }
    };
    let entry = ElementEntry {
        key,
        name: rec.name,
        units: rec.unit,
        scale: lenient_num(&rec.scale, "scale", location),
        reference: lenient_num(&rec.reference, "reference", location),
        width: lenient_num(&rec.width, "width", location),
    };
    if let Some(prev) = table.insert(entry) {
        debug!(location = %location, key = %prev.key, "duplicate element definition, keeping later one");
    }
}

/// Table D from the WMO export: one record per `(FXY1, FXY2)` pair,
/// grouped into sequences on `FXY1` change, in document order.
pub fn read_wmo_sequence_table(
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<SequenceTable>> {
    let mut table = SequenceTable::new(name, location);
    let mut skipped = Vec::new();

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut record: Option<WmoRecord> = None;
    let mut leaf = WmoLeaf::None;
    let mut current_header: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match depth {
                    2 => {
                        record = Some(WmoRecord::default());
                        leaf = WmoLeaf::None;
                    }
                    3 => leaf = wmo_sequence_leaf(e.name().as_ref()),
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = record.as_mut().and_then(|r| r.field_mut(leaf)) {
                    let position = reader.buffer_position();
                    field.push_str(&t.unescape().map_err(|e| xml_fatal(location, position, e))?);
                }
            }
            Ok(Event::End(_)) => {
                if depth == 3 {
                    leaf = WmoLeaf::None;
                }
                if depth == 2 {
                    if let Some(rec) = record.take() {
                        if !rec.fxy1.is_empty() {
                            let position = reader.buffer_position();
                            commit_wmo_sequence_row(
                                rec,
                                location,
                                position,
                                &mut current_header,
                                &mut table,
                                &mut skipped,
                            );
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_fatal(location, reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    table.finish();
    Ok(Parsed { table, skipped })
}

fn commit_wmo_sequence_row(
    rec: WmoRecord,
    location: &str,
    position: usize,
    current_header: &mut Option<String>,
    table: &mut SequenceTable,
    skipped: &mut Vec<LineDiagnostic>,
) {
    if current_header.as_deref() != Some(rec.fxy1.as_str()) {
        *current_header = Some(rec.fxy1.clone());
        match DescriptorKey::from_combined_digits(rec.fxy1.trim()) {
            Ok(key) => table.begin_sequence(key, rec.title),
            Err(e) => {
                // Children of an unreadable header surface as orphan
                // diagnostics below.
                table.finish();
                skip_row(skipped, location, position, &e.to_string());
            }
        }
    }
    let child_text = rec.fxy2.trim();
    if child_text.is_empty() {
        return;
    }
    match DescriptorKey::from_combined_digits(child_text) {
        Ok(child) => {
            if let Err(e) = table.append_child(child) {
                skip_row(skipped, location, position, &e.to_string());
            }
        }
        Err(e) => skip_row(skipped, location, position, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(f: u32, x: u32, y: u32) -> DescriptorKey {
        DescriptorKey::new(f, x, y).unwrap()
    }

    const UKMET_B: &str = r#"<featureCatalogue>
  <feature>
    <annotation>
      <documentation>Latitude (high accuracy)</documentation>
    </annotation>
    <F>0</F>
    <X>5</X>
    <Y>1</Y>
    <BUFR>
      <BUFR_units>degree</BUFR_units>
      <BUFR_scale>5</BUFR_scale>
      <BUFR_reference>-9000000</BUFR_reference>
      <BUFR_width>25</BUFR_width>
    </BUFR>
  </feature>
  <feature>
    <annotation>
      <documentation>Temperature/air temperature</documentation>
    </annotation>
    <F>0</F>
    <X>12</X>
    <Y>101</Y>
    <BUFR>
      <BUFR_units>K</BUFR_units>
      <BUFR_scale>n/a</BUFR_scale>
      <BUFR_reference>0</BUFR_reference>
      <BUFR_width>16</BUFR_width>
    </BUFR>
  </feature>
</featureCatalogue>
"#;

    #[test]
    fn test_ukmet_element_fields() {
        let parsed = read_ukmet_element_table("ukmet", "memory", UKMET_B).unwrap();
        assert!(parsed.skipped.is_empty());

        let lat = parsed.table.get(key(0, 5, 1)).unwrap();
        assert_eq!(lat.name, "Latitude (high accuracy)");
        assert_eq!(lat.units, "degree");
        assert_eq!(lat.scale, 5);
        assert_eq!(lat.reference, -9_000_000);
        assert_eq!(lat.width, 25);
    }

    #[test]
    fn test_ukmet_bad_numeric_defaults_to_zero() {
        let parsed = read_ukmet_element_table("ukmet", "memory", UKMET_B).unwrap();
        // "n/a" scale must not drop the record.
        assert!(parsed.skipped.is_empty());
        let temp = parsed.table.get(key(0, 12, 101)).unwrap();
        assert_eq!(temp.scale, 0);
        assert_eq!(temp.width, 16);
    }

    #[test]
    fn test_ukmet_record_without_key_skipped() {
        let text = r#"<featureCatalogue>
  <feature>
    <F>0</F>
    <X>5</X>
  </feature>
  <feature>
    <F>0</F><X>5</X><Y>2</Y>
    <BUFR><BUFR_units>degree</BUFR_units><BUFR_scale>2</BUFR_scale><BUFR_reference>-9000</BUFR_reference><BUFR_width>15</BUFR_width></BUFR>
  </feature>
</featureCatalogue>
"#;
        let parsed = read_ukmet_element_table("ukmet", "memory", text).unwrap();
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.table.len(), 1);
        assert!(parsed.table.get(key(0, 5, 2)).is_some());
    }

    #[test]
    fn test_ukmet_sequences_and_bad_child() {
        let text = r#"<featureCatalogue>
  <sequence>
    <annotation><documentation>Position</documentation></annotation>
    <F>3</F><X>1</X><Y>23</Y>
    <child>005002</child>
    <child>006002</child>
  </sequence>
  <sequence>
    <F>3</F><X>1</X><Y>25</Y>
    <child>30x001</child>
    <child>301012</child>
  </sequence>
</featureCatalogue>
"#;
        let parsed = read_ukmet_sequence_table("ukmet", "memory", text).unwrap();
        assert_eq!(parsed.skipped.len(), 1);

        let position = parsed.table.get(key(3, 1, 23)).unwrap();
        assert_eq!(position.name, "Position");
        assert_eq!(position.children(), &[key(0, 5, 2), key(0, 6, 2)]);

        let partial = parsed.table.get(key(3, 1, 25)).unwrap();
        assert_eq!(partial.children(), &[key(3, 1, 12)]);
    }

    #[test]
    fn test_wmo_element_records_by_fxy_presence() {
        let text = r#"<Exp_BUFRCREX_TableB_E>
  <Title>BUFR/CREX Table B</Title>
  <Exp_BUFRCREX_TableB_E>
    <No>1</No>
    <FXY>012101</FXY>
    <ElementName_en>Temperature &amp; dry-bulb temperature</ElementName_en>
    <BUFR_Unit>K</BUFR_Unit>
    <BUFR_Scale>2</BUFR_Scale>
    <BUFR_ReferenceValue>0</BUFR_ReferenceValue>
    <BUFR_DataWidth_Bits>16</BUFR_DataWidth_Bits>
  </Exp_BUFRCREX_TableB_E>
  <Exp_BUFRCREX_TableB_E>
    <No>2</No>
    <FXY>005001</FXY>
    <ElementName_en>Latitude (high accuracy)</ElementName_en>
    <BUFR_Unit>deg</BUFR_Unit>
    <BUFR_Scale>5</BUFR_Scale>
    <BUFR_ReferenceValue>-9000000</BUFR_ReferenceValue>
    <BUFR_DataWidth_Bits>25</BUFR_DataWidth_Bits>
  </Exp_BUFRCREX_TableB_E>
</Exp_BUFRCREX_TableB_E>
"#;
        let parsed = read_wmo_element_table("wmo", "memory", text).unwrap();
        assert!(parsed.skipped.is_empty());
        // The Title element has no FXY child and is not a record.
        assert_eq!(parsed.table.len(), 2);

        let temp = parsed.table.get(key(0, 12, 101)).unwrap();
        assert_eq!(temp.name, "Temperature & dry-bulb temperature");
        assert_eq!(temp.scale, 2);
    }

    #[test]
    fn test_wmo_sequence_rows_group_on_header_change() {
        let text = r#"<Exp_BUFRCREX_TableD_E>
  <Exp_BUFRCREX_TableD_E>
    <FXY1>301001</FXY1>
    <Title_en>WMO block and station numbers</Title_en>
    <FXY2>001001</FXY2>
  </Exp_BUFRCREX_TableD_E>
  <Exp_BUFRCREX_TableD_E>
    <FXY1>301001</FXY1>
    <FXY2>001002</FXY2>
  </Exp_BUFRCREX_TableD_E>
  <Exp_BUFRCREX_TableD_E>
    <FXY1>301011</FXY1>
    <Title_en>Year, month, day</Title_en>
    <FXY2>004001</FXY2>
  </Exp_BUFRCREX_TableD_E>
</Exp_BUFRCREX_TableD_E>
"#;
        let parsed = read_wmo_sequence_table("wmo", "memory", text).unwrap();
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.table.len(), 2);

        let station = parsed.table.get(key(3, 1, 1)).unwrap();
        assert_eq!(station.name, "WMO block and station numbers");
        assert_eq!(station.children(), &[key(0, 1, 1), key(0, 1, 2)]);

        let date = parsed.table.get(key(3, 1, 11)).unwrap();
        assert_eq!(date.children(), &[key(0, 4, 1)]);
    }

    #[test]
    fn test_broken_document_is_fatal() {
        let err = read_wmo_element_table("wmo", "memory", "<a><b></a>").unwrap_err();
        assert!(matches!(err, TableError::Xml { .. }));
    }
}
