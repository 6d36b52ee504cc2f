//! Routing rules that map message provenance to table locations.
//!
//! Rule sources are comma-separated rows of
//! `center,subcenter,master,local,cat,tableBname,tableBformat,tableDname,tableDformat[,mode]`
//! with `#` comments. A `-1` in a match field is a wildcard. Resolution is
//! first match in declaration order: broader rules earlier in the list
//! shadow narrower ones later, so source order is part of the contract.

use tracing::warn;

use crate::formats::{parse_num, skip_row, LineDiagnostic, TableFormat};

/// Precedence policy between the global WMO tables and a center's local
/// tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// Only the global tables are consulted.
    WmoOnly,
    /// Global tables first, local tables fill the misses.
    #[default]
    WmoLocal,
    /// Local tables first, global tables fill the misses.
    LocalOverride,
}

impl Mode {
    /// Parse the mode column. `localWmo` selects [`Mode::LocalOverride`];
    /// anything else, including an absent column, is [`Mode::WmoLocal`].
    pub fn parse(text: &str) -> Mode {
        if text.trim().eq_ignore_ascii_case("localwmo") {
            Mode::LocalOverride
        } else {
            Mode::WmoLocal
        }
    }
}

/// The message-header fields a routing rule matches against. `-1` means
/// the header did not carry the field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub center: i32,
    pub subcenter: i32,
    pub master_version: i32,
    pub local_version: i32,
    pub category: i32,
}

impl Provenance {
    pub fn new(
        center: i32,
        subcenter: i32,
        master_version: i32,
        local_version: i32,
        category: i32,
    ) -> Self {
        Provenance { center, subcenter, master_version, local_version, category }
    }
}

/// One table reference inside a rule: where to read it and which dialect
/// it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub location: String,
    pub format: TableFormat,
}

/// One row of the routing configuration.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub center: i32,
    pub subcenter: i32,
    pub master_version: i32,
    pub local_version: i32,
    pub category: i32,
    pub table_b: Option<TableSpec>,
    pub table_d: Option<TableSpec>,
    pub mode: Mode,
}

impl RoutingRule {
    /// A field matches when either side is a `-1` wildcard or both concrete
    /// values agree.
    pub fn matches(&self, provenance: &Provenance) -> bool {
        field_matches(self.center, provenance.center)
            && field_matches(self.subcenter, provenance.subcenter)
            && field_matches(self.master_version, provenance.master_version)
            && field_matches(self.local_version, provenance.local_version)
            && field_matches(self.category, provenance.category)
    }
}

fn field_matches(rule: i32, query: i32) -> bool {
    rule < 0 || query < 0 || rule == query
}

/// First rule in list order that matches, or `None`.
pub fn resolve<'a>(rules: &'a [RoutingRule], provenance: &Provenance) -> Option<&'a RoutingRule> {
    rules.iter().find(|rule| rule.matches(provenance))
}

/// Parse one rule source. Bad rows are dropped with a diagnostic, never
/// fatal.
pub(crate) fn parse_rules(location: &str, text: &str) -> (Vec<RoutingRule>, Vec<LineDiagnostic>) {
    let mut rules = Vec::new();
    let mut skipped = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 8 {
            skip_row(&mut skipped, location, line_no, "routing rule needs at least 8 fields");
            continue;
        }
        match parse_match_fields(&fields) {
            Ok([center, subcenter, master_version, local_version, category]) => {
                let table_b = table_spec(fields[5], fields[6], location, line_no);
                let table_d =
                    table_spec(fields[7], fields.get(8).copied().unwrap_or(""), location, line_no);
                let mode = fields.get(9).copied().map(Mode::parse).unwrap_or_default();
                rules.push(RoutingRule {
                    center,
                    subcenter,
                    master_version,
                    local_version,
                    category,
                    table_b,
                    table_d,
                    mode,
                });
            }
            Err(reason) => skip_row(&mut skipped, location, line_no, &reason),
        }
    }

    (rules, skipped)
}

fn parse_match_fields(fields: &[&str]) -> Result<[i32; 5], String> {
    Ok([
        parse_num(fields[0], "center")?,
        parse_num(fields[1], "subcenter")?,
        parse_num(fields[2], "master version")?,
        parse_num(fields[3], "local version")?,
        parse_num(fields[4], "category")?,
    ])
}

/// An empty location means the rule carries no table on that side. An
/// unknown format tag drops the side too, so the rule still routes
/// whatever remains readable.
fn table_spec(name: &str, format_tag: &str, location: &str, line: usize) -> Option<TableSpec> {
    if name.is_empty() {
        return None;
    }
    match TableFormat::parse(format_tag) {
        Some(format) => Some(TableSpec { location: name.to_string(), format }),
        None => {
            warn!(location = %location, line = line, format = %format_tag, "unknown table format, dropping this table reference");
            None
        }
    }
}
