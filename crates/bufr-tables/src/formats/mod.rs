//! Table format dialects.
//!
//! Seven grammars feed one canonical model. Every parser follows the same
//! contract: records it cannot make sense of are skipped and reported as
//! line diagnostics, never turned into errors, so a hand-maintained table
//! file with a few stray rows still yields the largest possible table. Only
//! an unreadable stream or an unparseable XML document is fatal, and that is
//! decided before or outside the line loop.

pub mod ecmwf;
pub mod mel;
pub mod ncep;
pub mod ncep_mnemonic;
pub mod wmo_csv;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use bufr_model::{ElementTable, SequenceTable};
use tracing::warn;

use crate::error::{TableError, TableResult};

pub use ncep_mnemonic::MnemonicTables;

/// Closed set of supported on-disk table dialects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableFormat {
    WmoCsv,
    Ncep,
    NcepMnemonic,
    Ecmwf,
    Ukmet,
    MelBufr,
    MelTabs,
    WmoXml,
}

impl TableFormat {
    /// Map an on-disk format tag to a dialect. Tags are matched
    /// case-insensitively. This is the only place an unrecognized format
    /// exists as a runtime condition; internal dispatch is exhaustive.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(TableFormat::WmoCsv),
            "ncep" => Some(TableFormat::Ncep),
            "ncep-nm" => Some(TableFormat::NcepMnemonic),
            "ecmwf" => Some(TableFormat::Ecmwf),
            "ukmet" => Some(TableFormat::Ukmet),
            "mel-bufr" => Some(TableFormat::MelBufr),
            "mel-tabs" => Some(TableFormat::MelTabs),
            "wmo-xml" => Some(TableFormat::WmoXml),
            _ => None,
        }
    }

    /// The canonical on-disk tag for this dialect.
    pub fn tag(self) -> &'static str {
        match self {
            TableFormat::WmoCsv => "csv",
            TableFormat::Ncep => "ncep",
            TableFormat::NcepMnemonic => "ncep-nm",
            TableFormat::Ecmwf => "ecmwf",
            TableFormat::Ukmet => "ukmet",
            TableFormat::MelBufr => "mel-bufr",
            TableFormat::MelTabs => "mel-tabs",
            TableFormat::WmoXml => "wmo-xml",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TableFormat {
    type Err = TableError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::parse(tag).ok_or_else(|| TableError::UnknownFormat(tag.trim().to_string()))
    }
}

/// One skipped input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiagnostic {
    /// Line number in line-oriented dialects, byte offset in the XML ones.
    pub line: usize,
    pub message: String,
}

impl LineDiagnostic {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// A parsed table plus the records skipped on the way.
#[derive(Debug)]
pub struct Parsed<T> {
    pub table: T,
    pub skipped: Vec<LineDiagnostic>,
}

/// Record a skipped row, both in the diagnostics list and the log.
pub(crate) fn skip_row(
    skipped: &mut Vec<LineDiagnostic>,
    location: &str,
    line: usize,
    reason: &str,
) {
    warn!(location = %location, line = line, reason = %reason, "skipping malformed table row");
    skipped.push(LineDiagnostic::new(line, reason));
}

/// Parse one numeric field, naming the field on failure.
pub(crate) fn parse_num<T: FromStr>(field: &str, what: &str) -> Result<T, String> {
    let trimmed = field.trim();
    trimmed
        .parse::<T>()
        .map_err(|_| format!("bad {} '{}'", what, trimmed))
}

/// Parse a Table B stream in the given dialect.
///
/// The combined mnemonic dialect defines both tables in one stream; asked
/// for only the element half, the sequence half is parsed and dropped.
pub fn read_element_table(
    format: TableFormat,
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<ElementTable>> {
    match format {
        TableFormat::WmoCsv => Ok(wmo_csv::read_element_table(name, location, text)),
        TableFormat::Ncep => Ok(ncep::read_element_table(name, location, text)),
        TableFormat::Ecmwf => Ok(ecmwf::read_element_table(name, location, text)),
        TableFormat::Ukmet => xml::read_ukmet_element_table(name, location, text),
        TableFormat::WmoXml => xml::read_wmo_element_table(name, location, text),
        TableFormat::MelBufr => {
            Ok(mel::read_element_table(name, location, text, mel::Separator::Semicolon))
        }
        TableFormat::MelTabs => {
            Ok(mel::read_element_table(name, location, text, mel::Separator::Tab))
        }
        TableFormat::NcepMnemonic => {
            let tables = ncep_mnemonic::read_tables(name, location, text);
            Ok(Parsed { table: tables.element, skipped: tables.skipped })
        }
    }
}

/// Parse a Table D stream in the given dialect.
pub fn read_sequence_table(
    format: TableFormat,
    name: &str,
    location: &str,
    text: &str,
) -> TableResult<Parsed<SequenceTable>> {
    match format {
        TableFormat::WmoCsv => Ok(wmo_csv::read_sequence_table(name, location, text)),
        TableFormat::Ncep => Ok(ncep::read_sequence_table(name, location, text)),
        TableFormat::Ecmwf => Ok(ecmwf::read_sequence_table(name, location, text)),
        TableFormat::Ukmet => xml::read_ukmet_sequence_table(name, location, text),
        TableFormat::WmoXml => xml::read_wmo_sequence_table(name, location, text),
        TableFormat::MelBufr | TableFormat::MelTabs => {
            Ok(mel::read_sequence_table(name, location, text))
        }
        TableFormat::NcepMnemonic => {
            let tables = ncep_mnemonic::read_tables(name, location, text);
            Ok(Parsed { table: tables.sequence, skipped: tables.skipped })
        }
    }
}
