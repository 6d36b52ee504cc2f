//! Shared descriptor model for BUFR table handling.
//!
//! This crate holds the FXY descriptor key codec and the canonical in-memory
//! table model (element and sequence tables, plus layered composites). It has
//! no I/O: table construction is driven by the parser crate, decoding by the
//! message reader.

pub mod descriptor;
pub mod entry;
pub mod error;
pub mod table;

pub use descriptor::DescriptorKey;
pub use entry::{ElementEntry, SequenceEntry};
pub use error::{ModelError, ModelResult};
pub use table::{CompositeElementTable, ElementTable, SequenceTable};
