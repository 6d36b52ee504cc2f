//! Per-message descriptor resolution.
//!
//! A [`TableLookup`] snapshots everything one message needs: the global
//! WMO tables for its master version, the local tables its provenance
//! routes to, and the precedence mode between them. Descriptors outside
//! the WMO range (`x >= 48` or `y >= 192`) are local by definition and
//! never consult the global tables; inside the range the mode decides
//! which side is asked first.

use std::sync::Arc;

use bufr_model::{CompositeElementTable, DescriptorKey, ElementEntry, SequenceEntry, SequenceTable};

use crate::config::{Mode, Provenance};
use crate::error::TableResult;
use crate::registry::{TableRegistry, Tables};

pub struct TableLookup {
    wmo_element: Arc<CompositeElementTable>,
    wmo_sequence: Arc<SequenceTable>,
    local: Option<Tables>,
    mode: Mode,
}

impl TableLookup {
    /// Build the lookup view for one message. Falls back to
    /// [`Mode::WmoOnly`] when no routing rule matches the provenance.
    pub fn new(registry: &TableRegistry, provenance: &Provenance) -> TableResult<Self> {
        let wmo_element = registry.wmo_element_table(provenance.master_version)?;
        let wmo_sequence = registry.wmo_sequence_table()?;
        let local = registry.local_tables(provenance);
        let mode = local.as_ref().map(|tables| tables.mode).unwrap_or(Mode::WmoOnly);
        Ok(TableLookup { wmo_element, wmo_sequence, local, mode })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn has_local_tables(&self) -> bool {
        self.local.is_some()
    }

    /// Resolve one element descriptor.
    pub fn element(&self, key: DescriptorKey) -> Option<&ElementEntry> {
        if !key.is_wmo_range() {
            return self.local_element(key);
        }
        match self.mode {
            Mode::WmoOnly => self.wmo_element.get(key),
            Mode::WmoLocal => self.wmo_element.get(key).or_else(|| self.local_element(key)),
            Mode::LocalOverride => self.local_element(key).or_else(|| self.wmo_element.get(key)),
        }
    }

    /// Resolve one sequence descriptor.
    pub fn sequence(&self, key: DescriptorKey) -> Option<&SequenceEntry> {
        if !key.is_wmo_range() {
            return self.local_sequence(key);
        }
        match self.mode {
            Mode::WmoOnly => self.wmo_sequence.get(key),
            Mode::WmoLocal => self.wmo_sequence.get(key).or_else(|| self.local_sequence(key)),
            Mode::LocalOverride => self.local_sequence(key).or_else(|| self.wmo_sequence.get(key)),
        }
    }

    fn local_element(&self, key: DescriptorKey) -> Option<&ElementEntry> {
        self.local.as_ref()?.element.as_ref()?.get(key)
    }

    fn local_sequence(&self, key: DescriptorKey) -> Option<&SequenceEntry> {
        self.local.as_ref()?.sequence.as_ref()?.get(key)
    }
}
