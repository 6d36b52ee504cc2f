//! Canonical in-memory tables.
//!
//! An [`ElementTable`] maps descriptor keys to element definitions, a
//! [`SequenceTable`] to ordered child lists. Both keep a `name` (what the
//! table calls itself) and a `location` (where it was read from) so
//! diagnostics can say which source defined a descriptor. Lookups never
//! consider provenance; that is the registry's job.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::DescriptorKey;
use crate::entry::{ElementEntry, SequenceEntry};
use crate::error::{ModelError, ModelResult};

// ============================================================
// Element tables
// ============================================================

/// A single parsed Table B.
#[derive(Debug, Clone)]
pub struct ElementTable {
    pub name: String,
    pub location: String,
    entries: HashMap<DescriptorKey, ElementEntry>,
}

impl ElementTable {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            entries: HashMap::new(),
        }
    }

    /// Insert a definition. A key defined twice keeps the later definition;
    /// the displaced entry is returned so callers can log the collision.
    pub fn insert(&mut self, entry: ElementEntry) -> Option<ElementEntry> {
        self.entries.insert(entry.key, entry)
    }

    pub fn get(&self, key: DescriptorKey) -> Option<&ElementEntry> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ElementEntry> {
        self.entries.values()
    }
}

// ============================================================
// Sequence tables
// ============================================================

/// A single parsed Table D.
///
/// Sequences arrive split across input records (a header row followed by
/// child rows), so the table doubles as the accumulator: `begin_sequence`
/// opens a pending entry, `append_child` extends it, and the pending entry
/// becomes visible only when committed by the next `begin_sequence` or a
/// final `finish`. A pending sequence with no children is dropped, never
/// committed.
#[derive(Debug, Clone)]
pub struct SequenceTable {
    pub name: String,
    pub location: String,
    entries: HashMap<DescriptorKey, SequenceEntry>,
    pending: Option<PendingSequence>,
}

#[derive(Debug, Clone)]
struct PendingSequence {
    key: DescriptorKey,
    name: String,
    children: Vec<DescriptorKey>,
}

impl SequenceTable {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            entries: HashMap::new(),
            pending: None,
        }
    }

    /// Open a new pending sequence, committing any non-empty pending one
    /// first. A sequence key opened twice keeps the later definition.
    pub fn begin_sequence(&mut self, key: DescriptorKey, name: impl Into<String>) {
        self.commit_pending();
        self.pending = Some(PendingSequence {
            key,
            name: name.into(),
            children: Vec::new(),
        });
    }

    /// Append a child to the open sequence.
    pub fn append_child(&mut self, child: DescriptorKey) -> ModelResult<()> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.children.push(child);
                Ok(())
            }
            None => Err(ModelError::NoOpenSequence),
        }
    }

    /// Commit the pending sequence, if any. Call once at end of input.
    pub fn finish(&mut self) {
        self.commit_pending();
    }

    fn commit_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            if pending.children.is_empty() {
                return;
            }
            self.entries.insert(
                pending.key,
                SequenceEntry::new(pending.key, pending.name, pending.children),
            );
        }
    }

    pub fn get(&self, key: DescriptorKey) -> Option<&SequenceEntry> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SequenceEntry> {
        self.entries.values()
    }
}

// ============================================================
// Composite lookup
// ============================================================

/// An ordered stack of element tables searched front to back; the first
/// table that defines a key wins. Used to present older WMO editions backed
/// by the latest one as a single table.
#[derive(Debug, Clone)]
pub struct CompositeElementTable {
    layers: Vec<Arc<ElementTable>>,
}

impl CompositeElementTable {
    pub fn new(layers: Vec<Arc<ElementTable>>) -> Self {
        Self { layers }
    }

    pub fn single(table: Arc<ElementTable>) -> Self {
        Self { layers: vec![table] }
    }

    pub fn get(&self, key: DescriptorKey) -> Option<&ElementEntry> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    pub fn layers(&self) -> &[Arc<ElementTable>] {
        &self.layers
    }
}
