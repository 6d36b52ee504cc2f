//! Table entry types.

use crate::descriptor::DescriptorKey;

/// One element descriptor definition from Table B.
///
/// Decoded values are `(raw + reference) / 10^scale` over `width` bits;
/// the numeric fields are stored exactly as published, signed because local
/// tables use negative scales and references freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    pub key: DescriptorKey,
    pub name: String,
    pub units: String,
    pub scale: i32,
    pub reference: i64,
    pub width: u16,
}

/// One sequence descriptor definition from Table D: an ordered list of child
/// descriptors. Entries are only ever built through
/// [`SequenceTable`](crate::table::SequenceTable) accumulation, so a visible
/// entry always has at least one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    pub key: DescriptorKey,
    pub name: String,
    children: Vec<DescriptorKey>,
}

impl SequenceEntry {
    pub(crate) fn new(key: DescriptorKey, name: String, children: Vec<DescriptorKey>) -> Self {
        Self { key, name, children }
    }

    /// Child descriptors in definition order.
    pub fn children(&self) -> &[DescriptorKey] {
        &self.children
    }
}
