//! Common test utilities for bufr-tables tests.

use bufr_model::DescriptorKey;

/// Build a descriptor key from fields, panicking on bad test input.
pub fn key(f: u32, x: u32, y: u32) -> DescriptorKey {
    DescriptorKey::new(f, x, y).unwrap()
}
