//! Registry and lookup tests against the built-in canonical tables plus
//! rule sources written to a temporary directory.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use bufr_tables::{
    Mode, Provenance, RegistryStats, StdResourceLoader, TableError, TableFormat, TableLookup,
    TableRegistry, LATEST_MASTER_VERSION,
};
use common::key;

fn write_file(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

/// A typical NCEP surface observation header.
fn ncep_provenance() -> Provenance {
    Provenance::new(7, 0, 14, 1, 0)
}

// ============================================================================
// Built-in routing
// ============================================================================

#[test]
fn test_builtin_rule_routes_ncep_local_tables() {
    let registry = TableRegistry::new();
    let tables = registry.local_tables(&ncep_provenance()).unwrap();
    assert_eq!(tables.mode, Mode::WmoLocal);

    let element = tables.element.unwrap();
    assert_eq!(element.get(key(0, 1, 192)).unwrap().name, "NCEP report subtype");
    assert_eq!(element.get(key(0, 12, 192)).unwrap().units, "K");

    let sequence = tables.sequence.unwrap();
    let rpid = sequence.get(key(3, 60, 192)).unwrap();
    assert_eq!(rpid.name, "NCEP report identification");
    assert_eq!(rpid.children(), &[key(0, 1, 192), key(0, 1, 193)]);
}

#[test]
fn test_unmatched_provenance_has_no_local_tables() {
    let registry = TableRegistry::new();
    assert!(registry.local_tables(&Provenance::new(98, 0, 14, 0, 2)).is_none());
}

// ============================================================================
// Master version layering
// ============================================================================

#[test]
fn test_old_master_version_layers_fallback_over_latest() {
    let registry = TableRegistry::new();

    let old = registry.wmo_element_table(13).unwrap();
    // Dropped after edition 13, still resolvable for old messages.
    assert_eq!(old.get(key(0, 12, 1)).unwrap().scale, 1);
    // Added in edition 14, reachable through the back layer.
    assert!(old.get(key(0, 12, 101)).is_some());

    let latest = registry.wmo_element_table(LATEST_MASTER_VERSION).unwrap();
    assert!(latest.get(key(0, 12, 1)).is_none());
    assert_eq!(latest.get(key(0, 12, 101)).unwrap().name, "Temperature/air temperature");
}

#[test]
fn test_unspecified_master_version_layers_fallback_over_latest() {
    let registry = TableRegistry::new();
    // -1 means the header left the version unspecified; edition-13-only
    // codes must stay resolvable.
    let table = registry.wmo_element_table(-1).unwrap();
    assert_eq!(table.get(key(0, 12, 1)).unwrap().scale, 1);
    assert!(table.get(key(0, 12, 101)).is_some());
}

#[test]
fn test_wmo_sequence_table_serves_canonical_sequences() {
    let registry = TableRegistry::new();
    let table = registry.wmo_sequence_table().unwrap();

    let date = table.get(key(3, 1, 11)).unwrap();
    assert_eq!(date.children(), &[key(0, 4, 1), key(0, 4, 2), key(0, 4, 3)]);
    // Sequences may nest other sequences as children.
    let position_time = table.get(key(3, 1, 25)).unwrap();
    assert_eq!(position_time.children(), &[key(3, 1, 23), key(0, 4, 3), key(3, 1, 12)]);
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_loads_memoized_until_forced() {
    let registry = TableRegistry::new();

    let first = registry.wmo_sequence_table().unwrap();
    let second = registry.wmo_sequence_table().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let location = "resource:wmo/tableB-14.csv";
    let cached = registry.load_element_table(location, TableFormat::WmoCsv, false).unwrap();
    let again = registry.load_element_table(location, TableFormat::WmoCsv, false).unwrap();
    assert!(Arc::ptr_eq(&cached, &again));

    let forced = registry.load_element_table(location, TableFormat::WmoCsv, true).unwrap();
    assert!(!Arc::ptr_eq(&cached, &forced));
    assert_eq!(cached.len(), forced.len());
}

#[test]
fn test_stats_track_cache_occupancy() {
    let registry = TableRegistry::new();
    assert_eq!(registry.stats(), RegistryStats { element_tables: 0, sequence_tables: 0 });

    registry.wmo_element_table(LATEST_MASTER_VERSION).unwrap();
    registry.wmo_sequence_table().unwrap();
    assert_eq!(registry.stats(), RegistryStats { element_tables: 1, sequence_tables: 1 });

    registry.local_tables(&ncep_provenance()).unwrap();
    assert_eq!(registry.stats(), RegistryStats { element_tables: 2, sequence_tables: 2 });
}

#[test]
fn test_concurrent_loads_share_one_cache_slot() {
    let registry = Arc::new(TableRegistry::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            let table = registry.wmo_element_table(LATEST_MASTER_VERSION).unwrap();
            table.get(key(0, 12, 101)).is_some()
        }));
    }
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    assert_eq!(registry.stats().element_tables, 1);
}

// ============================================================================
// Extra rule sources
// ============================================================================

#[test]
fn test_added_lookup_shadows_builtin_rules() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "lookup.csv", "7,-1,-1,-1,-1,customb.txt,ncep,,ncep,localWmo\n");
    write_file(
        dir.path(),
        "customb.txt",
        "Custom local Table B\n0-01-200 |  0 |  0 |   8 | Numeric | Custom subtype\nEND\n",
    );

    let registry = TableRegistry::with_loader(Arc::new(StdResourceLoader::with_root(dir.path())));
    registry.add_lookup_location("lookup.csv").unwrap();

    let tables = registry.local_tables(&ncep_provenance()).unwrap();
    assert_eq!(tables.mode, Mode::LocalOverride);
    assert!(tables.sequence.is_none());

    let element = tables.element.unwrap();
    assert!(element.get(key(0, 1, 200)).is_some());
    // The built-in center 7 rule is shadowed, not merged.
    assert!(element.get(key(0, 1, 192)).is_none());
}

#[test]
fn test_registration_after_resolution_has_no_effect() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "late.csv", "7,-1,-1,-1,-1,lateb.txt,ncep,,ncep,localWmo\n");
    write_file(
        dir.path(),
        "lateb.txt",
        "Late local Table B\n0-01-201 |  0 |  0 |   8 | Numeric | Late subtype\nEND\n",
    );

    let registry = TableRegistry::with_loader(Arc::new(StdResourceLoader::with_root(dir.path())));
    // First resolution freezes the rule list at the built-in source.
    assert!(registry.local_tables(&ncep_provenance()).is_some());

    registry.add_lookup_location("late.csv").unwrap();

    let tables = registry.local_tables(&ncep_provenance()).unwrap();
    assert_eq!(tables.mode, Mode::WmoLocal);
    let element = tables.element.unwrap();
    assert!(element.get(key(0, 1, 192)).is_some());
    assert!(element.get(key(0, 1, 201)).is_none());
}

#[test]
fn test_add_lookup_location_fails_fast_on_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let registry = TableRegistry::with_loader(Arc::new(StdResourceLoader::with_root(dir.path())));

    let err = registry.add_lookup_location("absent.csv").unwrap_err();
    assert!(matches!(err, TableError::ResourceNotFound(_)));
}

#[test]
fn test_unreadable_side_degrades_to_none() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "lookup.csv", "60,-1,-1,-1,-1,missing-b.txt,ncep,customd.txt,ncep\n");
    write_file(
        dir.path(),
        "customd.txt",
        "Custom local Table D\n3-60-200 | XSEQ | | Custom sequence\n         | 0-01-001 | |\nEND\n",
    );

    let registry = TableRegistry::with_loader(Arc::new(StdResourceLoader::with_root(dir.path())));
    registry.add_lookup_location("lookup.csv").unwrap();

    let tables = registry.local_tables(&Provenance::new(60, 0, 14, 0, 0)).unwrap();
    assert!(tables.element.is_none());

    let sequence = tables.sequence.unwrap();
    assert_eq!(sequence.get(key(3, 60, 200)).unwrap().children(), &[key(0, 1, 1)]);
}

// ============================================================================
// Lookup facade
// ============================================================================

#[test]
fn test_lookup_resolves_global_and_local_sides() {
    let registry = TableRegistry::new();
    let lookup = TableLookup::new(&registry, &ncep_provenance()).unwrap();
    assert_eq!(lookup.mode(), Mode::WmoLocal);
    assert!(lookup.has_local_tables());

    // WMO-range key from the global table.
    assert_eq!(lookup.element(key(0, 12, 101)).unwrap().name, "Temperature/air temperature");
    // y >= 192 is local territory, never served from the global table.
    assert_eq!(lookup.element(key(0, 12, 192)).unwrap().name, "Skin temperature");

    let surface = lookup.sequence(key(3, 60, 193)).unwrap();
    assert_eq!(surface.children(), &[key(3, 1, 1), key(0, 12, 192), key(0, 11, 193)]);
    let date = lookup.sequence(key(3, 1, 11)).unwrap();
    assert_eq!(date.children().len(), 3);
}

#[test]
fn test_lookup_without_matching_rule_is_wmo_only() {
    let registry = TableRegistry::new();
    let lookup = TableLookup::new(&registry, &Provenance::new(98, 0, 14, 0, 2)).unwrap();
    assert_eq!(lookup.mode(), Mode::WmoOnly);
    assert!(!lookup.has_local_tables());

    assert!(lookup.element(key(0, 12, 101)).is_some());
    assert!(lookup.element(key(0, 12, 192)).is_none());
    assert!(lookup.sequence(key(3, 60, 193)).is_none());
}

#[test]
fn test_lookup_old_master_version_sees_fallback_codes() {
    let registry = TableRegistry::new();
    let lookup = TableLookup::new(&registry, &Provenance::new(98, 0, 13, 0, 2)).unwrap();

    assert_eq!(lookup.element(key(0, 12, 1)).unwrap().scale, 1);
    assert!(lookup.element(key(0, 12, 101)).is_some());
}
