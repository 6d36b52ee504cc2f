//! Table registry: routing, loading and caching of BUFR tables.
//!
//! One registry value serves every decode thread. Parsed tables are cached
//! per location in concurrent maps; concurrent first loads of the same
//! location may each parse and insert, last write wins, which is safe
//! because parses are deterministic and the results structurally equal.
//! The routing rule list is built once on first resolution and read-only
//! afterwards.

use std::sync::{Arc, Mutex, OnceLock};

use bufr_model::{CompositeElementTable, ElementTable, SequenceTable};
use dashmap::DashMap;
use tracing::{debug, error, warn};

use crate::config::{self, Mode, Provenance, RoutingRule};
use crate::error::TableResult;
use crate::formats::{self, TableFormat};
use crate::resource::{self, ResourceLoader, StdResourceLoader};

/// Latest WMO master table edition shipped with this crate.
pub const LATEST_MASTER_VERSION: i32 = 14;
/// Older edition kept for codes the latest edition dropped or changed.
const FALLBACK_MASTER_VERSION: i32 = 13;

const CANONICAL_LOOKUP: &str = "resource:local/tablelookup.csv";
const WMO_TABLE_B_LATEST: &str = "resource:wmo/tableB-14.csv";
const WMO_TABLE_B_FALLBACK: &str = "resource:wmo/tableB-13.csv";
const WMO_TABLE_D_LATEST: &str = "resource:wmo/tableD-14.csv";

/// The tables routed to one message's provenance, handed to the decoder.
#[derive(Debug, Clone)]
pub struct Tables {
    pub element: Option<Arc<ElementTable>>,
    pub sequence: Option<Arc<SequenceTable>>,
    pub mode: Mode,
}

/// Cache occupancy counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub element_tables: usize,
    pub sequence_tables: usize,
}

pub struct TableRegistry {
    loader: Arc<dyn ResourceLoader>,
    lookup_locations: Mutex<Vec<String>>,
    rules: OnceLock<Vec<RoutingRule>>,
    element_cache: DashMap<String, Arc<ElementTable>>,
    sequence_cache: DashMap<String, Arc<SequenceTable>>,
    composites: DashMap<i32, Arc<CompositeElementTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::with_loader(Arc::new(StdResourceLoader::new()))
    }

    pub fn with_loader(loader: Arc<dyn ResourceLoader>) -> Self {
        TableRegistry {
            loader,
            lookup_locations: Mutex::new(Vec::new()),
            rules: OnceLock::new(),
            element_cache: DashMap::new(),
            sequence_cache: DashMap::new(),
            composites: DashMap::new(),
        }
    }

    /// Register an extra routing rule source ahead of the built-in one.
    ///
    /// Precondition: call during startup, before the first provenance
    /// resolution. The rule list is built once and never re-read, so later
    /// registrations do not take effect.
    pub fn add_lookup_location(&self, location: &str) -> TableResult<()> {
        // Fail fast on sources that cannot be opened at all.
        self.loader.open(location)?;
        if self.rules.get().is_some() {
            warn!(location = %location, "routing rules already resolved, registration has no effect");
        }
        lock_locations(&self.lookup_locations).push(location.to_string());
        Ok(())
    }

    /// Global Table B for a message's master table version.
    ///
    /// Edition 14 and anything newer is served as-is. Everything older,
    /// an unspecified `-1` included, gets the edition-13 table layered in
    /// front of edition 14, so historically stable definitions win for
    /// codes both editions define.
    pub fn wmo_element_table(&self, master_version: i32) -> TableResult<Arc<CompositeElementTable>> {
        if master_version > LATEST_MASTER_VERSION {
            debug!(
                master_version = master_version,
                latest = LATEST_MASTER_VERSION,
                "master version newer than shipped tables, using latest"
            );
        }
        let normalized = if master_version < LATEST_MASTER_VERSION {
            FALLBACK_MASTER_VERSION
        } else {
            LATEST_MASTER_VERSION
        };
        if let Some(composite) = self.composites.get(&normalized) {
            return Ok(composite.clone());
        }

        let latest = self.load_element_table(WMO_TABLE_B_LATEST, TableFormat::WmoCsv, false)?;
        let composite = if normalized == LATEST_MASTER_VERSION {
            CompositeElementTable::single(latest)
        } else {
            let fallback = self.load_element_table(WMO_TABLE_B_FALLBACK, TableFormat::WmoCsv, false)?;
            CompositeElementTable::new(vec![fallback, latest])
        };
        let composite = Arc::new(composite);
        self.composites.insert(normalized, composite.clone());
        Ok(composite)
    }

    /// Global Table D. Only the latest edition ships a sequence table.
    pub fn wmo_sequence_table(&self) -> TableResult<Arc<SequenceTable>> {
        self.load_sequence_table(WMO_TABLE_D_LATEST, TableFormat::WmoCsv, false)
    }

    /// Resolve the local tables for a message's provenance, or `None` when
    /// no routing rule matches.
    ///
    /// A side whose table fails to load is `None` while the sibling side
    /// still loads; the failure is logged, not propagated, so one broken
    /// table file degrades lookups instead of stopping decoding.
    pub fn local_tables(&self, provenance: &Provenance) -> Option<Tables> {
        let rule = config::resolve(self.rules(), provenance)?;
        debug!(
            center = provenance.center,
            subcenter = provenance.subcenter,
            master = provenance.master_version,
            local = provenance.local_version,
            category = provenance.category,
            mode = ?rule.mode,
            "routing rule matched"
        );

        // The combined mnemonic dialect defines both tables in one stream.
        if let Some(spec) = rule
            .table_b
            .as_ref()
            .filter(|spec| spec.format == TableFormat::NcepMnemonic)
        {
            return match self.load_mnemonic_tables(&spec.location) {
                Ok((element, sequence)) => Some(Tables {
                    element: Some(element),
                    sequence: Some(sequence),
                    mode: rule.mode,
                }),
                Err(e) => {
                    error!(location = %spec.location, error = %e, "failed to load mnemonic tables");
                    Some(Tables { element: None, sequence: None, mode: rule.mode })
                }
            };
        }

        let element = rule.table_b.as_ref().and_then(|spec| {
            match self.load_element_table(&spec.location, spec.format, false) {
                Ok(table) => Some(table),
                Err(e) => {
                    error!(location = %spec.location, error = %e, "failed to load local element table");
                    None
                }
            }
        });
        let sequence = rule.table_d.as_ref().and_then(|spec| {
            match self.load_sequence_table(&spec.location, spec.format, false) {
                Ok(table) => Some(table),
                Err(e) => {
                    error!(location = %spec.location, error = %e, "failed to load local sequence table");
                    None
                }
            }
        });
        Some(Tables { element, sequence, mode: rule.mode })
    }

    /// Load an element table, memoized by location. `force` re-parses and
    /// replaces the cached value.
    pub fn load_element_table(
        &self,
        location: &str,
        format: TableFormat,
        force: bool,
    ) -> TableResult<Arc<ElementTable>> {
        if !force {
            if let Some(table) = self.element_cache.get(location) {
                return Ok(table.clone());
            }
        }
        let text = resource::read_to_string(self.loader.as_ref(), location)?;
        let parsed = formats::read_element_table(format, table_name(location), location, &text)?;
        let table = Arc::new(parsed.table);
        self.element_cache.insert(location.to_string(), table.clone());
        debug!(
            location = %location,
            format = %format,
            entries = table.len(),
            skipped = parsed.skipped.len(),
            "loaded element table"
        );
        Ok(table)
    }

    /// Load a sequence table, memoized by location. `force` re-parses and
    /// replaces the cached value.
    pub fn load_sequence_table(
        &self,
        location: &str,
        format: TableFormat,
        force: bool,
    ) -> TableResult<Arc<SequenceTable>> {
        if !force {
            if let Some(table) = self.sequence_cache.get(location) {
                return Ok(table.clone());
            }
        }
        let text = resource::read_to_string(self.loader.as_ref(), location)?;
        let parsed = formats::read_sequence_table(format, table_name(location), location, &text)?;
        let table = Arc::new(parsed.table);
        self.sequence_cache.insert(location.to_string(), table.clone());
        debug!(
            location = %location,
            format = %format,
            sequences = table.len(),
            skipped = parsed.skipped.len(),
            "loaded sequence table"
        );
        Ok(table)
    }

    /// One mnemonic stream fills both caches under the same location key.
    fn load_mnemonic_tables(
        &self,
        location: &str,
    ) -> TableResult<(Arc<ElementTable>, Arc<SequenceTable>)> {
        // Clone out of the map guards before the insert path below touches
        // the same shards.
        let element_hit = self.element_cache.get(location).map(|table| table.clone());
        let sequence_hit = self.sequence_cache.get(location).map(|table| table.clone());
        if let (Some(element), Some(sequence)) = (element_hit, sequence_hit) {
            return Ok((element, sequence));
        }
        let text = resource::read_to_string(self.loader.as_ref(), location)?;
        let tables = formats::ncep_mnemonic::read_tables(table_name(location), location, &text);
        let element = Arc::new(tables.element);
        let sequence = Arc::new(tables.sequence);
        self.element_cache.insert(location.to_string(), element.clone());
        self.sequence_cache.insert(location.to_string(), sequence.clone());
        debug!(
            location = %location,
            entries = element.len(),
            sequences = sequence.len(),
            skipped = tables.skipped.len(),
            "loaded mnemonic tables"
        );
        Ok((element, sequence))
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            element_tables: self.element_cache.len(),
            sequence_tables: self.sequence_cache.len(),
        }
    }

    fn rules(&self) -> &[RoutingRule] {
        self.rules.get_or_init(|| self.build_rules())
    }

    fn build_rules(&self) -> Vec<RoutingRule> {
        let mut sources = lock_locations(&self.lookup_locations).clone();
        sources.push(CANONICAL_LOOKUP.to_string());

        let mut rules = Vec::new();
        for location in &sources {
            match resource::read_to_string(self.loader.as_ref(), location) {
                Ok(text) => {
                    let (mut parsed, skipped) = config::parse_rules(location, &text);
                    debug!(
                        location = %location,
                        rules = parsed.len(),
                        skipped = skipped.len(),
                        "loaded routing rules"
                    );
                    rules.append(&mut parsed);
                }
                Err(e) => {
                    error!(location = %location, error = %e, "failed to read routing rules")
                }
            }
        }
        rules
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_locations(locations: &Mutex<Vec<String>>) -> std::sync::MutexGuard<'_, Vec<String>> {
    match locations.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Short display name for a table, the last segment of its location.
fn table_name(location: &str) -> &str {
    location.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(location)
}
