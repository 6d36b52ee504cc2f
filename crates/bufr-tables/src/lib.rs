//! BUFR table registry and descriptor resolution.
//!
//! Loads WMO and center-local BUFR tables from their historical on-disk
//! dialects, routes a message's provenance (originating center, subcenter,
//! master/local table versions, data category) to the right tables, and
//! resolves descriptors through the global/local precedence modes.
//!
//! # Architecture
//!
//! - [`formats`] parses the seven table dialects into the canonical model
//!   from `bufr-model`, skipping bad rows instead of failing the table.
//! - [`config`] is the ordered routing rule list with `-1` wildcards and
//!   first-match-wins resolution.
//! - [`registry`] is the caching facade decode threads share; parsed
//!   tables are memoized per location.
//! - [`lookup`] snapshots one message's view: global tables, local tables
//!   and the precedence mode between them.

pub mod category;
pub mod config;
pub mod error;
pub mod formats;
pub mod lookup;
pub mod registry;
pub mod resource;

// Re-exports
pub use category::{data_category_description, data_category_name};
pub use config::{Mode, Provenance, RoutingRule, TableSpec};
pub use error::{TableError, TableResult};
pub use formats::{LineDiagnostic, MnemonicTables, Parsed, TableFormat};
pub use lookup::TableLookup;
pub use registry::{RegistryStats, TableRegistry, Tables, LATEST_MASTER_VERSION};
pub use resource::{ResourceLoader, StdResourceLoader, RESOURCE_SCHEME, TABLES_DIR_ENV};
