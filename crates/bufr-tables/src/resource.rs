//! Table location resolution.
//!
//! Locations are plain strings. The `resource:` scheme serves the canonical
//! tables compiled into this crate; anything else is a filesystem path,
//! resolved against a configurable root directory when relative. Consumers
//! with other transports (HTTP mirrors, archives) implement
//! [`ResourceLoader`] themselves and hand it to the registry.

use std::env;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{TableError, TableResult};

/// Environment variable overriding the root directory for relative table
/// paths.
pub const TABLES_DIR_ENV: &str = "BUFR_TABLES_DIR";

/// Scheme prefix for tables embedded in this crate.
pub const RESOURCE_SCHEME: &str = "resource:";

/// Canonical tables shipped with the crate, keyed by their path under the
/// `resource:` scheme.
static EMBEDDED: &[(&str, &str)] = &[
    ("wmo/tableB-13.csv", include_str!("../resources/wmo/tableB-13.csv")),
    ("wmo/tableB-14.csv", include_str!("../resources/wmo/tableB-14.csv")),
    ("wmo/tableD-14.csv", include_str!("../resources/wmo/tableD-14.csv")),
    ("local/tablelookup.csv", include_str!("../resources/local/tablelookup.csv")),
    ("local/ncep/tableb.txt", include_str!("../resources/local/ncep/tableb.txt")),
    ("local/ncep/tabled.txt", include_str!("../resources/local/ncep/tabled.txt")),
];

/// Maps a location string to a byte stream.
///
/// Implementations must be shareable across decode threads. Failures other
/// than a missing resource can be wrapped through `TableError::Other`.
pub trait ResourceLoader: Send + Sync {
    /// Open the location for reading, or fail with
    /// [`TableError::ResourceNotFound`] when it does not exist.
    fn open(&self, location: &str) -> TableResult<Box<dyn Read + Send>>;
}

/// Loader for embedded resources and local files.
pub struct StdResourceLoader {
    root: PathBuf,
}

impl StdResourceLoader {
    /// Loader rooted at `BUFR_TABLES_DIR` if set, otherwise the process
    /// working directory.
    pub fn new() -> Self {
        let root = env::var(TABLES_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self { root }
    }

    /// Loader resolving relative paths against the given directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for StdResourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLoader for StdResourceLoader {
    fn open(&self, location: &str) -> TableResult<Box<dyn Read + Send>> {
        if let Some(name) = location.strip_prefix(RESOURCE_SCHEME) {
            return match EMBEDDED.iter().find(|(key, _)| *key == name) {
                Some((_, text)) => Ok(Box::new(Cursor::new(text.as_bytes()))),
                None => Err(TableError::ResourceNotFound(location.to_string())),
            };
        }

        let path = if Path::new(location).is_absolute() {
            PathBuf::from(location)
        } else {
            self.root.join(location)
        };
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TableError::ResourceNotFound(location.to_string()))
            }
            Err(e) => Err(TableError::Io(e)),
        }
    }
}

/// Read a location fully into a string. Table sources are small; every
/// dialect parser works from the complete text.
pub(crate) fn read_to_string(
    loader: &dyn ResourceLoader,
    location: &str,
) -> TableResult<String> {
    let mut stream = loader.open(location)?;
    let mut text = String::new();
    stream.read_to_string(&mut text)?;
    Ok(text)
}
