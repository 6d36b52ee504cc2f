//! Parse one table file and print what the registry would see.
//!
//! Usage:
//!   cargo run --example inspect_table -- <file> <format> [b|d]
//!
//! Row-level problems are logged as warnings; RUST_LOG=debug also shows
//! the per-table load summaries.

use std::env;
use std::fs;
use std::process;

use bufr_tables::formats::{self, TableFormat};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let (Some(path), Some(tag)) = (args.next(), args.next()) else {
        eprintln!("usage: inspect_table <file> <format> [b|d]");
        eprintln!("formats: csv ncep ncep-nm ecmwf ukmet mel-bufr mel-tabs wmo-xml");
        process::exit(2);
    };
    let format = match tag.parse::<TableFormat>() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("formats: csv ncep ncep-nm ecmwf ukmet mel-bufr mel-tabs wmo-xml");
            process::exit(2);
        }
    };
    let half = args.next().unwrap_or_else(|| "b".to_string());

    let text = fs::read_to_string(&path)?;

    if half == "d" {
        let parsed = formats::read_sequence_table(format, &path, &path, &text)?;
        let mut sequences: Vec<_> = parsed.table.entries().collect();
        sequences.sort_by_key(|s| s.key);

        println!("{}: {} sequences, {} rows skipped", path, sequences.len(), parsed.skipped.len());
        for seq in sequences {
            let children: Vec<String> = seq.children().iter().map(|c| c.to_string()).collect();
            println!("  {}  {}  [{}]", seq.key, seq.name, children.join(" "));
        }
    } else {
        let parsed = formats::read_element_table(format, &path, &path, &text)?;
        let mut entries: Vec<_> = parsed.table.entries().collect();
        entries.sort_by_key(|e| e.key);

        println!("{}: {} elements, {} rows skipped", path, entries.len(), parsed.skipped.len());
        for entry in entries {
            println!(
                "  {}  scale {:>3}  reference {:>11}  width {:>3}  {} [{}]",
                entry.key, entry.scale, entry.reference, entry.width, entry.name, entry.units
            );
        }
    }

    Ok(())
}
