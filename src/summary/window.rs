//! Stateless raw-record queries over the probe log.
//!
//! These helpers re-scan the file on every call and share no state
//! with [`super::SummaryCache`]; they exist for low-frequency queries
//! where a bounded or full scan is acceptable.

use std::io;
use std::path::Path;

use crate::record::ProbeRecord;

/// The last `n` valid records, in file order. Malformed lines are
/// dropped and do not count toward `n`.
pub fn tail_records(path: &Path, n: usize) -> Vec<ProbeRecord> {
    let mut records = scan(path);
    if records.len() > n {
        records.drain(..records.len() - n);
    }
    records
}

/// Every valid record whose timestamp starts with `day`
/// (`YYYY-MM-DD`), sorted by timestamp ascending.
pub fn records_for_day(path: &Path, day: &str) -> Vec<ProbeRecord> {
    if day.is_empty() {
        return Vec::new();
    }
    let mut records: Vec<ProbeRecord> = scan(path)
        .into_iter()
        .filter(|r| r.timestamp.as_deref().is_some_and(|ts| ts.starts_with(day)))
        .collect();
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    records
}

fn scan(path: &Path) -> Vec<ProbeRecord> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
            return Vec::new();
        }
    };
    String::from_utf8_lossy(&bytes)
        .lines()
        .filter_map(ProbeRecord::parse)
        .collect()
}
