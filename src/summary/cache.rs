//! Snapshot cache over the daily aggregator.
//!
//! One tailer plus one aggregator behind a single lock. Queries return
//! the cached snapshot untouched while the log file is quiet; only
//! appended bytes are read when it grows, and rotation or absence
//! resets the aggregate state exactly once.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{DailyAggregator, SummarySnapshot};
use crate::record::ProbeRecord;
use crate::tail::{TailEvent, Tailer};

struct CacheState {
    tailer: Tailer,
    aggregator: DailyAggregator,
    snapshot: Option<Arc<SummarySnapshot>>,
    built_at: Option<DateTime<Utc>>,
}

impl CacheState {
    fn clear(&mut self) {
        self.tailer.reset();
        self.aggregator = DailyAggregator::new();
        self.snapshot = None;
        self.built_at = None;
    }

    fn rebuild(&mut self) -> Arc<SummarySnapshot> {
        let snap = Arc::new(self.aggregator.snapshot());
        self.snapshot = Some(snap.clone());
        self.built_at = Some(Utc::now());
        snap
    }
}

/// Incrementally maintained daily summary, safe to query from many
/// request handlers at once.
pub struct SummaryCache {
    inner: Mutex<CacheState>,
}

impl SummaryCache {
    pub fn new<P: Into<PathBuf>>(log_path: P) -> Self {
        Self {
            inner: Mutex::new(CacheState {
                tailer: Tailer::new(log_path.into()),
                aggregator: DailyAggregator::new(),
                snapshot: None,
                built_at: None,
            }),
        }
    }

    /// Drop all cached state; the next query rebuilds from byte 0.
    pub fn invalidate(&self) {
        let mut state = self.inner.lock().unwrap();
        state.clear();
    }

    /// When the current snapshot was computed, if one is cached.
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().built_at
    }

    /// Return the daily summary, reading only what the file gained
    /// since the last call.
    ///
    /// The returned snapshot reflects every complete line present in
    /// the file at (or before) the moment of the call. A poll failure
    /// is logged and answered with the previous snapshot; the cursor
    /// does not advance, so nothing is lost.
    pub fn get_snapshot(&self) -> Arc<SummarySnapshot> {
        let mut state = self.inner.lock().unwrap();

        // A rotation clears aggregate state and re-polls once, so the
        // same call already reflects the replacement file.
        for _ in 0..2 {
            match state.tailer.poll() {
                Ok(TailEvent::Absent) => {
                    state.clear();
                    return Arc::new(Vec::new());
                }
                Ok(TailEvent::Rotated) => {
                    state.aggregator = DailyAggregator::new();
                    state.snapshot = None;
                    state.built_at = None;
                    continue;
                }
                Ok(TailEvent::Unchanged) => {
                    if let Some(snap) = &state.snapshot {
                        return snap.clone();
                    }
                    return state.rebuild();
                }
                Ok(TailEvent::Grown(lines)) => {
                    for line in &lines {
                        if let Some(record) = ProbeRecord::parse(line) {
                            state.aggregator.merge(&record);
                        }
                    }
                    return state.rebuild();
                }
                Err(e) => {
                    tracing::warn!(
                        "Summary poll failed on {}: {}",
                        state.tailer.path().display(),
                        e
                    );
                    return state
                        .snapshot
                        .clone()
                        .unwrap_or_else(|| Arc::new(Vec::new()));
                }
            }
        }

        // Rotated twice back to back; serve what the (empty) aggregator has.
        state.rebuild()
    }
}
