//! Incremental per-day probe statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::record::ProbeRecord;

/// Running totals for one calendar day. Mutated only through
/// [`DailyAggregator::merge`]; rendered copies never point back here.
#[derive(Debug, Clone, Default)]
struct DayAggregate {
    total_probes: u64,
    total_sent: i64,
    total_received: i64,
    loss_sum: f64,
    loss_count: u64,
    good_probes: u64,
    degraded_probes: u64,
    down_probes: u64,
    rtt_sum: f64,
    rtt_count: u64,
    rtt_min: Option<f64>,
    rtt_max: Option<f64>,
    targets: BTreeSet<String>,
    public_ips: BTreeSet<String>,
}

/// One rendered row of the daily summary. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub total_probes: u64,
    pub uptime_pct: f64,
    pub avg_loss_pct: f64,
    /// None when the day has no RTT samples; never rendered as 0.
    pub avg_rtt_ms: Option<f64>,
    pub min_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub good_probes: u64,
    pub degraded_probes: u64,
    pub down_probes: u64,
    pub total_sent: i64,
    pub total_received: i64,
    pub targets: Vec<String>,
    pub public_ips: Vec<String>,
}

/// Sorted, read-only rendering of every known day.
pub type SummarySnapshot = Vec<DaySummary>;

/// Merges probe records into per-day aggregates, one record at a time.
///
/// Days are keyed by `YYYY-MM-DD`, so the `BTreeMap` iteration order is
/// already chronological.
#[derive(Debug, Default)]
pub struct DailyAggregator {
    days: BTreeMap<String, DayAggregate>,
}

impl DailyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Fold one record into its day. Records without a timestamp are
    /// not aggregable and are skipped entirely.
    pub fn merge(&mut self, record: &ProbeRecord) {
        let Some(day) = record.day() else {
            return;
        };
        let d = self.days.entry(day.to_string()).or_default();

        d.total_probes += 1;

        if let Some(sent) = record.sent {
            d.total_sent += sent;
        }
        if let Some(received) = record.received {
            d.total_received += received;
        }

        if let Some(loss) = record.loss_pct {
            d.loss_sum += loss;
            d.loss_count += 1;
            if loss == 0.0 {
                d.good_probes += 1;
            } else if loss == 100.0 {
                d.down_probes += 1;
            } else {
                d.degraded_probes += 1;
            }
        }

        if let Some(rtt) = record.rtt_avg_ms {
            d.rtt_sum += rtt;
            d.rtt_count += 1;
            d.rtt_min = Some(d.rtt_min.map_or(rtt, |m| m.min(rtt)));
            d.rtt_max = Some(d.rtt_max.map_or(rtt, |m| m.max(rtt)));
        }

        if let Some(target) = record.endpoint() {
            d.targets.insert(target.to_string());
        }
        if let Some(ip) = record.public_ip.as_deref().filter(|s| !s.is_empty()) {
            d.public_ips.insert(ip.to_string());
        }
    }

    /// Render every known day, ascending by date.
    pub fn snapshot(&self) -> SummarySnapshot {
        self.days
            .iter()
            .map(|(date, d)| {
                let uptime_pct = if d.total_probes > 0 {
                    100.0 * (d.total_probes - d.down_probes) as f64 / d.total_probes as f64
                } else {
                    0.0
                };
                let avg_loss_pct = if d.loss_count > 0 {
                    d.loss_sum / d.loss_count as f64
                } else {
                    0.0
                };
                let avg_rtt_ms = (d.rtt_count > 0).then(|| d.rtt_sum / d.rtt_count as f64);

                DaySummary {
                    date: date.clone(),
                    total_probes: d.total_probes,
                    uptime_pct,
                    avg_loss_pct,
                    avg_rtt_ms,
                    min_rtt_ms: d.rtt_min,
                    max_rtt_ms: d.rtt_max,
                    good_probes: d.good_probes,
                    degraded_probes: d.degraded_probes,
                    down_probes: d.down_probes,
                    total_sent: d.total_sent,
                    total_received: d.total_received,
                    targets: d.targets.iter().cloned().collect(),
                    public_ips: d.public_ips.iter().cloned().collect(),
                }
            })
            .collect()
    }
}
