//! Daily cumulative staking power and staked amount.
//!
//! Each lockup is an open event on its start day and a close event on its end
//! day. Events are folded into a per-day delta map, the map is expanded into a
//! gap-free run of calendar days ending today, and the run is summed into
//! running totals. Days are UTC calendar days.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate};

use crate::snapshot::LockupRecord;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DayDelta {
    pub staking_power: f64,
    pub amount: f64,
}

impl DayDelta {
    fn add(&mut self, staking_power: f64, amount: f64) {
        self.staking_power += staking_power;
        self.amount += amount;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub day: NaiveDate,
    pub staking_power: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// No records at all.
    EmptyDataset,
    /// Records exist but none has a usable window starting on or before today.
    NoAnchor { skipped: usize },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDataset => write!(f, "no lockup records"),
            Self::NoAnchor { skipped } => write!(
                f,
                "no lockup starts on or before today ({} degenerate records skipped)",
                skipped
            ),
        }
    }
}

impl std::error::Error for SeriesError {}

/// UTC calendar day of a Unix timestamp.
pub fn day_bucket(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// Signed open/close deltas keyed by day, plus the number of records skipped
/// as degenerate. Days after `today` are kept; callers decide the range.
pub fn delta_map(records: &[LockupRecord]) -> (BTreeMap<NaiveDate, DayDelta>, usize) {
    let mut deltas: BTreeMap<NaiveDate, DayDelta> = BTreeMap::new();
    let mut skipped = 0;
    for r in records {
        if r.is_degenerate() {
            skipped += 1;
            continue;
        }
        let (start, end) = match (day_bucket(r.start_ts), day_bucket(r.end_ts)) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                skipped += 1;
                continue;
            }
        };
        deltas.entry(start).or_default().add(r.staking_power, r.amount);
        deltas.entry(end).or_default().add(-r.staking_power, -r.amount);
    }
    (deltas, skipped)
}

/// Gap-filled per-day deltas from the earliest start day through `today`.
pub fn daily_deltas(
    records: &[LockupRecord],
    today: NaiveDate,
) -> Result<Vec<(NaiveDate, DayDelta)>, SeriesError> {
    if records.is_empty() {
        return Err(SeriesError::EmptyDataset);
    }
    let (deltas, skipped) = delta_map(records);

    // Close events never anchor the range; only starts on or before today do.
    let anchor = records
        .iter()
        .filter(|r| !r.is_degenerate())
        .filter_map(|r| day_bucket(r.start_ts))
        .filter(|d| *d <= today)
        .min()
        .ok_or(SeriesError::NoAnchor { skipped })?;

    Ok(anchor
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|d| (d, deltas.get(&d).copied().unwrap_or_default()))
        .collect())
}

/// One cumulative point per calendar day from the earliest start through
/// `today`. The last point is the stake still locked as of `today`.
pub fn cumulative_series(
    records: &[LockupRecord],
    today: NaiveDate,
) -> Result<Vec<SeriesPoint>, SeriesError> {
    let mut running = DayDelta::default();
    Ok(daily_deltas(records, today)?
        .into_iter()
        .map(|(day, delta)| {
            running.add(delta.staking_power, delta.amount);
            SeriesPoint {
                day,
                staking_power: running.staking_power,
                amount: running.amount,
            }
        })
        .collect())
}
