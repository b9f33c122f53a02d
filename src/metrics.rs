use std::cmp::Ordering;

use crate::snapshot::LockupRecord;

/// Parameters of the duration-based voting power curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VotingCurve {
    pub min_duration: i64,
    pub max_saturation_duration: i64,
    /// Multiplier at saturation, in percent of the locked amount.
    pub target_voting_pct: f64,
}

impl VotingCurve {
    pub fn power(&self, amount: f64, start_ts: i64, end_ts: i64, now: i64) -> f64 {
        compute_voting_power(
            amount,
            start_ts,
            end_ts,
            self.min_duration,
            self.max_saturation_duration,
            self.target_voting_pct,
            now,
        )
    }
}

impl Default for VotingCurve {
    fn default() -> Self {
        Self {
            min_duration: 0,
            max_saturation_duration: 31_536_000,
            target_voting_pct: 400.0,
        }
    }
}

/// Voting power of a lockup, linearly interpolated between the raw amount at
/// `min_duration` and `amount * target_voting_pct / 100` at
/// `max_saturation_duration`.
///
/// Expired lockups and empty windows have no power. A range with
/// `max_saturation_duration <= min_duration` that still reaches the
/// interpolation branch yields 0 rather than a guess.
pub fn compute_voting_power(
    amount: f64,
    start_ts: i64,
    end_ts: i64,
    min_duration: i64,
    max_saturation_duration: i64,
    target_voting_pct: f64,
    now: i64,
) -> f64 {
    if now > end_ts || end_ts <= start_ts {
        return 0.0;
    }
    let duration = end_ts - start_ts;
    let max_power = amount * target_voting_pct / 100.0;

    if duration <= min_duration {
        return amount;
    }
    if duration >= max_saturation_duration {
        return max_power;
    }
    if max_saturation_duration <= min_duration {
        return 0.0;
    }
    let progress =
        (duration - min_duration) as f64 / (max_saturation_duration - min_duration) as f64;
    amount + (max_power - amount) * progress
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    /// Staking power needed to rank in the top 1% of lockups.
    pub top1: f64,
    /// Staking power needed to rank in the top 10% of lockups.
    pub top10: f64,
}

/// Percentile thresholds over staking power. The input is not reordered.
///
/// Records are ranked by descending power; equal powers are ranked by wallet
/// ascending so the result does not depend on arrival order. An index past the
/// end (empty input) yields 0 for that threshold.
pub fn compute_percentile_thresholds(records: &[LockupRecord]) -> Thresholds {
    let mut ranked: Vec<&LockupRecord> = records.iter().collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    Thresholds {
        top1: power_at_fraction(&ranked, 0.01),
        top10: power_at_fraction(&ranked, 0.10),
    }
}

fn rank_order(a: &LockupRecord, b: &LockupRecord) -> Ordering {
    sort_key(b.staking_power)
        .total_cmp(&sort_key(a.staking_power))
        .then_with(|| a.wallet.cmp(&b.wallet))
}

// NaN ranks below every real power.
fn sort_key(power: f64) -> f64 {
    if power.is_nan() {
        f64::NEG_INFINITY
    } else {
        power
    }
}

fn power_at_fraction(ranked: &[&LockupRecord], fraction: f64) -> f64 {
    let idx = (ranked.len() as f64 * fraction).floor() as usize;
    ranked.get(idx).map(|r| r.staking_power).unwrap_or(0.0)
}

/// Mean stored duration of the non-degenerate records, in seconds.
pub fn average_duration_secs(records: &[LockupRecord]) -> Option<f64> {
    let durations: Vec<i64> = records
        .iter()
        .filter(|r| !r.is_degenerate())
        .filter_map(|r| r.duration)
        .collect();
    if durations.is_empty() {
        return None;
    }
    let total: f64 = durations.iter().map(|d| *d as f64).sum();
    Some(total / durations.len() as f64)
}

/// en-US style number: `,` thousands separators, at most two fraction digits,
/// trailing fraction zeros dropped.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    // round half away from zero, in hundredths
    let cents = (value.abs() * 100.0).round() as u128;
    let int_part = cents / 100;
    let frac_part = cents % 100;

    let mut out = String::new();
    if value < 0.0 && cents != 0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if frac_part != 0 {
        if frac_part % 10 == 0 {
            out.push_str(&format!(".{}", frac_part / 10));
        } else {
            out.push_str(&format!(".{:02}", frac_part));
        }
    }
    out
}

fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
