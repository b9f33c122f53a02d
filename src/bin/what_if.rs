//! Voting power projection for a hypothetical lockup starting now.
//!
//! Usage: what_if <amount> <lock_days> [days_from_now]
//! The curve comes from MIN_LOCKUP_SECS, MAX_SATURATION_SECS and
//! TARGET_VOTING_PCT.

use anyhow::{anyhow, Context, Result};

use lockup_stats::metrics::format_number;
use lockup_stats::state::{now_ts, Config};

const DAY: i64 = 86_400;

fn arg<T: std::str::FromStr>(args: &[String], idx: usize, name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    args.get(idx)
        .map(|v| v.parse::<T>().with_context(|| format!("invalid {} '{}'", name, v)))
        .transpose()
}

fn days_after(ts: i64, days: i64) -> Option<i64> {
    days.checked_mul(DAY).and_then(|secs| ts.checked_add(secs))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let usage = || anyhow!("usage: what_if <amount> <lock_days> [days_from_now]");
    let amount: f64 = arg(&args, 1, "amount")?.ok_or_else(usage)?;
    let lock_days: i64 = arg(&args, 2, "lock_days")?.ok_or_else(usage)?;
    let offset_days: i64 = arg(&args, 3, "days_from_now")?.unwrap_or(0);

    let curve = Config::from_env().curve();
    let start = now_ts();
    let end = days_after(start, lock_days).ok_or_else(|| anyhow!("lock_days {} out of range", lock_days))?;
    let at = days_after(start, offset_days).ok_or_else(|| anyhow!("days_from_now {} out of range", offset_days))?;
    let power = curve.power(amount, start, end, at);

    println!(
        "amount {} locked {} days -> voting power {} (day {}, curve {}..{}s at {}%)",
        format_number(amount),
        lock_days,
        format_number(power),
        offset_days,
        curve.min_duration,
        curve.max_saturation_duration,
        format_number(curve.target_voting_pct)
    );
    Ok(())
}
