//! Render a snapshot JSON file once, without touching the network.
//!
//! Usage: replay <snapshot.json>
//! The file may be a bare snapshot or a response envelope; the envelope is
//! descended using SNAPSHOT_KEY_PATH.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use lockup_stats::feed::DataOrigin;
use lockup_stats::report::render;
use lockup_stats::snapshot::Snapshot;
use lockup_stats::state::{now_ts, today_utc, Config, DashboardView};

fn load(path: &Path, key_path: &str) -> Result<Snapshot> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let doc: Value = serde_json::from_str(&raw).with_context(|| format!("{} is not JSON", path.display()))?;
    Snapshot::from_envelope(&doc, key_path)
        .or_else(|_| Snapshot::from_envelope(&doc, ""))
        .map_err(|e| anyhow!("{}: {}", path.display(), e))
}

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: replay <snapshot.json>"))?;
    let cfg = Config::from_env();
    let snapshot = load(&path, &cfg.snapshot_key_path)?;

    let view = DashboardView::derive(&snapshot, DataOrigin::Live, today_utc(), now_ts(), cfg.stale_after_secs);
    println!("{}", render(&view, None, cfg.series_tail_days));
    Ok(())
}
