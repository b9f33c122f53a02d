use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use lockup_stats::feed::{FetchOutcome, HttpSnapshotSource, InFlight, SnapshotFeed};
use lockup_stats::logging::{self, obj, v_int, v_str, Domain};
use lockup_stats::report::render;
use lockup_stats::state::{now_ts, today_utc, Config, DashboardState};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let source = HttpSnapshotSource::new(cfg.endpoint()?, &cfg.snapshot_key_path, cfg.http_timeout());
    let endpoint = source.endpoint().to_string();
    let feed = Arc::new(SnapshotFeed::new(source)?);
    let in_flight = InFlight::new();
    let mut state = DashboardState::new();

    logging::info(
        Domain::System,
        "startup",
        obj(&[
            ("source", v_str(&endpoint)),
            ("key_path", v_str(&cfg.snapshot_key_path)),
            ("poll_secs", v_int(cfg.poll_interval().as_secs() as i64)),
        ]),
    );

    // Fetches report back here so a slow response never holds up the timer.
    let (tx, mut rx) = mpsc::channel::<FetchOutcome>(4);
    let mut ticker = interval(cfg.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(ticket) = in_flight.try_begin() else {
                    logging::warn(
                        Domain::System,
                        "tick_skipped",
                        obj(&[("msg", v_str("previous fetch still outstanding"))]),
                    );
                    continue;
                };
                state.begin_refresh();
                let feed = feed.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = feed.refresh().await;
                    drop(ticket);
                    let _ = tx.send(outcome).await;
                });
            }
            Some(outcome) = rx.recv() => {
                let origin = outcome.origin.as_str();
                let fingerprint = outcome.snapshot.fingerprint();
                let changed = state.apply(outcome);
                logging::info(
                    Domain::System,
                    "state_replaced",
                    obj(&[
                        ("origin", v_str(origin)),
                        ("fingerprint", v_str(&fingerprint)),
                        ("changed", serde_json::Value::Bool(changed)),
                    ]),
                );
                if let Some(view) = state.view(&cfg, today_utc(), now_ts()) {
                    println!("{}", render(&view, state.notice.as_deref(), cfg.series_tail_days));
                }
            }
        }
    }
}
