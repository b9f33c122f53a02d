use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use url::Url;

use crate::feed::{DataOrigin, FetchOutcome};
use crate::logging::{self, obj, v_int, v_num, v_str, Domain, ProfileScope};
use crate::metrics::{average_duration_secs, compute_percentile_thresholds, Thresholds, VotingCurve};
use crate::series::{cumulative_series, SeriesError, SeriesPoint};
use crate::snapshot::Snapshot;

#[derive(Clone, Debug)]
pub struct Config {
    pub snapshot_url: String,
    /// Dot-separated path to the snapshot inside the response envelope.
    pub snapshot_key_path: String,
    pub poll_secs: u64,
    pub http_timeout_secs: u64,
    pub stale_after_secs: i64,
    pub min_lockup_secs: i64,
    pub max_saturation_secs: i64,
    pub target_voting_pct: f64,
    pub series_tail_days: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            snapshot_url: std::env::var("SNAPSHOT_URL").unwrap_or_else(|_| "https://api.example.org/v1/lockups/snapshot".to_string()),
            snapshot_key_path: std::env::var("SNAPSHOT_KEY_PATH").unwrap_or_else(|_| "data".to_string()),
            poll_secs: std::env::var("POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(300),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            stale_after_secs: std::env::var("STALE_AFTER_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(86_400),
            min_lockup_secs: std::env::var("MIN_LOCKUP_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            max_saturation_secs: std::env::var("MAX_SATURATION_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(31_536_000),
            target_voting_pct: std::env::var("TARGET_VOTING_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(400.0),
            series_tail_days: std::env::var("SERIES_TAIL_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(7),
        }
    }

    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.snapshot_url).with_context(|| format!("invalid SNAPSHOT_URL '{}'", self.snapshot_url))
    }

    /// Zero would make the timer spin; clamp to one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn curve(&self) -> VotingCurve {
        VotingCurve {
            min_duration: self.min_lockup_secs,
            max_saturation_duration: self.max_saturation_secs,
            target_voting_pct: self.target_voting_pct,
        }
    }
}

pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Everything the report shows, recomputed from one snapshot.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub origin: DataOrigin,
    pub captured_at: Option<DateTime<Utc>>,
    pub total_staked: f64,
    pub total_staking_power: f64,
    pub lockup_count: u64,
    pub average_duration_days: Option<f64>,
    pub thresholds: Thresholds,
    pub series: Result<Vec<SeriesPoint>, SeriesError>,
    pub stale: bool,
}

impl DashboardView {
    pub fn derive(
        snapshot: &Snapshot,
        origin: DataOrigin,
        today: NaiveDate,
        now_ts: i64,
        stale_after_secs: i64,
    ) -> Self {
        let _scope = ProfileScope::with_context(
            "derive_view",
            &[("records", v_int(snapshot.records.len() as i64))],
        );

        let thresholds = compute_percentile_thresholds(&snapshot.records);
        let series = cumulative_series(&snapshot.records, today);
        let stale = snapshot
            .age_secs(now_ts)
            .map(|age| age > stale_after_secs)
            .unwrap_or(false);

        logging::info(
            Domain::Metrics,
            "thresholds",
            obj(&[
                ("origin", v_str(origin.as_str())),
                ("top1", v_num(thresholds.top1)),
                ("top10", v_num(thresholds.top10)),
                ("records", v_int(snapshot.records.len() as i64)),
            ]),
        );
        match &series {
            Ok(points) => logging::log(
                logging::Level::Debug,
                Domain::Series,
                "series_built",
                obj(&[
                    ("days", v_int(points.len() as i64)),
                    ("first_day", v_str(&points.first().map(|p| p.day.to_string()).unwrap_or_default())),
                    ("active_staking_power", v_num(points.last().map(|p| p.staking_power).unwrap_or(0.0))),
                ]),
            ),
            Err(err) => logging::warn(
                Domain::Series,
                "series_unavailable",
                obj(&[("error", v_str(&err.to_string()))]),
            ),
        }
        if stale {
            logging::warn(
                Domain::Fetch,
                "snapshot_stale",
                obj(&[
                    ("origin", v_str(origin.as_str())),
                    ("age_secs", v_int(snapshot.age_secs(now_ts).unwrap_or(0))),
                    ("stale_after_secs", v_int(stale_after_secs)),
                ]),
            );
        }

        Self {
            origin,
            captured_at: snapshot.captured_at,
            total_staked: snapshot.total_staked,
            total_staking_power: snapshot.total_staking_power,
            lockup_count: snapshot.lockup_count(),
            average_duration_days: average_duration_secs(&snapshot.records).map(|s| s / 86_400.0),
            thresholds,
            series,
            stale,
        }
    }
}

/// The single mutable slot the poller owns.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub current: Option<FetchOutcome>,
    pub loading: bool,
    /// User-visible notice, set while sample data is displayed.
    pub notice: Option<String>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fetch as outstanding. The previous snapshot stays visible.
    pub fn begin_refresh(&mut self) {
        self.loading = true;
    }

    /// Replace the current snapshot wholesale. Returns true when the content
    /// differs from what was shown before.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        let changed = self
            .current
            .as_ref()
            .map(|prev| prev.snapshot.fingerprint() != outcome.snapshot.fingerprint() || prev.origin != outcome.origin)
            .unwrap_or(true);

        self.notice = match &outcome.origin {
            DataOrigin::Live => None,
            DataOrigin::Sample { reason } => Some(format!("Showing sample data ({})", reason)),
        };
        self.loading = false;
        self.current = Some(outcome);
        changed
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.current.as_ref().map(|o| &o.snapshot)
    }

    pub fn view(&self, cfg: &Config, today: NaiveDate, now_ts: i64) -> Option<DashboardView> {
        self.current.as_ref().map(|o| {
            DashboardView::derive(&o.snapshot, o.origin.clone(), today, now_ts, cfg.stale_after_secs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::sample_snapshot;

    fn cfg() -> Config {
        let mut c = Config::from_env();
        c.stale_after_secs = 86_400;
        c
    }

    fn live(snapshot: Snapshot) -> FetchOutcome {
        FetchOutcome { snapshot, origin: DataOrigin::Live }
    }

    #[test]
    fn test_config_helpers() {
        let mut c = cfg();
        c.poll_secs = 0;
        assert_eq!(c.poll_interval(), Duration::from_secs(1));
        c.snapshot_url = "not a url".to_string();
        assert!(c.endpoint().is_err());
        c.snapshot_url = "http://localhost:8080/snapshot".to_string();
        assert_eq!(c.endpoint().unwrap().port(), Some(8080));
        c.min_lockup_secs = 10;
        assert_eq!(c.curve().min_duration, 10);
    }

    #[test]
    fn test_apply_replaces_and_sets_notice() {
        let mut state = DashboardState::new();
        assert!(state.snapshot().is_none());
        state.begin_refresh();
        assert!(state.loading);

        let sample = sample_snapshot().unwrap();
        let changed = state.apply(FetchOutcome {
            snapshot: sample.clone(),
            origin: DataOrigin::Sample { reason: "endpoint returned HTTP 500".into() },
        });
        assert!(changed);
        assert!(!state.loading);
        assert!(state.notice.as_deref().unwrap().contains("HTTP 500"));

        let mut fresh = sample.clone();
        fresh.records.truncate(3);
        assert!(state.apply(live(fresh.clone())));
        assert!(state.notice.is_none());
        assert_eq!(state.snapshot().unwrap().records.len(), 3);

        // identical content is not a change
        assert!(!state.apply(live(fresh)));
    }

    #[test]
    fn test_view_recomputes_from_records() {
        let mut state = DashboardState::new();
        let snap = sample_snapshot().unwrap();
        let captured = snap.captured_at.unwrap();
        state.apply(live(snap.clone()));

        let today = captured.date_naive();
        let view = state.view(&cfg(), today, captured.timestamp() + 60).unwrap();
        assert_eq!(view.total_staked, snap.total_staked);
        assert_eq!(view.lockup_count, snap.records.len() as u64);
        assert_eq!(view.thresholds, compute_percentile_thresholds(&snap.records));
        assert!(!view.stale);
        let series = view.series.unwrap();
        assert_eq!(series.last().unwrap().day, today);
        assert!(view.average_duration_days.unwrap() >= 30.0);
    }

    #[test]
    fn test_view_flags_stale_snapshot() {
        let snap = sample_snapshot().unwrap();
        let captured = snap.captured_at.unwrap().timestamp();
        let view = DashboardView::derive(
            &snap,
            DataOrigin::Live,
            snap.captured_at.unwrap().date_naive(),
            captured + 2 * 86_400,
            86_400,
        );
        assert!(view.stale);
    }

    #[test]
    fn test_view_of_empty_snapshot_reports_no_data() {
        let mut snap = sample_snapshot().unwrap();
        snap.records.clear();
        let view = DashboardView::derive(&snap, DataOrigin::Live, today_utc(), now_ts(), 86_400);
        assert_eq!(view.series.unwrap_err(), SeriesError::EmptyDataset);
        assert_eq!(view.thresholds, Thresholds::default());
        assert_eq!(view.average_duration_days, None);
    }
}
