use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::logging::{self, obj, v_int, v_num, v_str, Domain};
use crate::snapshot::Snapshot;

pub mod http;
pub mod sample;

pub use http::HttpSnapshotSource;
pub use sample::sample_snapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connection, timeout or body read failure.
    Transport(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Body was JSON but not a usable snapshot.
    Schema(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Schema(_) => "schema",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "request failed: {}", e),
            Self::Status(code) => write!(f, "endpoint returned HTTP {}", code),
            Self::Schema(e) => write!(f, "invalid snapshot: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait SnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataOrigin {
    Live,
    /// Bundled sample data, with the failure that caused the substitution.
    Sample { reason: String },
}

impl DataOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataOrigin::Live => "live",
            DataOrigin::Sample { .. } => "sample",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub snapshot: Snapshot,
    pub origin: DataOrigin,
}

/// A snapshot source that never comes back empty-handed.
pub struct SnapshotFeed<S> {
    source: S,
    fallback: Snapshot,
}

impl<S: SnapshotSource + Send + Sync> SnapshotFeed<S> {
    /// Feed falling back to the bundled sample snapshot.
    pub fn new(source: S) -> Result<Self> {
        Ok(Self::with_fallback(source, sample_snapshot()?))
    }

    pub fn with_fallback(source: S, fallback: Snapshot) -> Self {
        Self { source, fallback }
    }

    pub fn fallback(&self) -> &Snapshot {
        &self.fallback
    }

    /// One fetch attempt. Any failure yields the fallback snapshot; there is
    /// no retry before the next scheduled call.
    pub async fn refresh(&self) -> FetchOutcome {
        match self.source.fetch().await {
            Ok(snapshot) => {
                logging::info(
                    Domain::Fetch,
                    "snapshot_fetched",
                    obj(&[
                        ("origin", v_str("live")),
                        ("fingerprint", v_str(&snapshot.fingerprint())),
                        ("records", v_int(snapshot.records.len() as i64)),
                        ("total_staking_power", v_num(snapshot.total_staking_power)),
                    ]),
                );
                FetchOutcome {
                    snapshot,
                    origin: DataOrigin::Live,
                }
            }
            Err(err) => {
                let mut fields = obj(&[
                    ("origin", v_str("sample")),
                    ("error_kind", v_str(err.kind())),
                    ("transport", Value::Bool(err.is_transport())),
                    ("error", v_str(&err.to_string())),
                    ("msg", v_str("live snapshot unavailable, showing sample data")),
                ]);
                if let FetchError::Status(code) = &err {
                    fields.insert("status".to_string(), v_int(*code as i64));
                }
                logging::warn(Domain::Fetch, "snapshot_fallback", fields);
                FetchOutcome {
                    snapshot: self.fallback.clone(),
                    origin: DataOrigin::Sample {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }
}

/// Shared flag that keeps at most one fetch outstanding across timer ticks.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

/// Held by the running fetch; releases the flag when dropped.
#[derive(Debug)]
pub struct InFlightTicket(Arc<AtomicBool>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while a previous ticket is still alive.
    pub fn try_begin(&self) -> Option<InFlightTicket> {
        if self.0.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(InFlightTicket(self.0.clone()))
        }
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
