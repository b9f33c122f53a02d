//! Structured JSONL logging for the dashboard poller.
//!
//! Every entry is one JSON object with a run id, a sequence number, a level,
//! a domain and a free-form `data` map. Entries go to stderr and, unless
//! `LOG_DIR=-`, to per-run files under `LOG_DIR/<RUN_ID>/`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fetch,   // Remote requests, fallbacks, staleness
    Metrics, // Header stats, thresholds
    Series,  // Day bucketing and cumulative walk
    System,  // Startup, timer, state replacement
    Profile, // Timings
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Metrics => "metrics",
            Domain::Series => "series",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
    metrics: Mutex<BufWriter<File>>,
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<RunSinks>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let sinks = if base == "-" {
            None
        } else {
            open_sinks(PathBuf::from(base).join(&run_id), &run_id)
        };
        RunContext { run_id, sinks }
    })
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<RunSinks> {
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir {}: {}", run_dir.display(), err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );

    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(RunSinks {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
        metrics: open("metrics.jsonl")?,
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["source", "origin", "fingerprint", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain, event, fields);
}

pub fn info(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Info, domain, event, fields);
}

pub fn warn(domain: Domain, event: &str, fields: Map<String, Value>) {
    log(Level::Warn, domain, event, fields);
}

fn build_record(
    run_id: &str,
    level: Level,
    domain: Domain,
    event: &str,
    fields: Map<String, Value>,
) -> Value {
    let (mut top, data) = split_fields(fields);
    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry)
}

fn emit_record(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = build_record(&ctx.run_id, level, domain, event, fields).to_string();

    if let Some(sinks) = &ctx.sinks {
        if domain == Domain::Metrics {
            write_line(&sinks.metrics, &line);
        }
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    eprintln!("{}", line);
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

pub fn v_int(n: i64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Emits a trace-level timing entry when dropped.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
