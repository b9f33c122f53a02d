use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fields that must be present on a payload before it is accepted.
pub const REQUIRED_FIELDS: [&str; 3] = ["records", "totalStakingPower", "totalStaked"];

/// One staking position as reported by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockupRecord {
    pub wallet: String,
    pub staking_power: f64,
    pub amount: f64,
    pub start_ts: i64,
    pub end_ts: i64,
    /// Stored as sent; never checked against `end_ts - start_ts`.
    #[serde(default)]
    pub duration: Option<i64>,
}

impl LockupRecord {
    /// A record with an empty or inverted window, a start before the Unix
    /// epoch, or no duration at all.
    pub fn is_degenerate(&self) -> bool {
        self.start_ts < 0 || self.end_ts <= self.start_ts || self.duration.is_none()
    }
}

/// Point-in-time aggregate of all lockups. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    pub total_staked: f64,
    #[serde(default)]
    pub total_lockup_count: Option<u64>,
    pub total_staking_power: f64,
    pub records: Vec<LockupRecord>,
}

impl Snapshot {
    /// Server-reported lockup count, or the record count when absent.
    pub fn lockup_count(&self) -> u64 {
        self.total_lockup_count.unwrap_or(self.records.len() as u64)
    }

    /// Seconds between `captured_at` and `now_ts`, if the capture time is known.
    pub fn age_secs(&self, now_ts: i64) -> Option<i64> {
        self.captured_at.map(|at| now_ts - at.timestamp())
    }

    /// Hex SHA-256 of the JSON encoding.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }

    /// Parse a snapshot from a JSON document, descending `key_path` first.
    pub fn from_envelope(doc: &Value, key_path: &str) -> Result<Self, String> {
        let payload = extract_payload(doc, key_path)?;
        validate_payload(payload)?;
        serde_json::from_value(payload.clone()).map_err(|e| format!("malformed snapshot: {}", e))
    }
}

/// Walk a dot-separated key path. An empty path returns the document itself.
pub fn extract_payload<'a>(doc: &'a Value, key_path: &str) -> Result<&'a Value, String> {
    let mut cur = doc;
    for key in key_path.split('.').filter(|k| !k.is_empty()) {
        cur = cur
            .get(key)
            .ok_or_else(|| format!("missing envelope key '{}' in path '{}'", key, key_path))?;
    }
    Ok(cur)
}

/// Reject payloads lacking required fields before handing them to serde,
/// so the error names the missing field.
pub fn validate_payload(payload: &Value) -> Result<(), String> {
    let obj = payload
        .as_object()
        .ok_or_else(|| "snapshot payload is not an object".to_string())?;
    for field in REQUIRED_FIELDS {
        match obj.get(field) {
            None | Some(Value::Null) => return Err(format!("missing field '{}'", field)),
            Some(_) => {}
        }
    }
    if !obj["records"].is_array() {
        return Err("field 'records' is not an array".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "capturedAt": "2024-05-01T12:00:00Z",
            "totalStaked": 1500.0,
            "totalLockupCount": 2,
            "totalStakingPower": 2100.5,
            "records": [
                {"wallet": "w1", "stakingPower": 1200.5, "amount": 1000.0,
                 "startTs": 1700000000, "endTs": 1731536000, "duration": 31536000},
                {"wallet": "w2", "stakingPower": 900.0, "amount": 500.0,
                 "startTs": 1700086400, "endTs": 1700086400}
            ]
        })
    }

    #[test]
    fn test_parses_nested_envelope() {
        let doc = json!({"data": {"snapshot": payload()}});
        let snap = Snapshot::from_envelope(&doc, "data.snapshot").unwrap();
        assert_eq!(snap.records.len(), 2);
        assert_eq!(snap.records[0].duration, Some(31_536_000));
        assert_eq!(snap.lockup_count(), 2);
        assert_eq!(snap.captured_at.unwrap().timestamp(), 1_714_564_800);
    }

    #[test]
    fn test_empty_key_path_uses_document_root() {
        let snap = Snapshot::from_envelope(&payload(), "").unwrap();
        assert_eq!(snap.total_staked, 1500.0);
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let mut p = payload();
        p.as_object_mut().unwrap().remove("totalStakingPower");
        let err = Snapshot::from_envelope(&p, "").unwrap_err();
        assert!(err.contains("totalStakingPower"), "{}", err);
    }

    #[test]
    fn test_missing_envelope_key_is_rejected() {
        let err = Snapshot::from_envelope(&json!({"result": {}}), "data").unwrap_err();
        assert!(err.contains("data"));
    }

    #[test]
    fn test_records_must_be_an_array() {
        let mut p = payload();
        p["records"] = json!({"w1": 1});
        assert!(Snapshot::from_envelope(&p, "").is_err());
    }

    #[test]
    fn test_degenerate_records() {
        let snap = Snapshot::from_envelope(&payload(), "").unwrap();
        assert!(!snap.records[0].is_degenerate());
        // zero-length window and no duration
        assert!(snap.records[1].is_degenerate());
    }

    #[test]
    fn test_pre_epoch_start_is_degenerate() {
        let mut p = payload();
        p["records"][0]["startTs"] = json!(-62_135_596_800i64);
        let snap = Snapshot::from_envelope(&p, "").unwrap();
        assert!(snap.records[0].is_degenerate());
    }

    #[test]
    fn test_lockup_count_falls_back_to_records() {
        let mut p = payload();
        p.as_object_mut().unwrap().remove("totalLockupCount");
        let snap = Snapshot::from_envelope(&p, "").unwrap();
        assert_eq!(snap.lockup_count(), 2);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Snapshot::from_envelope(&payload(), "").unwrap();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.records[0].amount += 1.0;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_age_is_relative_to_capture() {
        let snap = Snapshot::from_envelope(&payload(), "").unwrap();
        assert_eq!(snap.age_secs(1_714_564_800 + 60), Some(60));
    }
}
