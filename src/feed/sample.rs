use anyhow::{Context, Result};

use crate::snapshot::Snapshot;

const SAMPLE_JSON: &str = include_str!("../../data/sample_snapshot.json");

/// Bundled snapshot shown whenever the live endpoint is unusable.
pub fn sample_snapshot() -> Result<Snapshot> {
    serde_json::from_str(SAMPLE_JSON).context("bundled sample snapshot is malformed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::validate_payload;

    #[test]
    fn test_sample_parses_and_is_consistent() {
        let snap = sample_snapshot().unwrap();
        assert!(!snap.records.is_empty());
        assert_eq!(snap.lockup_count(), snap.records.len() as u64);

        let staked: f64 = snap.records.iter().map(|r| r.amount).sum();
        let power: f64 = snap.records.iter().map(|r| r.staking_power).sum();
        assert!((staked - snap.total_staked).abs() < 0.01);
        assert!((power - snap.total_staking_power).abs() < 0.01);
        assert!(snap.records.iter().all(|r| !r.is_degenerate()));
    }

    #[test]
    fn test_sample_passes_payload_validation() {
        let doc: serde_json::Value = serde_json::from_str(SAMPLE_JSON).unwrap();
        assert!(validate_payload(&doc).is_ok());
    }
}
