//! Plain-text rendering of a [`DashboardView`].

use std::fmt::Write;

use crate::feed::DataOrigin;
use crate::metrics::format_number;
use crate::state::DashboardView;

const BAR_WIDTH: usize = 30;

pub fn render(view: &DashboardView, notice: Option<&str>, tail_days: usize) -> String {
    let mut out = String::new();

    let source = match &view.origin {
        DataOrigin::Live => "live data",
        DataOrigin::Sample { .. } => "SAMPLE DATA",
    };
    let captured = view
        .captured_at
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(out, "== Lockup staking stats ({}, captured {}) ==", source, captured);
    if let Some(notice) = notice {
        let _ = writeln!(out, "! {}", notice);
    }
    if view.stale {
        let _ = writeln!(out, "! snapshot is older than the staleness limit");
    }

    let avg = view
        .average_duration_days
        .map(|d| format!("{} days", format_number(d)))
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Total staked         {}", format_number(view.total_staked));
    let _ = writeln!(out, "Total staking power  {}", format_number(view.total_staking_power));
    let _ = writeln!(out, "Lockups              {}", format_number(view.lockup_count as f64));
    let _ = writeln!(out, "Avg lock duration    {}", avg);

    out.push('\n');
    let scale = view.thresholds.top1.max(view.thresholds.top10);
    let _ = writeln!(out, "Top 1%  threshold  {} {}", bar(view.thresholds.top1, scale), format_number(view.thresholds.top1));
    let _ = writeln!(out, "Top 10% threshold  {} {}", bar(view.thresholds.top10, scale), format_number(view.thresholds.top10));

    out.push('\n');
    match &view.series {
        Ok(points) => {
            let skip = points.len().saturating_sub(tail_days);
            let _ = writeln!(out, "{:<12} {:>20} {:>20}", "day", "staking power", "staked");
            for p in &points[skip..] {
                let _ = writeln!(
                    out,
                    "{:<12} {:>20} {:>20}",
                    p.day.to_string(),
                    format_number(p.staking_power),
                    format_number(p.amount)
                );
            }
        }
        Err(err) => {
            let _ = writeln!(out, "[no data] {}", err);
        }
    }
    out
}

fn bar(value: f64, scale: f64) -> String {
    let filled = if scale > 0.0 && value.is_finite() {
        ((value / scale) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize
    } else {
        0
    };
    format!("[{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::sample_snapshot;

    fn sample_view(origin: DataOrigin) -> DashboardView {
        let snap = sample_snapshot().unwrap();
        let captured = snap.captured_at.unwrap();
        DashboardView::derive(&snap, origin, captured.date_naive(), captured.timestamp(), 86_400)
    }

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(10.0, 10.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(bar(0.0, 10.0), format!("[{}]", " ".repeat(BAR_WIDTH)));
        assert_eq!(bar(5.0, 0.0), format!("[{}]", " ".repeat(BAR_WIDTH)));
    }

    #[test]
    fn test_live_report_has_tiles_and_tail() {
        let text = render(&sample_view(DataOrigin::Live), None, 3);
        assert!(text.contains("live data"));
        assert!(text.contains("Total staked         62,322.84"));
        assert!(text.contains("2025-07-15"));
        assert!(!text.contains("SAMPLE"));
        // header + 3 days
        let rows = text.lines().skip_while(|l| !l.starts_with("day")).count();
        assert_eq!(rows, 4);
    }

    #[test]
    fn test_sample_report_carries_notice() {
        let origin = DataOrigin::Sample { reason: "endpoint returned HTTP 500".into() };
        let text = render(&sample_view(origin), Some("Showing sample data (endpoint returned HTTP 500)"), 7);
        assert!(text.contains("SAMPLE DATA"));
        assert!(text.contains("! Showing sample data"));
    }

    #[test]
    fn test_empty_snapshot_renders_no_data_panel() {
        let mut snap = sample_snapshot().unwrap();
        snap.records.clear();
        let view = DashboardView::derive(&snap, DataOrigin::Live, chrono::Utc::now().date_naive(), 0, 86_400);
        let text = render(&view, None, 7);
        assert!(text.contains("[no data] no lockup records"));
    }
}
