//! Terminal rendering and the status file.

use std::path::Path;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use swx_engine::{CycleReport, IndexOutcome, RiskLevel, StatusSnapshot};

/// Write `snapshot` as pretty JSON, replacing the file atomically.
pub async fn write_status_file(path: &Path, snapshot: &StatusSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize status")?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Read a status file written by a running monitor.
pub async fn read_status_file(path: &Path) -> Result<StatusSnapshot> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read status file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid status file {}", path.display()))
}

fn paint(level: RiskLevel, text: &str) -> ColoredString {
    match level {
        RiskLevel::Severe => text.red().bold(),
        RiskLevel::Warning => text.yellow().bold(),
        RiskLevel::Watch => text.yellow(),
        RiskLevel::Nominal => text.green(),
        RiskLevel::Unknown => text.dimmed(),
    }
}

/// Render the status table.
pub fn status_table(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  {}\n",
        "SPACE WEATHER STATUS".bold().cyan(),
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("{}\n", "─".repeat(78)));
    out.push_str(&format!(
        "{:<14} {:<9} {:<18} {:<12} {}\n",
        "Index".bold(),
        "Level".bold(),
        "Value".bold(),
        "Band".bold(),
        "Observed".bold(),
    ));

    for status in &snapshot.indices {
        let level = paint(
            status.current_level,
            &format!("{:<9}", status.current_level.as_str()),
        );
        let observed = status.observed_at.map_or_else(
            || "never".to_string(),
            |at| at.format("%Y-%m-%d %H:%M").to_string(),
        );
        let stale = if status.stale { " (stale)".dimmed().to_string() } else { String::new() };

        out.push_str(&format!(
            "{:<14} {} {:<18} {:<12} {observed}{stale}\n",
            status.index_name,
            level,
            status.display_value.as_deref().unwrap_or("-"),
            status.label.as_deref().unwrap_or("-"),
        ));
    }

    out.push_str(&format!("{}\n", "─".repeat(78)));
    out.push_str(&format!(
        "Highest: {}   Stale: {}/{}\n",
        paint(snapshot.highest_level(), snapshot.highest_level().as_str()),
        snapshot.stale_count(),
        snapshot.indices.len()
    ));
    out
}

/// One-line summaries of what a cycle did, for the terminal.
pub fn cycle_summary(report: &CycleReport) -> String {
    let mut out = String::new();
    for index in &report.indices {
        if let IndexOutcome::Missing { reason, .. } = &index.outcome {
            out.push_str(&format!(
                "{} {}: {reason}\n",
                "!".yellow().bold(),
                index.index_name
            ));
        }
    }
    for record in &report.dispatches {
        let mark = if record.result.is_sent() {
            "✓".green()
        } else {
            "✗".red()
        };
        out.push_str(&format!("{mark} {}\n", record.event.title()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use swx_engine::IndexStatus;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            generated_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            indices: vec![
                IndexStatus {
                    index_name: "Bz".to_string(),
                    unit: "nT".to_string(),
                    current_level: RiskLevel::Warning,
                    value: Some(-12.5),
                    display_value: Some("-12.5 nT".to_string()),
                    observed_at: Some(Utc.with_ymd_and_hms(2025, 5, 1, 11, 58, 0).unwrap()),
                    entered_at: Some(Utc.with_ymd_and_hms(2025, 5, 1, 11, 0, 0).unwrap()),
                    label: Some("G3".to_string()),
                    stale: false,
                    stale_after_secs: Some(900),
                },
                IndexStatus {
                    index_name: "Dst".to_string(),
                    unit: "nT".to_string(),
                    current_level: RiskLevel::Unknown,
                    value: None,
                    display_value: None,
                    observed_at: None,
                    entered_at: None,
                    label: None,
                    stale: true,
                    stale_after_secs: Some(7200),
                },
            ],
        }
    }

    #[test]
    fn test_status_table_rows() {
        colored::control::set_override(false);
        let table = status_table(&snapshot());
        assert!(table.contains("-12.5 nT"));
        assert!(table.contains("G3"));
        assert!(table.contains("never (stale)"));
        assert!(table.contains("Highest: Warning   Stale: 1/2"));
    }

    #[tokio::test]
    async fn test_status_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        write_status_file(&path, &snapshot()).await.unwrap();
        assert!(!dir.path().join("status.json.tmp").exists());

        let loaded = read_status_file(&path).await.unwrap();
        assert_eq!(loaded, snapshot());
    }
}
