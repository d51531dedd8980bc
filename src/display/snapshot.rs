//! Snapshot display formatting
//!
//! Formats snapshots for terminal output in table and detail views.

use chrono::{DateTime, Utc};
use tabled::{settings::Style, Table, Tabled};

use crate::backup::{SnapshotInfo, SnapshotKind};

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    filename: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "WAL")]
    wal: &'static str,
    #[tabled(rename = "Description")]
    description: String,
}

/// Format a list of snapshots as a table
pub fn format_snapshot_table(snapshots: &[SnapshotInfo], now: DateTime<Utc>) -> String {
    if snapshots.is_empty() {
        return "No backups found.".to_string();
    }

    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .enumerate()
        .map(|(i, s)| SnapshotRow {
            index: i + 1,
            filename: s.filename.clone(),
            kind: s.kind.to_string(),
            age: format_age(now.signed_duration_since(s.created_at)),
            size: format_size(s.size_bytes),
            wal: if s.has_wal { "yes" } else { "" },
            description: s.description.clone().unwrap_or_default(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format one snapshot as a detail block
pub fn format_snapshot_details(snapshot: &SnapshotInfo, now: DateTime<Utc>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Name:        {}\n", snapshot.filename));
    output.push_str(&format!("Location:    {}\n", snapshot.path.display()));
    output.push_str(&format!(
        "Created:     {} ({} ago)\n",
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_age(now.signed_duration_since(snapshot.created_at))
    ));
    output.push_str(&format!("Size:        {}\n", format_size(snapshot.size_bytes)));
    output.push_str(&format!(
        "WAL:         {}\n",
        if snapshot.has_wal { "Yes" } else { "No" }
    ));
    output.push_str(&format!(
        "Kind:        {}\n",
        match snapshot.kind {
            SnapshotKind::Standard => "Backup",
            SnapshotKind::PreRestore => "Pre-restore safety snapshot",
        }
    ));
    if let Some(description) = &snapshot.description {
        output.push_str(&format!("Description: {}\n", description));
    }
    output
}

/// Format a duration in compact human-readable form
pub fn format_age(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size using binary units
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;

    fn sample(kind: SnapshotKind, description: Option<&str>) -> SnapshotInfo {
        SnapshotInfo {
            filename: "backup_2025-11-27T14-30-22-456Z.db".to_string(),
            path: PathBuf::from("/var/backups/backup_2025-11-27T14-30-22-456Z.db"),
            created_at: Utc.with_ymd_and_hms(2025, 11, 27, 14, 30, 22).unwrap(),
            size_bytes: 1536,
            description: description.map(str::to_string),
            kind,
            has_wal: true,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 + 512 * 1024), "1.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::seconds(42)), "42s");
        assert_eq!(format_age(Duration::minutes(5)), "5m");
        assert_eq!(format_age(Duration::hours(3)), "3h");
        assert_eq!(format_age(Duration::days(2)), "2d");
        assert_eq!(format_age(Duration::days(65)), "2mo");
        assert_eq!(format_age(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_snapshot_table() {
        let now = Utc.with_ymd_and_hms(2025, 11, 27, 16, 30, 22).unwrap();
        let table = format_snapshot_table(&[sample(SnapshotKind::Standard, Some("nightly"))], now);

        assert!(table.contains("backup_2025-11-27T14-30-22-456Z.db"));
        assert!(table.contains("1.5 KB"));
        assert!(table.contains("2h"));
        assert!(table.contains("nightly"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_snapshot_table(&[], Utc::now()), "No backups found.");
    }

    #[test]
    fn test_snapshot_details() {
        let now = Utc.with_ymd_and_hms(2025, 11, 28, 14, 30, 22).unwrap();
        let details = format_snapshot_details(&sample(SnapshotKind::PreRestore, None), now);

        assert!(details.contains("Pre-restore safety snapshot"));
        assert!(details.contains("2025-11-27 14:30:22 UTC (1d ago)"));
        assert!(!details.contains("Description"));
    }
}
