//! Snapshot store
//!
//! Owns the backup directory: naming, companion-file paths, sidecar metadata
//! and the newest-first catalog. The store performs no locking; callers in
//! [`super::manager`] hold the directory lock around every mutation.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BackupError, BackupResult};
use crate::storage::file_io::{read_json_required, write_json_atomic};

/// Prefix shared by every snapshot main file
pub const BACKUP_PREFIX: &str = "backup_";
/// Extension of snapshot main files
pub const BACKUP_EXTENSION: &str = ".db";
/// Marker distinguishing pre-restore safety snapshots
pub const PRE_RESTORE_MARKER: &str = "-pre-restore";
/// Write-ahead log companion suffix
pub const WAL_SUFFIX: &str = "-wal";
/// Shared-memory index companion suffix
pub const SHM_SUFFIX: &str = "-shm";
/// Sidecar metadata suffix
pub const METADATA_SUFFIX: &str = ".json";

/// ISO 8601 with `:` and `.` replaced so names are filesystem safe
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// What produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKind {
    /// Created by an explicit backup
    Standard,
    /// Taken automatically right before a restore overwrote the live database
    PreRestore,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "backup"),
            Self::PreRestore => write!(f, "pre-restore"),
        }
    }
}

/// Metadata about a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Main file name, also the sort key
    pub filename: String,
    /// Full path to the main file
    pub path: PathBuf,
    /// When the snapshot was created
    pub created_at: DateTime<Utc>,
    /// Size of the main file in bytes
    pub size_bytes: u64,
    /// Free-text description from the sidecar, if any
    pub description: Option<String>,
    /// Ordinary backup or pre-restore safety snapshot
    pub kind: SnapshotKind,
    /// Whether a write-ahead log was captured alongside the main file
    pub has_wal: bool,
}

/// Sidecar record stored next to a snapshot as `<name>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Directory of snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Backup directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the backup directory exists yet
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Create the backup directory and any missing parents
    pub fn ensure_directory(&self) -> BackupResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| BackupError::Io(format!("Failed to create backup directory: {}", e)))
    }

    /// Path of a snapshot's main file
    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Path of a snapshot's write-ahead log companion
    pub fn wal_path(&self, filename: &str) -> PathBuf {
        companion_path(&self.path(filename), WAL_SUFFIX)
    }

    /// Path of a snapshot's sidecar metadata
    pub fn metadata_path(&self, filename: &str) -> PathBuf {
        companion_path(&self.path(filename), METADATA_SUFFIX)
    }

    /// Produce an unused snapshot name for `now`
    ///
    /// Names carry millisecond precision. When a name is already taken the
    /// timestamp advances one millisecond at a time, so names stay unique and
    /// still sort chronologically.
    pub fn generate_name(&self, kind: SnapshotKind, now: DateTime<Utc>) -> String {
        let mut timestamp = now;
        loop {
            let name = snapshot_name(kind, timestamp);
            if !self.path(&name).exists() {
                return name;
            }
            timestamp += Duration::milliseconds(1);
        }
    }

    /// List all snapshots, newest first
    ///
    /// Returns an empty list when the directory does not exist. Entries whose
    /// metadata cannot be read are skipped; a corrupt sidecar only drops the
    /// description.
    pub fn list(&self) -> BackupResult<Vec<SnapshotInfo>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();

        for entry in fs::read_dir(&self.dir)
            .map_err(|e| BackupError::Io(format!("Failed to read backup directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| BackupError::Io(format!("Failed to read directory entry: {}", e)))?;

            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_snapshot_filename(&filename) {
                continue;
            }

            match self.read_info(&filename) {
                Ok(info) => snapshots.push(info),
                Err(e) => warn!(filename = %filename, error = %e, "Skipping unreadable snapshot"),
            }
        }

        sort_newest_first(&mut snapshots);

        Ok(snapshots)
    }

    /// Look up a single snapshot by main file name
    pub fn get(&self, filename: &str) -> BackupResult<Option<SnapshotInfo>> {
        if !is_snapshot_filename(filename) || !self.path(filename).is_file() {
            return Ok(None);
        }

        self.read_info(filename).map(Some).map_err(|e| {
            BackupError::Io(format!("Failed to read backup {}: {}", filename, e))
        })
    }

    /// Read filesystem metadata and the optional sidecar for one snapshot
    ///
    /// `created_at` is the instant embedded in the filename, so it always
    /// agrees with the listing order; file times are only consulted for
    /// names without a parseable timestamp.
    pub fn read_info(&self, filename: &str) -> io::Result<SnapshotInfo> {
        let path = self.path(filename);
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        let created_at = parse_snapshot_timestamp(filename).unwrap_or_else(|| {
            metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_default()
        });

        Ok(SnapshotInfo {
            filename: filename.to_string(),
            description: self.read_metadata(filename).map(|m| m.description),
            kind: snapshot_kind(filename),
            has_wal: self.wal_path(filename).is_file(),
            size_bytes: metadata.len(),
            created_at,
            path,
        })
    }

    /// Write the sidecar for a snapshot
    pub fn write_metadata(
        &self,
        filename: &str,
        description: &str,
        created_at: DateTime<Utc>,
    ) -> BackupResult<()> {
        let metadata = SnapshotMetadata {
            description: description.to_string(),
            created_at,
        };
        write_json_atomic(self.metadata_path(filename), &metadata)
    }

    /// Read the sidecar for a snapshot, logging and ignoring failures
    pub fn read_metadata(&self, filename: &str) -> Option<SnapshotMetadata> {
        let path = self.metadata_path(filename);
        if !path.exists() {
            return None;
        }

        match read_json_required(&path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(filename = %filename, error = %e, "Ignoring unreadable backup metadata");
                None
            }
        }
    }
}

/// Append a companion suffix to a file path (`site.db` -> `site.db-wal`)
pub fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Build the snapshot name for a timestamp
pub fn snapshot_name(kind: SnapshotKind, timestamp: DateTime<Utc>) -> String {
    let marker = match kind {
        SnapshotKind::Standard => "",
        SnapshotKind::PreRestore => PRE_RESTORE_MARKER,
    };
    format!(
        "{}{}-{:03}Z{}{}",
        BACKUP_PREFIX,
        timestamp.format(TIMESTAMP_FORMAT),
        timestamp.timestamp_subsec_millis(),
        marker,
        BACKUP_EXTENSION
    )
}

/// Whether a directory entry is a snapshot main file (not a companion)
pub fn is_snapshot_filename(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_EXTENSION)
        && name.len() > BACKUP_PREFIX.len() + BACKUP_EXTENSION.len()
}

/// Classify a snapshot by its name
pub fn snapshot_kind(name: &str) -> SnapshotKind {
    let stem = name.strip_suffix(BACKUP_EXTENSION).unwrap_or(name);
    if stem.ends_with(PRE_RESTORE_MARKER) {
        SnapshotKind::PreRestore
    } else {
        SnapshotKind::Standard
    }
}

/// Reject names that could address anything outside the backup directory
pub fn validate_filename(name: &str) -> BackupResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(BackupError::Validation(format!(
            "Invalid backup name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Parse the timestamp embedded in a snapshot name
///
/// Accepts `backup_YYYY-MM-DDTHH-MM-SS-mmmZ.db`, the pre-restore variant,
/// and the second-precision form without milliseconds.
pub fn parse_snapshot_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_EXTENSION)?;
    let stem = stem.strip_suffix(PRE_RESTORE_MARKER).unwrap_or(stem);
    let body = stem.strip_suffix('Z').unwrap_or(stem);

    if let Ok(naive) = NaiveDateTime::parse_from_str(body, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }

    let (seconds, millis) = body.rsplit_once('-')?;
    if millis.len() != 3 {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(seconds, TIMESTAMP_FORMAT).ok()?;

    Some(naive.and_utc() + Duration::milliseconds(millis))
}

fn sort_newest_first(snapshots: &mut [SnapshotInfo]) {
    snapshots.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.filename.cmp(&a.filename))
    });
    debug!(count = snapshots.len(), "Listed snapshots");
}
