//! # File I/O Module
//!
//! Persistence for the only state the engine owns: the published constants
//! history. A history file is replaced atomically (sibling `.tmp` file,
//! fsync, rename) and guarded by a publisher lock: an fs2 exclusive lock on a
//! `.lock` sidecar that also names the holder.
//!
//! ## File Format
//!
//! JSON [`HistoryDocument`]: a schema version, a save timestamp and every
//! published constants version, oldest first.
//!
//! ## Example
//!
//! ```rust,no_run
//! use signcalc_core::file_io::{load_constants_store, save_constants_store, FileLock};
//! use signcalc_core::standards::store::ConstantsStore;
//! use std::path::Path;
//!
//! let path = Path::new("constants.json");
//! let lock = FileLock::acquire(path, "calibration-job").unwrap();
//! let store = ConstantsStore::default();
//! save_constants_store(&store, path).unwrap();
//! let reloaded = load_constants_store(path).unwrap();
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{CalcError, CalcResult};
use crate::standards::constants::ConstantsTable;
use crate::standards::store::ConstantsStore;

/// Schema of history files written by this build
pub const SCHEMA_VERSION: &str = "0.1.0";

/// A lock older than this is considered abandoned
const STALE_AFTER_HOURS: i64 = 6;

/// On-disk constants history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub schema_version: String,
    pub saved_at: DateTime<Utc>,
    /// Oldest first
    pub tables: Vec<ConstantsTable>,
}

// ============================================================================
// Publisher lock
// ============================================================================

/// Who holds a history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockHolder {
    pub holder: String,
    pub host: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current(holder: impl Into<String>) -> Self {
        LockHolder {
            holder: holder.into(),
            host: host_name(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// Abandoned locks may be taken over: too old, or left by a dead
    /// process on this host.
    fn is_abandoned(&self) -> bool {
        if Utc::now() - self.acquired_at > Duration::hours(STALE_AFTER_HOURS) {
            return true;
        }
        self.host == host_name() && !process_alive(self.pid)
    }
}

fn host_name() -> String {
    ["HOSTNAME", "COMPUTERNAME", "HOST"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// No cheap liveness check elsewhere; rely on the age limit
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Exclusive publisher lock on a history file, released on drop.
pub struct FileLock {
    target: PathBuf,
    sidecar: PathBuf,
    // Holds the fs2 lock for the guard's lifetime
    _handle: File,
    pub holder: LockHolder,
}

impl FileLock {
    /// Take the lock on `path` for `holder`.
    ///
    /// Fails with [`CalcError::FileLocked`] when a live publisher holds it.
    pub fn acquire(path: &Path, holder: impl Into<String>) -> CalcResult<Self> {
        let sidecar = sibling(path, "lock");
        if let Some(existing) = read_holder(&sidecar) {
            if !existing.is_abandoned() {
                return Err(locked(path, &existing));
            }
            warn!(path = %path.display(), holder = %existing.holder, "taking over abandoned lock");
        }

        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&sidecar)
            .map_err(io_error("open lock", &sidecar))?;
        if handle.try_lock_exclusive().is_err() {
            // Raced with another publisher between the read and the open
            return Err(match read_holder(&sidecar) {
                Some(existing) => locked(path, &existing),
                None => CalcError::file_locked(path.display().to_string(), "another publisher", "unknown"),
            });
        }

        let holder = LockHolder::current(holder);
        let body = serde_json::to_vec_pretty(&holder).map_err(CalcError::serialization)?;
        handle.set_len(0).map_err(io_error("truncate lock", &sidecar))?;
        handle.write_all(&body).map_err(io_error("write lock", &sidecar))?;
        handle.sync_all().map_err(io_error("sync lock", &sidecar))?;
        debug!(path = %path.display(), holder = %holder.holder, "lock acquired");

        Ok(FileLock {
            target: path.to_path_buf(),
            sidecar,
            _handle: handle,
            holder,
        })
    }

    /// Current live holder of `path`, if any.
    pub fn check(path: &Path) -> Option<LockHolder> {
        read_holder(&sibling(path, "lock")).filter(|h| !h.is_abandoned())
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.sidecar);
    }
}

fn locked(path: &Path, holder: &LockHolder) -> CalcError {
    CalcError::file_locked(
        path.display().to_string(),
        format!("{}@{} (pid {})", holder.holder, holder.host, holder.pid),
        holder.acquired_at.to_rfc3339(),
    )
}

/// Unreadable or empty sidecars count as no holder
fn read_holder(sidecar: &Path) -> Option<LockHolder> {
    let text = fs::read_to_string(sidecar).ok()?;
    serde_json::from_str(&text).ok()
}

/// `<path>.<suffix>`, keeping the original extension
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error<'a>(operation: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> CalcError + 'a {
    move |e| CalcError::file_error(operation, path.display().to_string(), e.to_string())
}

// ============================================================================
// JSON documents
// ============================================================================

/// Replace `path` with `value` as pretty JSON, never leaving a partial file.
pub fn save_json_atomic<T: Serialize>(value: &T, path: &Path) -> CalcResult<()> {
    let body = serde_json::to_vec_pretty(value).map_err(CalcError::serialization)?;
    let tmp = sibling(path, "tmp");

    let written = File::create(&tmp)
        .map_err(io_error("create temp file", &tmp))
        .and_then(|mut f| {
            f.write_all(&body).map_err(io_error("write temp file", &tmp))?;
            f.sync_all().map_err(io_error("sync temp file", &tmp))
        })
        .and_then(|_| fs::rename(&tmp, path).map_err(io_error("replace", path)));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Read and parse a JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> CalcResult<T> {
    let text = fs::read_to_string(path).map_err(io_error("read", path))?;
    serde_json::from_str(&text).map_err(|e| CalcError::SerializationError {
        reason: format!("{}: {}", path.display(), e),
    })
}

/// Write every version held by `store`.
pub fn save_constants_store(store: &ConstantsStore, path: &Path) -> CalcResult<()> {
    let document = HistoryDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        saved_at: Utc::now(),
        tables: store.history()?.iter().map(|t| ConstantsTable::clone(t)).collect(),
    };
    save_json_atomic(&document, path)
}

/// Rebuild a store from a history file.
///
/// Rejects files whose schema this build cannot read with
/// [`CalcError::VersionMismatch`].
pub fn load_constants_store(path: &Path) -> CalcResult<ConstantsStore> {
    let document: HistoryDocument = load_json(path)?;
    check_schema(&document.schema_version)?;
    ConstantsStore::from_history(document.tables)
}

fn major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.').map(str::parse::<u32>);
    match (parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor))) => Some((major, minor)),
        _ => None,
    }
}

/// Same major; while in 0.x, a newer minor is unreadable.
fn check_schema(file_version: &str) -> CalcResult<()> {
    let readable = match (major_minor(file_version), major_minor(SCHEMA_VERSION)) {
        (Some((fm, fmin)), Some((cm, cmin))) => fm == cm && (cm > 0 || fmin <= cmin),
        _ => false,
    };
    if readable {
        Ok(())
    } else {
        Err(CalcError::VersionMismatch {
            file_version: file_version.to_string(),
            expected_version: SCHEMA_VERSION.to_string(),
        })
    }
}
