//! Leased run lock.
//!
//! The lease is a small JSON file. A new lease is written to a private temp
//! file and hard-linked into place, which fails if a lease already exists,
//! so the lease file is never seen half-written and exactly one caller wins.
//! A lease past its `expires_at` belongs to a run that crashed or overran.
//! It is broken by renaming it to a private tombstone and checking that the
//! tombstone still holds the stale lease; if another run replaced it in the
//! meantime, that lease is put back.

use crate::error::LeaseError;
use crate::{Result, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Publish/break rounds before giving up on a contended lease.
const MAX_ATTEMPTS: usize = 4;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Contents of the lease file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct RunLease {
    path: PathBuf,
    ttl: Duration,
    holder: String,
}

/// Proof of a held lease. Release it when the run ends; if the process
/// dies instead, the lease simply expires.
#[derive(Debug)]
#[must_use = "a lease that is never released blocks runs until it expires"]
pub struct LeaseGuard {
    path: PathBuf,
    record: LeaseRecord,
}

/// What is currently at the lease path.
enum Existing {
    Missing,
    Lease { record: LeaseRecord, bytes: Vec<u8> },
    /// Not a lease record. `modified` is the file's mtime when readable.
    Unreadable {
        bytes: Vec<u8>,
        modified: Option<DateTime<Utc>>,
    },
}

/// Result of moving a stale lease out of the way.
enum Broken {
    /// The stale lease is gone; the path is free to publish.
    Cleared,
    /// Another run replaced the stale lease first; its lease was put back.
    Replaced(Option<LeaseRecord>),
}

impl RunLease {
    /// A lease at `path` held for `ttl`. The holder id is derived from the
    /// process id.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_holder(path, ttl, format!("pid-{}", std::process::id()))
    }

    pub fn with_holder(path: impl Into<PathBuf>, ttl: Duration, holder: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ttl,
            holder: holder.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lease, breaking it first if the current holder's lease has
    /// expired.
    ///
    /// A file that is not a lease record counts as held until its mtime is
    /// one TTL old.
    pub async fn acquire(&self, now: DateTime<Utc>) -> std::result::Result<LeaseGuard, LeaseError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }

        let record = LeaseRecord {
            holder: self.holder.clone(),
            acquired_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        for _ in 0..MAX_ATTEMPTS {
            if self.publish(&record).await? {
                return Ok(self.granted(record));
            }

            let stale = match inspect(&self.path).await? {
                Existing::Missing => continue,
                Existing::Lease { record: current, bytes } => {
                    if !current.is_expired(now) {
                        log::info!(
                            "[WCI] lock: lease held by {} until {}",
                            current.holder,
                            current.expires_at
                        );
                        return Err(held(current));
                    }
                    log::warn!(
                        "[WCI] lock: breaking expired lease held by {} (expired {})",
                        current.holder,
                        current.expires_at
                    );
                    bytes
                }
                Existing::Unreadable { bytes, modified } => {
                    let expires_at = modified
                        .and_then(|m| m.checked_add_signed(self.ttl))
                        .unwrap_or(record.expires_at);
                    if now < expires_at {
                        log::warn!(
                            "[WCI] lock: unreadable lease at {} treated as held until {}",
                            self.path.display(),
                            expires_at
                        );
                        return Err(LeaseError::Held {
                            holder: "unknown".to_string(),
                            expires_at,
                        });
                    }
                    log::warn!("[WCI] lock: breaking unreadable lease at {}", self.path.display());
                    bytes
                }
            };

            match break_stale(&self.path, &stale).await? {
                Broken::Cleared => continue,
                Broken::Replaced(Some(current)) => return Err(held(current)),
                Broken::Replaced(None) => {
                    return Err(LeaseError::Held {
                        holder: "unknown".to_string(),
                        expires_at: record.expires_at,
                    })
                }
            }
        }

        match inspect(&self.path).await? {
            Existing::Lease { record: current, .. } => Err(held(current)),
            _ => Err(LeaseError::Held {
                holder: "unknown".to_string(),
                expires_at: record.expires_at,
            }),
        }
    }

    fn granted(&self, record: LeaseRecord) -> LeaseGuard {
        log::info!(
            "[WCI] lock: acquired lease at {} until {}",
            self.path.display(),
            record.expires_at
        );
        LeaseGuard {
            path: self.path.clone(),
            record,
        }
    }

    /// Write `record` to a private temp file and link it into place.
    /// `Ok(false)` when a lease file already exists.
    async fn publish(&self, record: &LeaseRecord) -> Result<bool> {
        let body = serde_json::to_vec(record).map_err(|source| StoreError::Serde {
            key: self.path.display().to_string(),
            source,
        })?;
        let tmp = sibling(&self.path, "tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::io(tmp.display().to_string(), e))?;
        let linked = tokio::fs::hard_link(&tmp, &self.path).await;
        remove_if_present(&tmp).await?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(self.path.display().to_string(), e)),
        }
    }
}

impl LeaseGuard {
    pub fn record(&self) -> &LeaseRecord {
        &self.record
    }

    /// Remove the lease file if it is still ours.
    pub async fn release(self) -> Result<()> {
        let tomb = sibling(&self.path, "released");
        match tokio::fs::rename(&self.path, &tomb).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("[WCI] lock: lease at {} already gone", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(self.path.display().to_string(), e)),
        }

        let moved = read_bytes(&tomb).await?;
        let current: Option<LeaseRecord> = moved.as_deref().and_then(|b| serde_json::from_slice(b).ok());
        if current.as_ref() == Some(&self.record) {
            remove_if_present(&tomb).await?;
            log::info!("[WCI] lock: released lease at {}", self.path.display());
            return Ok(());
        }

        restore(&tomb, &self.path).await?;
        log::warn!(
            "[WCI] lock: lease at {} now held by {}, leaving it",
            self.path.display(),
            current.map(|r| r.holder).unwrap_or_else(|| "unknown".to_string())
        );
        Ok(())
    }
}

fn held(record: LeaseRecord) -> LeaseError {
    LeaseError::Held {
        holder: record.holder,
        expires_at: record.expires_at,
    }
}

/// A uniquely named file next to `path`, private to this call.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lease".to_string());
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}-{}.{}", name, std::process::id(), seq, tag))
}

/// Move the stale lease aside and confirm it is the one we judged stale.
async fn break_stale(path: &Path, stale: &[u8]) -> Result<Broken> {
    let tomb = sibling(path, "stale");
    match tokio::fs::rename(path, &tomb).await {
        Ok(()) => {}
        // Another run broke it first.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Broken::Cleared),
        Err(e) => return Err(StoreError::io(path.display().to_string(), e)),
    }

    let moved = read_bytes(&tomb).await?;
    if moved.as_deref() == Some(stale) {
        remove_if_present(&tomb).await?;
        return Ok(Broken::Cleared);
    }

    restore(&tomb, path).await?;
    Ok(Broken::Replaced(
        moved.as_deref().and_then(|b| serde_json::from_slice(b).ok()),
    ))
}

/// Link a moved-aside lease back into place and drop the tombstone.
async fn restore(tomb: &Path, path: &Path) -> Result<()> {
    match tokio::fs::hard_link(tomb, path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            log::warn!("[WCI] lock: {} was re-taken before the lease could be restored", path.display());
        }
        Err(e) => return Err(StoreError::io(path.display().to_string(), e)),
    }
    remove_if_present(tomb).await
}

async fn inspect(path: &Path) -> Result<Existing> {
    let Some(bytes) = read_bytes(path).await? else {
        return Ok(Existing::Missing);
    };
    if let Ok(record) = serde_json::from_slice::<LeaseRecord>(&bytes) {
        return Ok(Existing::Lease { record, bytes });
    }
    let modified = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified().ok().map(DateTime::<Utc>::from),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Existing::Missing),
        Err(_) => None,
    };
    Ok(Existing::Unreadable { bytes, modified })
}

async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}

#[cfg(test)]
async fn read_record(path: &Path) -> Result<Option<LeaseRecord>> {
    Ok(read_bytes(path)
        .await?
        .and_then(|bytes| serde_json::from_slice(&bytes).ok()))
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}
