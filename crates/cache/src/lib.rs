//! deadwood Cache - last-activity cache
//!
//! Remembers, per account id, the oldest status we have seen (or that the
//! account had nothing to show). Entries never expire: a second run trusts
//! whatever the first one found. Every write first copies the previous file
//! to `<path>.prev`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEntry {
    /// Creation time of the oldest status found.
    LastStatus(DateTime<Utc>),
    /// The status listing came back empty.
    Gone,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
pub struct ActivityCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
}

impl ActivityCache {
    /// In-memory only; lookups always miss and writes are dropped.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Reads the persisted cache. Unreadable files yield an empty cache.
    pub async fn load(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::disabled();
        };

        let entries = match read_entries(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error loading cache {}: {:#}", path.display(), e);
                HashMap::new()
            }
        };
        debug!("🗄️ Activity cache {} ({} entries)", path.display(), entries.len());

        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, account_id: &str) -> Option<CacheEntry> {
        self.entries.get(account_id).copied()
    }

    pub fn put(&mut self, account_id: &str, entry: CacheEntry) {
        if self.path.is_none() {
            return;
        }
        self.entries.insert(account_id.to_string(), entry);
    }

    /// Persists the cache. Failures are logged, never returned.
    pub async fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = self.write(path).await {
            error!("Error saving cache {}: {:#}", path.display(), e);
        }
    }

    /// `put` followed by `flush`.
    pub async fn record(&mut self, account_id: &str, entry: CacheEntry) {
        self.put(account_id, entry);
        self.flush().await;
    }

    async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        if fs::try_exists(path).await.unwrap_or(false) {
            let backup = backup_path(path);
            fs::copy(path, &backup)
                .await
                .with_context(|| format!("backing up to {}", backup.display()))?;
        }

        let file = CacheFile {
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| (id.clone(), *entry))
                .collect(),
        };
        fs::write(path, serde_json::to_vec_pretty(&file)?).await?;

        Ok(())
    }
}

/// `<path>.prev`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".prev");
    PathBuf::from(raw)
}

async fn read_entries(path: &Path) -> Result<HashMap<String, CacheEntry>> {
    // First run
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(HashMap::new());
    }

    let raw = fs::read(path).await.context("reading cache file")?;
    let file: CacheFile = serde_json::from_slice(&raw).context("decoding cache file")?;
    Ok(file.entries.into_iter().collect())
}
