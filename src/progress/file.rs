//! JSON-file `KvStore`.
//!
//! All entries live in one JSON object. Writes go to a temp file that is
//! renamed over the original; the previous file is kept as `<name>.bak`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::KvStore;
use crate::util::blocking;
use crate::{wlog_debug, wlog_warn, Result};

type Entries = BTreeMap<String, String>;

/// File-backed key/value store. Clones share one write lock, so writers in
/// this process never interleave their read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to the stored map and write it back atomically.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Entries) + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        blocking(move || {
            let mut entries = read_entries_lenient(&path)?;
            change(&mut entries);
            write_entries(&path, &entries)
        })
        .await
    }

    async fn read(&self) -> Result<Entries> {
        let path = self.path.clone();
        blocking(move || read_entries_lenient(&path)).await
    }
}

/// Read the map; a missing file is empty, a corrupt file is `Error::Json`.
fn read_entries(path: &Path) -> Result<Entries> {
    match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(Entries::new()),
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
        Err(e) => Err(e.into()),
    }
}

/// Like `read_entries`, but a corrupt file reads as an empty map. Its
/// contents survive in the `.bak` copy made by the next write.
fn read_entries_lenient(path: &Path) -> Result<Entries> {
    match read_entries(path) {
        Err(crate::Error::Json(e)) => {
            wlog_warn!(
                "Progress file {} is corrupt ({}), starting from empty",
                path.display(),
                e
            );
            Ok(Entries::new())
        }
        other => other,
    }
}

fn write_entries(path: &Path, entries: &Entries) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            wlog_debug!("Creating store directory: {}", dir.display());
            fs::create_dir_all(dir)?;
        }
    }

    if path.exists() {
        fs::copy(path, backup_path(path))?;
    }

    let temp_path = sibling_with_suffix(path, "tmp");
    fs::write(&temp_path, serde_json::to_string_pretty(entries)?)?;
    fs::rename(&temp_path, path)?;
    wlog_debug!("Store written: {} ({} entries)", path.display(), entries.len());
    Ok(())
}

pub(crate) fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.update(move |entries| {
            entries.remove(&key);
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read().await?.into_keys().collect())
    }
}
