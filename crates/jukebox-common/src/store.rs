use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Typed JSON document persisted at a fixed path.
///
/// Writes go to a sibling temp file which is then renamed over the target, so a
/// crash mid-write leaves either the old or the new document, never a torn one.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), _marker: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, writing the default if the file does not exist yet
    pub fn load_or_default(&self) -> Result<T> {
        if !self.path.exists() {
            info!("Document not found at {:?}, creating default", self.path);
            let value = T::default();
            self.save(&value)?;
            return Ok(value);
        }

        let content = fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&content)?;
        debug!("Loaded document from {:?}", self.path);
        Ok(value)
    }

    /// Like `load_or_default`, but a corrupt or unreadable file falls back to the
    /// default instead of failing startup.
    pub fn load_or_recover(&self) -> T {
        match self.load_or_default() {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to load {:?}: {}. Using defaults.", self.path, e);
                T::default()
            }
        }
    }

    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(value)?;
        let tmp_path = self.tmp_path();

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!("Saved document to {:?}", self.path);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        count: u32,
        label: String,
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("nested").join("doc.json"));

        let doc = store.load_or_default().unwrap();
        assert_eq!(doc, Doc::default());
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("doc.json"));

        store.save(&Doc { count: 3, label: "three".to_string() }).unwrap();
        let loaded = store.load_or_default().unwrap();
        assert_eq!(loaded.count, 3);
        assert_eq!(loaded.label, "three");
        assert!(!dir.path().join("doc.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_recovers_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{ not json").unwrap();

        let store: JsonStore<Doc> = JsonStore::new(&path);
        assert!(store.load_or_default().is_err());
        assert_eq!(store.load_or_recover(), Doc::default());
    }
}
