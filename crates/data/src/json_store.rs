//! Flat JSON document store: one pretty-printed map of ticker → record.
//!
//! - Missing file loads as an empty collection
//! - Corrupt file loads as empty with a warning and is moved aside on the next write
//! - Records that fail to decode are skipped on load but kept verbatim on write
//! - Writes go to a temporary file that is renamed over the document

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calendar_core::{Position, PositionStore};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schema::{decode_record, encode_record, record_revision};

/// Raw document contents.
enum Document {
    Missing,
    Corrupt(String),
    Records(Map<String, Value>),
}

/// Position store backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and decodes every record.
    ///
    /// # Errors
    /// Returns an error only if the file exists but cannot be read.
    pub fn load(&self) -> Result<BTreeMap<String, Position>, StoreError> {
        let records = match self.read_document()? {
            Document::Missing => {
                info!(path = %self.path.display(), "No positions file found, starting empty");
                return Ok(BTreeMap::new());
            }
            Document::Corrupt(reason) => {
                warn!(path = %self.path.display(), error = %reason, "Positions file is corrupt, starting empty");
                return Ok(BTreeMap::new());
            }
            Document::Records(records) => records,
        };

        let mut positions = BTreeMap::new();
        for (ticker, value) in records {
            match decode_record(&ticker, value) {
                Ok(position) => {
                    positions.insert(ticker, position);
                }
                Err(e) => warn!(ticker, error = %e, "Skipping undecodable position record"),
            }
        }

        debug!(path = %self.path.display(), count = positions.len(), "Loaded positions");
        Ok(positions)
    }

    /// Applies `edit` to the raw record map and writes the document back.
    fn modify<F, T>(&self, edit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Map<String, Value>) -> Result<T, StoreError>,
    {
        let _guard = self.write_lock.lock();

        let mut records = match self.read_document()? {
            Document::Missing => Map::new(),
            Document::Corrupt(reason) => {
                let backup = self.path.with_extension("json.corrupt");
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %reason,
                    "Moving corrupt positions file aside before writing"
                );
                fs::rename(&self.path, &backup)?;
                Map::new()
            }
            Document::Records(records) => records,
        };

        let outcome = edit(&mut records)?;
        self.write_document(&records)?;
        Ok(outcome)
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::Missing),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Document::Records(Map::new()));
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(records)) => Ok(Document::Records(records)),
            Ok(_) => Ok(Document::Corrupt("top-level value is not an object".to_string())),
            Err(e) => Ok(Document::Corrupt(e.to_string())),
        }
    }

    fn write_document(&self, records: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(records)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = records.len(), "Saved positions");
        Ok(())
    }
}

#[async_trait]
impl PositionStore for JsonFileStore {
    async fn list(&self) -> anyhow::Result<BTreeMap<String, Position>> {
        Ok(self.load()?)
    }

    async fn upsert(&self, ticker: &str, position: &Position) -> anyhow::Result<()> {
        let record = encode_record(position)?;
        self.modify(|records| {
            records.insert(ticker.to_string(), record);
            Ok(())
        })?;
        Ok(())
    }

    async fn delete(&self, ticker: &str) -> anyhow::Result<()> {
        self.modify(|records| {
            if records.remove(ticker).is_none() {
                debug!(ticker, "Delete of unknown ticker ignored");
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn update_all(&self, positions: &BTreeMap<String, Position>) -> anyhow::Result<usize> {
        let written = self.modify(|records| {
            let mut written = 0;
            for (ticker, position) in positions {
                let current = records.get(ticker.as_str()).map(record_revision);
                if current != Some(position.revision) {
                    debug!(ticker = %ticker, stored = ?current, "Position changed since load, not written");
                    continue;
                }
                records.insert(ticker.clone(), encode_record(position)?);
                written += 1;
            }
            Ok(written)
        })?;
        Ok(written)
    }
}
