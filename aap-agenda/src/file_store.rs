//! JSON-file backed record store for running the pipeline outside the CMS.
//!
//! The file holds a [`RecordSet`] and may carry any other fields the CMS
//! exports. Reads are served from memory. A writable store patches only the
//! touched keys (`unique_id`, `sequences`) into the original document and
//! replaces the file atomically, so unmodelled fields survive. A detached
//! store applies writes in memory only.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use aap_agenda_core::contract::{BoxError, RecordStore, Resource};
use aap_agenda_core::model::{Event, Item, Location, Planning, User};
use aap_agenda_core::store::{MemoryRecordStore, RecordSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryRecordStore,
    document: Mutex<Value>,
    persist: bool,
}

impl JsonFileStore {
    /// Open a store whose writes are persisted to `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), true)
    }

    /// Open a store whose writes never reach the file.
    pub fn open_detached<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref(), false)
    }

    fn load(path: &Path, persist: bool) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read record store {:?}", path))?;
        let document: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse record store {:?}", path))?;
        let records: RecordSet = serde_json::from_value(document.clone())
            .with_context(|| format!("Failed to parse record store {:?}", path))?;
        info!(
            store_path = ?path,
            events = records.events.len(),
            planning = records.planning.len(),
            persist,
            "Opened record store"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryRecordStore::from_records(records),
            document: Mutex::new(document),
            persist,
        })
    }

    /// The event or planning item with this id, as a publishable item.
    pub async fn item(&self, id: &str) -> Result<Item> {
        if let Some(event) = self.inner.find_event(id).await.map_err(anyhow::Error::msg)? {
            return Ok(Item::Event(event));
        }
        if let Some(planning) = self.inner.find_planning(id).await.map_err(anyhow::Error::msg)? {
            return Ok(Item::Planning(planning));
        }
        anyhow::bail!("No event or planning item with id {id} in {:?}", self.path)
    }

    fn document(&self) -> Result<MutexGuard<'_, Value>, BoxError> {
        self.document
            .lock()
            .map_err(|e| format!("record store lock poisoned: {e}").into())
    }

    /// Apply `patch` to the stored document and replace the file with it.
    fn persist_with<F>(&self, patch: F) -> Result<(), BoxError>
    where
        F: FnOnce(&mut Value) -> Result<(), BoxError>,
    {
        if !self.persist {
            return Ok(());
        }
        let mut document = self.document()?;
        patch(&mut document)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &*document)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(store_path = ?self.path, "Persisted record store");
        Ok(())
    }
}

fn patch_unique_id(
    document: &mut Value,
    resource: Resource,
    id: &str,
    unique_id: &str,
) -> Result<(), BoxError> {
    let record = document
        .get_mut(resource.as_str())
        .and_then(Value::as_array_mut)
        .and_then(|records| {
            records
                .iter_mut()
                .find(|r| r.get("_id").and_then(Value::as_str) == Some(id))
        })
        .and_then(Value::as_object_mut)
        .ok_or_else(|| format!("no {} record with id {id} in store file", resource.as_str()))?;
    record.insert("unique_id".to_string(), Value::String(unique_id.to_string()));
    Ok(())
}

fn patch_sequence(document: &mut Value, subscriber: &str, seq: i64) -> Result<(), BoxError> {
    let root = document
        .as_object_mut()
        .ok_or("record store file is not a JSON object")?;
    let sequences = root
        .entry("sequences")
        .or_insert_with(|| Value::Object(Map::new()));
    let sequences = sequences
        .as_object_mut()
        .ok_or("record store `sequences` is not a JSON object")?;
    sequences.insert(subscriber.to_string(), Value::from(seq));
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn find_event(&self, id: &str) -> Result<Option<Event>, BoxError> {
        self.inner.find_event(id).await
    }

    async fn find_planning(&self, id: &str) -> Result<Option<Planning>, BoxError> {
        self.inner.find_planning(id).await
    }

    async fn plannings_for_event(&self, event_id: &str) -> Result<Vec<Planning>, BoxError> {
        self.inner.plannings_for_event(event_id).await
    }

    async fn find_location(&self, guid: &str) -> Result<Option<Location>, BoxError> {
        self.inner.find_location(guid).await
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, BoxError> {
        self.inner.find_user(id).await
    }

    async fn set_unique_id(
        &self,
        resource: Resource,
        id: &str,
        unique_id: &str,
    ) -> Result<(), BoxError> {
        self.inner.set_unique_id(resource, id, unique_id).await?;
        self.persist_with(|doc| patch_unique_id(doc, resource, id, unique_id))
    }

    async fn next_sequence_number(&self, subscriber: &str) -> Result<i64, BoxError> {
        let seq = self.inner.next_sequence_number(subscriber).await?;
        self.persist_with(|doc| patch_sequence(doc, subscriber, seq))?;
        Ok(seq)
    }
}
