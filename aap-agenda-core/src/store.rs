use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contract::{BoxError, RecordStore, Resource};
use crate::model::{Event, Location, Planning, User};

/// Plain snapshot of the records a [`MemoryRecordStore`] holds, in the shape
/// used for JSON fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub planning: Vec<Planning>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub users: Vec<User>,
    /// Last publish sequence number handed out, per subscriber.
    #[serde(default)]
    pub sequences: BTreeMap<String, i64>,
}

#[derive(Debug, Default)]
struct Records {
    events: BTreeMap<String, Event>,
    planning: BTreeMap<String, Planning>,
    locations: BTreeMap<String, Location>,
    users: BTreeMap<String, User>,
    sequences: BTreeMap<String, i64>,
}

/// In-memory [`RecordStore`]. Writes are serialised by a mutex.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Records>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(set: RecordSet) -> Self {
        let records = Records {
            events: set.events.into_iter().map(|e| (e.id.clone(), e)).collect(),
            planning: set.planning.into_iter().map(|p| (p.id.clone(), p)).collect(),
            locations: set.locations.into_iter().map(|l| (l.guid.clone(), l)).collect(),
            users: set.users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            sequences: set.sequences,
        };
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn snapshot(&self) -> Result<RecordSet, BoxError> {
        let records = self.lock()?;
        Ok(RecordSet {
            events: records.events.values().cloned().collect(),
            planning: records.planning.values().cloned().collect(),
            locations: records.locations.values().cloned().collect(),
            users: records.users.values().cloned().collect(),
            sequences: records.sequences.clone(),
        })
    }

    pub fn insert_event(&self, event: Event) -> Result<(), BoxError> {
        self.lock()?.events.insert(event.id.clone(), event);
        Ok(())
    }

    pub fn insert_planning(&self, planning: Planning) -> Result<(), BoxError> {
        self.lock()?.planning.insert(planning.id.clone(), planning);
        Ok(())
    }

    pub fn insert_location(&self, location: Location) -> Result<(), BoxError> {
        self.lock()?.locations.insert(location.guid.clone(), location);
        Ok(())
    }

    pub fn insert_user(&self, user: User) -> Result<(), BoxError> {
        self.lock()?.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, BoxError> {
        self.records
            .lock()
            .map_err(|e| format!("record store lock poisoned: {e}").into())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_event(&self, id: &str) -> Result<Option<Event>, BoxError> {
        Ok(self.lock()?.events.get(id).cloned())
    }

    async fn find_planning(&self, id: &str) -> Result<Option<Planning>, BoxError> {
        Ok(self.lock()?.planning.get(id).cloned())
    }

    async fn plannings_for_event(&self, event_id: &str) -> Result<Vec<Planning>, BoxError> {
        Ok(self
            .lock()?
            .planning
            .values()
            .filter(|p| p.event_item.as_deref() == Some(event_id))
            .cloned()
            .collect())
    }

    async fn find_location(&self, guid: &str) -> Result<Option<Location>, BoxError> {
        Ok(self.lock()?.locations.get(guid).cloned())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, BoxError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    async fn set_unique_id(
        &self,
        resource: Resource,
        id: &str,
        unique_id: &str,
    ) -> Result<(), BoxError> {
        let mut records = self.lock()?;
        let slot = match resource {
            Resource::Events => records.events.get_mut(id).map(|e| &mut e.unique_id),
            Resource::Planning => records.planning.get_mut(id).map(|p| &mut p.unique_id),
        };
        match slot {
            Some(slot) => {
                *slot = Some(unique_id.to_string());
                Ok(())
            }
            None => Err(format!("no {} record with id {id}", resource.as_str()).into()),
        }
    }

    async fn next_sequence_number(&self, subscriber: &str) -> Result<i64, BoxError> {
        let mut records = self.lock()?;
        let seq = records.sequences.entry(subscriber.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_are_per_subscriber() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.next_sequence_number("a").await.unwrap(), 1);
        assert_eq!(store.next_sequence_number("a").await.unwrap(), 2);
        assert_eq!(store.next_sequence_number("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_id_write_back() {
        let store = MemoryRecordStore::new();
        store
            .insert_planning(Planning {
                id: "p1".into(),
                event_item: Some("e1".into()),
                ..Default::default()
            })
            .unwrap();

        store.set_unique_id(Resource::Planning, "p1", "42").await.unwrap();
        let planning = store.find_planning("p1").await.unwrap().unwrap();
        assert_eq!(planning.unique_id.as_deref(), Some("42"));

        assert!(store.set_unique_id(Resource::Events, "e1", "42").await.is_err());
        assert_eq!(store.plannings_for_event("e1").await.unwrap().len(), 1);
    }

    #[test]
    fn snapshot_round_trips_records() {
        let set = RecordSet {
            users: vec![User {
                id: "u1".into(),
                email: Some("jo@example.com".into()),
            }],
            sequences: BTreeMap::from([("agenda".to_string(), 7)]),
            ..Default::default()
        };
        let store = MemoryRecordStore::from_records(set.clone());
        assert_eq!(store.snapshot().unwrap(), set);
    }
}
