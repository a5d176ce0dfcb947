//! # contract: the seams between the Agenda pack and the outside world
//!
//! The formatter and transmitter never talk to a database or a socket
//! directly. They go through two async traits:
//!
//! - [`RecordStore`]: the CMS resources they read (`events`, `planning`,
//!   `locations`, `users`, `subscribers`) and the single write they perform
//!   (the Agenda id written back as `unique_id`).
//! - [`AgendaApi`]: the four Agenda HTTP endpoints.
//!
//! Both traits are annotated for `mockall` so tests can script the host CMS
//! and the remote API. Production implementations are
//! [`crate::store::MemoryRecordStore`] (and the CLI's file-backed store built on
//! it) and [`crate::http::HttpAgendaClient`].
//!
//! Errors crossing these seams are boxed trait objects; callers translate
//! them into [`crate::errors::PublishError`] or [`crate::errors::FormatError`].

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::config::Destination;
use crate::model::{Event, Location, Planning, User};
use crate::payload::AgendaEntry;

/// Error type used across the store and API seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// CMS resources that can receive an Agenda id write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Events,
    Planning,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Events => "events",
            Resource::Planning => "planning",
        }
    }

    /// Resource holding items of the given CMS `type`.
    pub fn for_item_type(item_type: &str) -> Self {
        if item_type == "event" {
            Resource::Events
        } else {
            Resource::Planning
        }
    }
}

/// Read access to the CMS records the formatter and transmitter need, plus
/// the `unique_id` write-back.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_event(&self, id: &str) -> Result<Option<Event>, BoxError>;

    async fn find_planning(&self, id: &str) -> Result<Option<Planning>, BoxError>;

    /// All planning items whose `event_item` is the given event.
    async fn plannings_for_event(&self, event_id: &str) -> Result<Vec<Planning>, BoxError>;

    async fn find_location(&self, guid: &str) -> Result<Option<Location>, BoxError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, BoxError>;

    /// System update of `unique_id` on an event or planning record.
    async fn set_unique_id(
        &self,
        resource: Resource,
        id: &str,
        unique_id: &str,
    ) -> Result<(), BoxError>;

    /// Next publish sequence number for a subscriber.
    async fn next_sequence_number(&self, subscriber: &str) -> Result<i64, BoxError>;
}

/// A user record as returned by Agenda's `user/search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgendaUser {
    #[serde(rename = "IDUser")]
    pub id: i64,
    #[serde(rename = "ApiKey", default)]
    pub api_key: Option<String>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
}

/// Body of Agenda's `user/edit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaUserUpdate {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "ApiKey")]
    pub api_key: String,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name: Option<String>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
}

impl AgendaUserUpdate {
    pub fn with_api_key(user: &AgendaUser, api_key: String) -> Self {
        Self {
            id: user.id,
            api_key,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Raw outcome of `entry/saveentry`. Non-success statuses are returned, not
/// raised; the transmitter decides what counts as failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEntryResponse {
    pub status: u16,
    pub body: String,
    /// `Location` header; its last path segment is the Agenda entry id.
    pub location: Option<String>,
}

impl SaveEntryResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The Agenda HTTP API, rooted at the destination's assets URL.
///
/// `api_key` is sent as `x-agenda-api-key` when present.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AgendaApi: Send + Sync {
    /// `POST {assets_url}/user/search` with `{"email": ...}`.
    async fn search_users(
        &self,
        destination: &Destination,
        email: &str,
        api_key: Option<String>,
    ) -> Result<Vec<AgendaUser>, BoxError>;

    /// `GET {assets_url}/account/generatekey`; the new key, if one was issued.
    async fn generate_key(&self, destination: &Destination) -> Result<Option<String>, BoxError>;

    /// `POST {assets_url}/user/edit`.
    async fn edit_user(
        &self,
        destination: &Destination,
        update: AgendaUserUpdate,
        api_key: Option<String>,
    ) -> Result<(), BoxError>;

    /// `POST {assets_url}/entry/saveentry?pScheduledEntryChangePolicy=1`.
    async fn save_entry(
        &self,
        destination: &Destination,
        entry: AgendaEntry,
        api_key: Option<String>,
    ) -> Result<SaveEntryResponse, BoxError>;
}
