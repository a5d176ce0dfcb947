//! HTTP push transmitter for Agenda.
//!
//! One formatted item per call, one attempt per call: there is no retry or
//! backoff. The pipeline is
//!   1. resolve the API key of the publishing user (falling back to the
//!      destination's shared secret on any failure),
//!   2. post the entry to `entry/saveentry`,
//!   3. on success, take the Agenda id from the `Location` header and write it
//!      back onto the originating event or planning record.
//!
//! Non-success statuses become [`PublishError::HttpPush`] with the status and
//! response body; nothing is recovered locally.

use tracing::{error, info, warn};

use crate::config::Destination;
use crate::contract::{AgendaApi, AgendaUserUpdate, RecordStore, Resource};
use crate::errors::PublishError;
use crate::formatter::FormattedItem;

/// Name the transmitter is registered under.
pub const TRANSMITTER_NAME: &str = "http_agenda_push";

/// What a successful push did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub external_identifier: String,
    pub status: u16,
    /// Agenda id written back to the source record, if any.
    pub agenda_id: Option<String>,
}

pub struct AgendaPushTransmitter<'a, A: ?Sized, S: ?Sized> {
    api: &'a A,
    store: &'a S,
}

impl<'a, A, S> AgendaPushTransmitter<'a, A, S>
where
    A: AgendaApi + ?Sized,
    S: RecordStore + ?Sized,
{
    pub fn new(api: &'a A, store: &'a S) -> Self {
        Self { api, store }
    }

    /// Match the CMS user with an Agenda user by email and use that user's API
    /// key, generating and storing one in Agenda if the user has none.
    ///
    /// Never fails: every miss or error along the way is logged and the
    /// destination's shared secret is returned instead.
    pub async fn resolve_api_key(
        &self,
        destination: &Destination,
        user_id: Option<&str>,
    ) -> Option<String> {
        let fallback = destination.secret_token.clone();

        let Some(user_id) = user_id else {
            warn!("[APIKEY] No publishing user on item, using destination secret");
            return fallback;
        };
        let user = match self.store.find_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id, "[APIKEY] Failed to get the CMS user");
                return fallback;
            }
            Err(e) => {
                warn!(user_id, error = %e, "[APIKEY] Failed to get the CMS user");
                return fallback;
            }
        };
        let Some(email) = user.email.filter(|e| !e.is_empty()) else {
            warn!(user_id, "[APIKEY] CMS user has no email address");
            return fallback;
        };

        let agenda_users = match self
            .api
            .search_users(destination, &email, fallback.clone())
            .await
        {
            Ok(users) => users,
            Err(e) => {
                warn!(
                    email = %email,
                    error = %e,
                    "[APIKEY] Exception on search for Agenda user email"
                );
                return fallback;
            }
        };
        let Some(agenda_user) = agenda_users.into_iter().next() else {
            warn!(
                email = %email,
                "[APIKEY] Failed to match CMS user with Agenda user using email address"
            );
            return fallback;
        };

        if let Some(key) = agenda_user.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        let key = match self.api.generate_key(destination).await {
            Ok(Some(key)) if !key.is_empty() => key,
            Ok(_) => {
                warn!("[APIKEY] Agenda returned no API key");
                return fallback;
            }
            Err(e) => {
                warn!(error = %e, "[APIKEY] Failed to get a new API key from Agenda");
                return fallback;
            }
        };

        let update = AgendaUserUpdate::with_api_key(&agenda_user, key.clone());
        match self.api.edit_user(destination, update, fallback.clone()).await {
            Ok(()) => {
                info!(
                    agenda_user_id = agenda_user.id,
                    "[APIKEY] Stored new API key on Agenda user"
                );
                Some(key)
            }
            Err(e) => {
                warn!(
                    email = agenda_user.email.as_deref().unwrap_or(""),
                    error = %e,
                    "[APIKEY] Failed to set API key in the Agenda user"
                );
                fallback
            }
        }
    }

    pub async fn push(
        &self,
        destination: &Destination,
        item: &FormattedItem,
    ) -> Result<PushReport, PublishError> {
        let envelope = &item.envelope;
        info!(
            destination = %destination.name,
            external_identifier = %envelope.external_identifier,
            item_type = %envelope.item_type,
            "[PUSH] Pushing item to Agenda"
        );

        let api_key = self
            .resolve_api_key(destination, envelope.publishing_user.as_deref())
            .await;

        let response = self
            .api
            .save_entry(destination, envelope.entry.clone(), api_key)
            .await
            .map_err(|source| {
                error!(
                    destination = %destination.name,
                    error = %source,
                    "[PUSH][ERROR] Transport failure"
                );
                PublishError::Transport {
                    destination: destination.name.clone(),
                    source,
                }
            })?;

        if !response.is_success() {
            error!(
                destination = %destination.name,
                status = response.status,
                body = %response.body,
                "[PUSH][ERROR] Agenda rejected the entry"
            );
            return Err(PublishError::HttpPush {
                status: response.status,
                body: response.body,
                destination: destination.name.clone(),
            });
        }

        let agenda_id = match response.location.as_deref() {
            Some(location) => {
                self.save_agenda_id(&envelope.item_type, &envelope.external_identifier, location)
                    .await?
            }
            None => None,
        };

        info!(
            status = response.status,
            agenda_id = agenda_id.as_deref().unwrap_or(""),
            "[PUSH] Push complete"
        );
        Ok(PushReport {
            external_identifier: envelope.external_identifier.clone(),
            status: response.status,
            agenda_id,
        })
    }

    /// Write the id at the end of `location` onto the source record, if that
    /// record still exists.
    async fn save_agenda_id(
        &self,
        item_type: &str,
        id: &str,
        location: &str,
    ) -> Result<Option<String>, PublishError> {
        let agenda_id = agenda_id_from_location(location);
        let resource = Resource::for_item_type(item_type);

        let exists = match resource {
            Resource::Events => self.store.find_event(id).await.map(|e| e.is_some()),
            Resource::Planning => self.store.find_planning(id).await.map(|p| p.is_some()),
        }
        .map_err(PublishError::Store)?;
        if !exists {
            warn!(
                resource = resource.as_str(),
                id,
                "[PUSH] Source record gone, Agenda id not saved"
            );
            return Ok(None);
        }

        self.store
            .set_unique_id(resource, id, agenda_id)
            .await
            .map_err(PublishError::Store)?;
        info!(resource = resource.as_str(), id, agenda_id, "[PUSH] Saved Agenda id");
        Ok(Some(agenda_id.to_string()))
    }
}

/// Last path segment of a `Location` header.
pub fn agenda_id_from_location(location: &str) -> &str {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AgendaUser, MockAgendaApi, MockRecordStore};
    use crate::model::User;

    fn destination() -> Destination {
        Destination::new("agenda", "https://agenda.example.com/api").with_secret_token("shared")
    }

    fn store_with_user(email: Option<&str>) -> MockRecordStore {
        let email = email.map(str::to_string);
        let mut store = MockRecordStore::new();
        store.expect_find_user().returning(move |id| {
            Ok(Some(User {
                id: id.to_string(),
                email: email.clone(),
            }))
        });
        store
    }

    #[test]
    fn location_parsing() {
        assert_eq!(agenda_id_from_location("https://agenda/api/entry/1234"), "1234");
        assert_eq!(agenda_id_from_location("/entry/77/"), "77");
        assert_eq!(agenda_id_from_location("55"), "55");
    }

    #[tokio::test]
    async fn existing_agenda_key_is_used() {
        let store = store_with_user(Some("jo@example.com"));
        let mut api = MockAgendaApi::new();
        api.expect_search_users()
            .withf(|_, email, key| email == "jo@example.com" && key.as_deref() == Some("shared"))
            .returning(|_, _, _| {
                Ok(vec![AgendaUser {
                    id: 9,
                    api_key: Some("personal".into()),
                    ..Default::default()
                }])
            });
        api.expect_generate_key().never();

        let t = AgendaPushTransmitter::new(&api, &store);
        let key = t.resolve_api_key(&destination(), Some("u1")).await;
        assert_eq!(key.as_deref(), Some("personal"));
    }

    #[tokio::test]
    async fn missing_key_is_generated_and_stored() {
        let store = store_with_user(Some("jo@example.com"));
        let mut api = MockAgendaApi::new();
        api.expect_search_users().returning(|_, _, _| {
            Ok(vec![AgendaUser {
                id: 9,
                api_key: None,
                first_name: Some("Jo".into()),
                last_name: Some("Bloggs".into()),
                email: Some("jo@example.com".into()),
            }])
        });
        api.expect_generate_key()
            .times(1)
            .returning(|_| Ok(Some("fresh".into())));
        api.expect_edit_user()
            .withf(|_, update, _| {
                update.id == 9
                    && update.api_key == "fresh"
                    && update.first_name.as_deref() == Some("Jo")
                    && update.email.as_deref() == Some("jo@example.com")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let t = AgendaPushTransmitter::new(&api, &store);
        let key = t.resolve_api_key(&destination(), Some("u1")).await;
        assert_eq!(key.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn failures_fall_back_to_shared_secret() {
        // search fails
        let store = store_with_user(Some("jo@example.com"));
        let mut api = MockAgendaApi::new();
        api.expect_search_users()
            .returning(|_, _, _| Err("connection refused".into()));
        let t = AgendaPushTransmitter::new(&api, &store);
        assert_eq!(t.resolve_api_key(&destination(), Some("u1")).await.as_deref(), Some("shared"));

        // no Agenda user with that email
        let mut api = MockAgendaApi::new();
        api.expect_search_users().returning(|_, _, _| Ok(vec![]));
        let t = AgendaPushTransmitter::new(&api, &store);
        assert_eq!(t.resolve_api_key(&destination(), Some("u1")).await.as_deref(), Some("shared"));

        // key generated but storing it fails
        let mut api = MockAgendaApi::new();
        api.expect_search_users()
            .returning(|_, _, _| Ok(vec![AgendaUser { id: 1, ..Default::default() }]));
        api.expect_generate_key().returning(|_| Ok(Some("fresh".into())));
        api.expect_edit_user().returning(|_, _, _| Err("500".into()));
        let t = AgendaPushTransmitter::new(&api, &store);
        assert_eq!(t.resolve_api_key(&destination(), Some("u1")).await.as_deref(), Some("shared"));

        // unknown CMS user
        let mut store = MockRecordStore::new();
        store.expect_find_user().returning(|_| Ok(None));
        let api = MockAgendaApi::new();
        let t = AgendaPushTransmitter::new(&api, &store);
        assert_eq!(t.resolve_api_key(&destination(), Some("u1")).await.as_deref(), Some("shared"));

        // no user on the item and no secret configured
        let bare = Destination::new("agenda", "https://agenda.example.com/api");
        assert_eq!(t.resolve_api_key(&bare, None).await, None);
    }
}
