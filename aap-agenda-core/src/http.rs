//! `reqwest` implementation of [`AgendaApi`].
//!
//! Every request is a single attempt with the client's default timeouts.
//! `user/search`, `account/generatekey` and `user/edit` treat any non-success
//! status as an error; `entry/saveentry` hands the status back to the caller.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::json;

use crate::config::Destination;
use crate::contract::{AgendaApi, AgendaUser, AgendaUserUpdate, BoxError, SaveEntryResponse};
use crate::payload::AgendaEntry;

/// Header carrying the Agenda API key.
pub const API_KEY_HEADER: &str = "x-agenda-api-key";

const SAVE_ENTRY_PATH: &str = "entry/saveentry?pScheduledEntryChangePolicy=1";

#[derive(Debug, Deserialize)]
struct GeneratedKey {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HttpAgendaClient {
    client: reqwest::Client,
}

impl HttpAgendaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn headers(api_key: Option<String>) -> Result<HeaderMap, BoxError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(API_KEY_HEADER, HeaderValue::from_str(&key)?);
        }
        Ok(headers)
    }
}

#[async_trait]
impl AgendaApi for HttpAgendaClient {
    async fn search_users(
        &self,
        destination: &Destination,
        email: &str,
        api_key: Option<String>,
    ) -> Result<Vec<AgendaUser>, BoxError> {
        let url = destination.endpoint("user/search");
        tracing::debug!(url = %url, email, "Searching Agenda users");
        let users = self
            .client
            .post(&url)
            .headers(Self::headers(api_key)?)
            .json(&json!({ "email": email }))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<AgendaUser>>()
            .await?;
        Ok(users)
    }

    async fn generate_key(&self, destination: &Destination) -> Result<Option<String>, BoxError> {
        let url = destination.endpoint("account/generatekey");
        tracing::debug!(url = %url, "Requesting new Agenda API key");
        let generated = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<GeneratedKey>()
            .await?;
        Ok(generated.key)
    }

    async fn edit_user(
        &self,
        destination: &Destination,
        update: AgendaUserUpdate,
        api_key: Option<String>,
    ) -> Result<(), BoxError> {
        let url = destination.endpoint("user/edit");
        tracing::debug!(url = %url, agenda_user_id = update.id, "Updating Agenda user");
        self.client
            .post(&url)
            .headers(Self::headers(api_key)?)
            .json(&update)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn save_entry(
        &self,
        destination: &Destination,
        entry: AgendaEntry,
        api_key: Option<String>,
    ) -> Result<SaveEntryResponse, BoxError> {
        let url = destination.endpoint(SAVE_ENTRY_PATH);
        tracing::debug!(url = %url, "Posting Agenda entry");
        let response = self
            .client
            .post(&url)
            .headers(Self::headers(api_key)?)
            .json(&entry)
            .send()
            .await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(SaveEntryResponse {
            status,
            body,
            location,
        })
    }
}
