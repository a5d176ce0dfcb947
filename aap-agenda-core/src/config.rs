use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

/// A subscriber destination using the Agenda push transmitter.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Used in logs and publish errors.
    pub name: String,
    /// Root of the Agenda API, without trailing slash.
    pub assets_url: String,
    /// Shared key used whenever a per-user key cannot be resolved.
    #[serde(default, skip_serializing)]
    pub secret_token: Option<String>,
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("assets_url", &self.assets_url)
            .field("secret_token", &self.secret_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Destination {
    pub fn new(name: impl Into<String>, assets_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets_url: assets_url.into().trim_end_matches('/').to_string(),
            secret_token: None,
        }
    }

    pub fn with_secret_token(mut self, token: impl Into<String>) -> Self {
        self.secret_token = Some(token.into());
        self
    }

    /// Absolute URL of an endpoint below the assets URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.assets_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn trace_loaded(&self) {
        info!(
            destination = %self.name,
            assets_url = %self.assets_url,
            secret_token_set = self.secret_token.is_some(),
            "Loaded Agenda destination"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secret() {
        let d = Destination::new("agenda", "https://agenda.example.com/api")
            .with_secret_token("s3cr3t-token");
        let debug = format!("{d:?}");
        assert!(!debug.contains("s3cr3t-token"), "secret leaked: {debug}");
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("agenda.example.com"));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let d = Destination::new("agenda", "https://agenda.example.com/api/");
        assert_eq!(d.assets_url, "https://agenda.example.com/api");
        assert_eq!(
            d.endpoint("/user/search"),
            "https://agenda.example.com/api/user/search"
        );
    }

    #[test]
    fn secret_is_not_serialised() {
        let d = Destination::new("agenda", "http://x").with_secret_token("s3cret");
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("s3cret"));
    }
}
