//! Hub connection settings.
//!
//! The transport reads the base URL and API key through `HubConfig` on every
//! call and never validates them: a missing URL or key surfaces as a
//! connection or authentication failure from the server side.
//!
//! ## Environment Variables
//! - `HUB_URL`: base URL of the Hub, e.g. `https://hub.example.com`
//! - `HUB_API_KEY`: API key sent as a bearer token

use serde::{Deserialize, Serialize};

pub const HUB_URL_VAR: &str = "HUB_URL";
pub const HUB_API_KEY_VAR: &str = "HUB_API_KEY";

/// Read-only view of the settings a transport needs.
pub trait HubConfig {
    fn base_url(&self) -> Option<&str>;
    fn api_key(&self) -> Option<&str>;

    /// Both a base URL and an API key are set. Callers check this before
    /// any network use; the transport itself never does.
    fn is_configured(&self) -> bool {
        self.base_url().is_some() && self.api_key().is_some()
    }
}

/// Plain settings record, loadable from the environment or any serde
/// source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl HubSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
        }
    }

    /// Load settings from `HUB_URL` and `HUB_API_KEY`. Unset or blank
    /// variables are left as `None`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let settings = Self {
            base_url: read(HUB_URL_VAR),
            api_key: read(HUB_API_KEY_VAR),
        };
        tracing::debug!(
            base_url = settings.base_url.as_deref().unwrap_or("<unset>"),
            api_key_set = settings.api_key.is_some(),
            "hub settings loaded from environment"
        );
        settings
    }
}

impl HubConfig for HubSettings {
    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl<C: HubConfig + ?Sized> HubConfig for &C {
    fn base_url(&self) -> Option<&str> {
        (**self).base_url()
    }

    fn api_key(&self) -> Option<&str> {
        (**self).api_key()
    }
}

impl<C: HubConfig + ?Sized> HubConfig for std::sync::Arc<C> {
    fn base_url(&self) -> Option<&str> {
        (**self).base_url()
    }

    fn api_key(&self) -> Option<&str> {
        (**self).api_key()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_both_variables() {
        let settings = HubSettings::from_lookup(lookup(&[
            (HUB_URL_VAR, "https://hub.example.com"),
            (HUB_API_KEY_VAR, "secret"),
        ]));
        assert_eq!(settings.base_url(), Some("https://hub.example.com"));
        assert_eq!(settings.api_key(), Some("secret"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let settings = HubSettings::from_lookup(lookup(&[(HUB_API_KEY_VAR, "  ")]));
        assert_eq!(settings, HubSettings::default());
    }

    #[test]
    fn configured_only_with_url_and_key() {
        assert!(HubSettings::new("http://localhost:8888", "k").is_configured());
        let no_key = HubSettings::from_lookup(lookup(&[(HUB_URL_VAR, "http://localhost:8888")]));
        assert!(!no_key.is_configured());
        assert!(!HubSettings::default().is_configured());
        assert!(std::sync::Arc::new(HubSettings::new("u", "k")).is_configured());
    }

    #[test]
    fn deserializes_from_camel_case() {
        let settings: HubSettings =
            serde_json::from_str(r#"{"baseUrl":"http://localhost:8888","apiKey":"k"}"#).unwrap();
        assert_eq!(settings, HubSettings::new("http://localhost:8888", "k"));
    }
}
