//! Per-request credentials attached to a transfer at creation time.

use serde::Serialize;

use crate::config::Config;

/// Immutable bundle of remote credentials pulled off request headers by the
/// control-plane's user-data middleware and attached to every `Transfer`
/// it creates. Never logged or serialized in full - `Serialize` masks both
/// tokens down to a short prefix, matching how the UI's own settings screen
/// displays them.
#[derive(Debug, Clone)]
pub struct UserData {
    pub farm_host: String,
    pub api_token: String,
    pub qm_auth_token: String,
}

impl UserData {
    pub fn from_headers(
        config: &Config,
        farm_host: Option<&str>,
        api_token: Option<&str>,
        qm_auth_token: Option<&str>,
    ) -> Self {
        let farm_host = farm_host
            .map(|h| h.trim_end_matches('/').to_owned())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| config.default_farm_host.clone());

        Self {
            farm_host,
            api_token: api_token.unwrap_or_default().to_owned(),
            qm_auth_token: qm_auth_token.unwrap_or_default().to_owned(),
        }
    }

    fn masked(token: &str) -> String {
        let prefix: String = token.chars().take(10).collect();
        format!("{prefix}...")
    }
}

impl Serialize for UserData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("farm_host", &self.farm_host)?;
        map.serialize_entry("api_token", &Self::masked(&self.api_token))?;
        map.serialize_entry("qm_auth_token", &Self::masked(&self.qm_auth_token))?;
        map.end()
    }
}
