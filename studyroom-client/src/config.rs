use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::peer::GlarePolicy;
use studyroom_core::IceServerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay socket endpoint, e.g. `ws://127.0.0.1:3000/ws`.
    pub relay_url: String,

    /// User id forwarded to the relay as the identity claim.
    #[serde(default)]
    pub identity: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub glare: GlarePolicy,

    /// Replaces the ICE servers handed out in the relay's welcome.
    #[serde(default)]
    pub ice_servers: Option<Vec<IceServerConfig>>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl ClientConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            identity: None,
            display_name: None,
            glare: GlarePolicy::default(),
            ice_servers: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn with_identity(mut self, user_id: impl Into<String>) -> Self {
        self.identity = Some(user_id.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_glare(mut self, glare: GlarePolicy) -> Self {
        self.glare = glare;
        self
    }

    /// Relay url with the identity claim in its query string.
    pub fn connect_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.relay_url)?;

        if self.identity.is_some() || self.display_name.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(identity) = &self.identity {
                query.append_pair("identity", identity);
            }
            if let Some(name) = &self.display_name {
                query.append_pair("name", name);
            }
        }

        Ok(url)
    }

    /// Name stamped on outgoing chat messages.
    pub fn sender_name(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.identity.clone())
            .unwrap_or_else(|| "Anonymous".to_owned())
    }
}
