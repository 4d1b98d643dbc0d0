use std::{env, fmt};

use crate::{ChatCompletions, Message, DEFAULT_API_BASE, DEFAULT_CHAT_MODEL};

const OPENROUTER_API_BASE: &str = "OPENROUTER_API_BASE";
const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
const OPENROUTER_MODEL: &str = "OPENROUTER_MODEL";
const OPENROUTER_PROMPT: &str = "OPENROUTER_PROMPT";
const OPENROUTER_SITE_URL: &str = "OPENROUTER_SITE_URL";
const OPENROUTER_SITE_NAME: &str = "OPENROUTER_SITE_NAME";

pub const DEFAULT_PROMPT: &str = "What is the meaning of life?";

/// Everything needed for one completion round trip.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub base_uri: String,
    pub token: Option<String>,
    pub model: String,
    pub prompt: String,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_API_BASE.into(),
            token: None,
            model: DEFAULT_CHAT_MODEL.into(),
            prompt: DEFAULT_PROMPT.into(),
            site_url: None,
            site_name: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the `OPENROUTER_*` environment variables.
    ///
    /// Unset and empty variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let defaults = Self::default();

        Self {
            base_uri: get(OPENROUTER_API_BASE).unwrap_or(defaults.base_uri),
            token: get(OPENROUTER_API_KEY),
            model: get(OPENROUTER_MODEL).unwrap_or(defaults.model),
            prompt: get(OPENROUTER_PROMPT).unwrap_or(defaults.prompt),
            site_url: get(OPENROUTER_SITE_URL),
            site_name: get(OPENROUTER_SITE_NAME),
        }
    }

    /// The single-message request this configuration describes.
    pub fn request(&self) -> ChatCompletions {
        ChatCompletions {
            model: self.model.clone(),
            messages: vec![Message::user(self.prompt.as_str())],
            ..Default::default()
        }
        .with_attribution(self.site_url.as_deref(), self.site_name.as_deref())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_uri", &self.base_uri)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("prompt", &self.prompt)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .finish()
    }
}
