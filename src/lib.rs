#[cfg(all(feature = "reqwest", feature = "ureq"))]
compile_error!("Features 'reqwest' and 'ureq' are mutually exclusive.");

#[cfg(not(any(feature = "reqwest", feature = "ureq")))]
compile_error!("One of the features 'reqwest' and 'ureq' must be enabled.");

use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use tracing::{debug, warn};

mod config;

pub use config::{Config, DEFAULT_PROMPT};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-r1:free";

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Site URL used by OpenRouter for app rankings.
pub const HEADER_REFERER: &str = "HTTP-Referer";
/// Site title used by OpenRouter for app rankings.
pub const HEADER_TITLE: &str = "X-Title";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("The configuration contains errors: {0}")]
    BadConfigurationError(String),

    #[error("Failed to serialize request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Failed to deserialize response: {0}")]
    DeserializationError(serde_json::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("The response contained no choices")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    pub content: String,
    /// Reasoning trace returned by reasoning models. Never sent unless set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.into(),
            content: content.into(),
            reasoning: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stop {
    String(String),
    Array(Vec<String>),
}

impl serde::Serialize for Stop {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Stop::String(string) => serializer.serialize_str(string),
            Stop::Array(strings) => {
                let mut array = serializer.serialize_seq(Some(strings.len()))?;
                for string in strings {
                    array.serialize_element(string)?;
                }
                array.end()
            }
        }
    }
}

// NOTE: Providers behind OpenRouter differ in what they accept. Only options
// that are set go into the body, never as "null".

/// Chat completion request.
///
/// Build it with struct update syntax over `Default`:
///
/// ```rust
/// let request = ask_openrouter::ChatCompletions {
///     messages: vec![ask_openrouter::Message::user("What is the meaning of life?")],
///     ..Default::default()
/// };
/// assert_eq!(request.model, ask_openrouter::DEFAULT_CHAT_MODEL);
/// ```
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatCompletions {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    /// Must be `false`: only non-streaming responses are supported.
    pub stream: bool,
    /// Sent as HTTP headers alongside the request, not in the body.
    #[serde(skip)]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ChatCompletions {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.into(),
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            seed: None,
            stop: None,
            stream: false,
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ChatCompletions {
    /// Adds the OpenRouter attribution headers. Each header is only set when
    /// its value is given.
    pub fn with_attribution(mut self, site_url: Option<&str>, site_name: Option<&str>) -> Self {
        if let Some(url) = site_url {
            self.extra_headers.insert(HEADER_REFERER.into(), url.into());
        }
        if let Some(name) = site_name {
            self.extra_headers.insert(HEADER_TITLE.into(), name.into());
        }
        self
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
pub struct ChatCompletionsResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>, // Not every provider reports usage
}

impl ChatCompletionsResponse {
    /// Content of the first choice's message.
    pub fn first_content(&self) -> Result<&str, Error> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or(Error::EmptyResponse)
    }
}

#[cfg(feature = "ureq")]
struct ClientImpl {
    client: ureq::Agent,
    token: Option<String>,
}

#[cfg(feature = "ureq")]
impl ClientImpl {
    fn new(token: Option<String>) -> Result<ClientImpl, Error> {
        Ok(Self {
            client: ureq::Agent::new(),
            token,
        })
    }

    fn do_request(
        &self,
        url: &str,
        body: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, Error> {
        let mut request = self.client.post(url).set("Content-Type", "application/json");

        if let Some(token) = self.token.as_ref() {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        for (name, value) in headers {
            request = request.set(name, value);
        }

        let response = match request.send_string(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let text = format!("{} {}", code, response.status_text());
                warn!(%url, status = code, "completion endpoint returned an error status");
                return Err(Error::ApiError(text));
            }
            // ureq checks header names and values only when sending
            Err(ureq::Error::Transport(t)) if matches!(t.kind(), ureq::ErrorKind::BadHeader) => {
                return Err(Error::BadConfigurationError(t.to_string()));
            }
            Err(e) => return Err(Error::NetworkError(e.to_string())),
        };

        debug!(status = response.status(), "received completion response");

        response
            .into_string()
            .map_err(|e| Error::NetworkError(e.to_string()))
    }
}

#[cfg(feature = "reqwest")]
struct ClientImpl {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ClientImpl {
    fn new(token: Option<String>) -> Result<ClientImpl, Error> {
        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(token) = token {
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::BadConfigurationError(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::BadConfigurationError(e.to_string()))?;

        Ok(Self { client })
    }

    async fn do_request(
        &self,
        url: &str,
        body: String,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, Error> {
        let mut extra = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::BadConfigurationError(e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| Error::BadConfigurationError(e.to_string()))?;
            extra.insert(name, value);
        }

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .headers(extra)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "completion endpoint returned an error status");
            return Err(Error::ApiError(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        debug!(status = status.as_u16(), "received completion response");

        response
            .text()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))
    }
}

pub struct Client {
    inner: ClientImpl,
    base_uri: String,
}

impl Client {
    /// Creates a new `Client` bound to `base_uri`.
    ///
    /// No network activity happens here. Trailing slashes on `base_uri` are
    /// dropped so `{base_uri}/chat/completions` is always well-formed.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadConfigurationError` if `base_uri` is empty, or if it is
    /// the OpenRouter default and no `token` is given. Custom endpoints may run
    /// without authentication, so the token is not enforced for them.
    pub fn new(base_uri: String, token: Option<String>) -> Result<Client, Error> {
        let base_uri = base_uri.trim_end_matches('/').to_string();

        if base_uri.is_empty() {
            return Err(Error::BadConfigurationError("No base URI given".into()));
        }

        if base_uri == DEFAULT_API_BASE && token.is_none() {
            return Err(Error::BadConfigurationError("Missing api token".into()));
        }

        let inner = ClientImpl::new(token)?;
        Ok(Self { inner, base_uri })
    }

    /// Creates a new `Client` from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Client, Error> {
        Self::new(config.base_uri.clone(), config.token.clone())
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Sends one chat completion request and waits for the reply.
    ///
    /// Exactly one HTTP request is made; failures are returned as-is and never
    /// retried.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use ask_openrouter::{ChatCompletions, Client, Message};
    ///
    /// let client = Client::new(ask_openrouter::DEFAULT_API_BASE.into(), Some(key))?;
    /// let request = ChatCompletions {
    ///     messages: vec![Message::user("Hello!")],
    ///     ..Default::default()
    /// };
    /// let response = client.chat_completions(&request).await?;
    /// println!("{}", response.first_content()?);
    /// ```
    #[cfg(feature = "reqwest")]
    pub async fn chat_completions(
        &self,
        request: &ChatCompletions,
    ) -> Result<ChatCompletionsResponse, Error> {
        let url = self.completions_url();
        let body = serde_json::to_string(request).map_err(Error::SerializationError)?;
        debug!(%url, model = %request.model, messages = request.messages.len(), "sending chat completion");
        let response = self
            .inner
            .do_request(&url, body, &request.extra_headers)
            .await?;

        serde_json::from_str(&response).map_err(Error::DeserializationError)
    }

    /// Sends one chat completion request and blocks until the reply arrives.
    ///
    /// Exactly one HTTP request is made; failures are returned as-is and never
    /// retried.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use ask_openrouter::{ChatCompletions, Client, Message};
    ///
    /// let client = Client::new(
    ///     ask_openrouter::DEFAULT_API_BASE.into(),
    ///     Some("sk-or-...".into()),
    /// )?;
    /// let request = ChatCompletions {
    ///     messages: vec![Message::user("Hello!")],
    ///     ..Default::default()
    /// };
    /// let response = client.chat_completions(&request)?;
    /// println!("{}", response.first_content()?);
    /// # Ok::<(), ask_openrouter::Error>(())
    /// ```
    #[cfg(feature = "ureq")]
    pub fn chat_completions(
        &self,
        request: &ChatCompletions,
    ) -> Result<ChatCompletionsResponse, Error> {
        let url = self.completions_url();
        let body = serde_json::to_string(request).map_err(Error::SerializationError)?;
        debug!(%url, model = %request.model, messages = request.messages.len(), "sending chat completion");
        let response = self
            .inner
            .do_request(&url, &body, &request.extra_headers)?;

        serde_json::from_str(&response).map_err(Error::DeserializationError)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_uri)
    }
}
