//! Clients for OpenAI-compatible endpoints.
//!
//! [`OpenAiBackend`] serves narrative generation and agent sessions through
//! chat completions. [`HttpImageBackend`] and [`HttpSpeechBackend`] speak the
//! image and speech routes of the same API directly over `reqwest`.

use std::collections::HashMap;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::{
    Agent, AgentBackend, ImageBackend, ImageRequest, SessionId, SpeechBackend, SpeechRequest,
    TextGenerator,
};
use crate::error::{PresentoError, Stage};

/// Endpoint and credentials for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
}

impl ApiConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), route)
    }
}

fn http_client() -> Result<reqwest::Client, PresentoError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| PresentoError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Chat-completion client serving both one-shot generation and sessions.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    /// Message history per open session.
    sessions: Mutex<HashMap<SessionId, Vec<ChatCompletionRequestMessage>>>,
}

impl OpenAiBackend {
    pub fn new(api: &ApiConfig, model: impl Into<String>) -> Result<Self, PresentoError> {
        let config = OpenAIConfig::new()
            .with_api_key(&api.api_key)
            .with_api_base(&api.api_base);

        let client = Client::with_config(config).with_http_client(http_client()?);

        Ok(Self {
            client,
            model: model.into(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String, PresentoError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if let Some(max_tokens) = max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        let request = args.build()?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(strip_reasoning(&content))
    }

    /// Number of sessions still open.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: content.to_string().into(),
        name: None,
    })
}

fn user_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
        content: content.to_string().into(),
        name: None,
    })
}

fn assistant_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
        content: Some(content.to_string().into()),
        name: None,
        tool_calls: None,
        refusal: None,
        audio: None,
        function_call: None,
    })
}

#[async_trait]
impl TextGenerator for OpenAiBackend {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, PresentoError> {
        let text = self
            .complete(
                vec![system_message(system), user_message(prompt)],
                Some(max_tokens),
            )
            .await?;

        if text.is_empty() {
            return Err(PresentoError::generation(
                Stage::Narrative,
                "model returned an empty response",
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl AgentBackend for OpenAiBackend {
    async fn create_session(&self) -> Result<SessionId, PresentoError> {
        let id = SessionId(Uuid::new_v4().to_string());
        self.sessions.lock().await.insert(id.clone(), Vec::new());
        tracing::debug!(session = %id, "Created session");
        Ok(id)
    }

    async fn run(
        &self,
        session: &SessionId,
        agent: &Agent,
        content: &str,
    ) -> Result<String, PresentoError> {
        let history = self
            .sessions
            .lock()
            .await
            .get(session)
            .cloned()
            .ok_or_else(|| {
                PresentoError::generation(
                    Stage::Slides,
                    format!("unknown session {} for agent '{}'", session, agent.name),
                )
            })?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system_message(&agent.instruction));
        messages.extend(history);
        messages.push(user_message(content));

        let text = self.complete(messages, None).await?;
        if text.is_empty() {
            return Err(PresentoError::generation(
                Stage::Slides,
                format!("agent '{}' returned an empty response", agent.name),
            ));
        }

        if let Some(history) = self.sessions.lock().await.get_mut(session) {
            history.push(user_message(content));
            history.push(assistant_message(&text));
        }

        Ok(text)
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), PresentoError> {
        match self.sessions.lock().await.remove(session) {
            Some(_) => Ok(()),
            None => Err(PresentoError::ResourceCleanup {
                session: session.to_string(),
                message: "no such session".to_string(),
            }),
        }
    }
}

/// Strip reasoning blocks such as `<thinking>...</thinking>` from a response.
///
/// Line structure is kept; the podcast transcript depends on it.
pub fn strip_reasoning(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reasoning",
        "scratchpad",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    result.trim().to_string()
}

/// Map an aspect ratio onto the pixel sizes the images route accepts.
fn image_size(aspect_ratio: &str) -> &'static str {
    match aspect_ratio {
        "16:9" | "4:3" | "3:2" => "1536x1024",
        "9:16" | "3:4" | "2:3" => "1024x1536",
        _ => "1024x1024",
    }
}

#[derive(Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
    negative_prompt: &'a str,
    seed: u64,
    add_watermark: bool,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

/// Image generation over `POST {base}/images/generations`.
pub struct HttpImageBackend {
    http: reqwest::Client,
    api: ApiConfig,
    model: String,
}

impl HttpImageBackend {
    pub fn new(api: ApiConfig, model: impl Into<String>) -> Result<Self, PresentoError> {
        Ok(Self {
            http: http_client()?,
            api,
            model: model.into(),
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<Vec<u8>>, PresentoError> {
        let body = ImageGenerationBody {
            model: &self.model,
            prompt: &request.prompt,
            n: request.count,
            size: image_size(&request.aspect_ratio),
            response_format: "b64_json",
            negative_prompt: &request.negative_prompt,
            seed: request.seed,
            add_watermark: request.watermark,
        };

        let response = self
            .http
            .post(self.api.url("images/generations"))
            .bearer_auth(&self.api.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PresentoError::generation(
                Stage::Images,
                format!("image endpoint returned {}: {}", status, text),
            ));
        }

        let parsed: ImageGenerationResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .filter_map(|d| d.b64_json)
            .map(|encoded| {
                STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                    PresentoError::generation(Stage::Images, format!("bad base64 image: {}", e))
                })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Speech synthesis over `POST {base}/audio/speech`.
pub struct HttpSpeechBackend {
    http: reqwest::Client,
    api: ApiConfig,
    model: String,
}

impl HttpSpeechBackend {
    pub fn new(api: ApiConfig, model: impl Into<String>) -> Result<Self, PresentoError> {
        Ok(Self {
            http: http_client()?,
            api,
            model: model.into(),
        })
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechBackend {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PresentoError> {
        // The route picks the language from the text itself.
        tracing::debug!(language = %request.language_code, voice = %request.voice, "Requesting speech");

        let body = SpeechBody {
            model: &self.model,
            input: &request.text,
            voice: &request.voice,
            response_format: request.format.extension(),
        };

        let response = self
            .http
            .post(self.api.url("audio/speech"))
            .bearer_auth(&self.api.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PresentoError::generation(
                Stage::Speech,
                format!("speech endpoint returned {}: {}", status, text),
            ));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(PresentoError::generation(
                Stage::Speech,
                "speech endpoint returned no audio",
            ));
        }
        Ok(bytes.to_vec())
    }
}
