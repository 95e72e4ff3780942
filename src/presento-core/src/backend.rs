//! Seams to the external generators.
//!
//! The orchestrator only talks to these traits; concrete clients live in
//! [`crate::openai`] and [`crate::tts`], and tests swap in stubs.

use async_trait::async_trait;
use std::fmt;

use crate::error::PresentoError;

/// Identifier of an open agent session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An instruction set run inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
    pub instruction: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
        }
    }
}

/// One-shot text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, PresentoError>;
}

/// Stateful agent sessions.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn create_session(&self) -> Result<SessionId, PresentoError>;

    /// Run `agent` on `content` inside `session` and return its final text.
    async fn run(
        &self,
        session: &SessionId,
        agent: &Agent,
        content: &str,
    ) -> Result<String, PresentoError>;

    async fn delete_session(&self, session: &SessionId) -> Result<(), PresentoError>;
}

/// Parameters for one image request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub count: u32,
    pub negative_prompt: String,
    pub seed: u64,
    pub watermark: bool,
}

/// Text-to-image generation. Returns zero or more encoded images.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<Vec<u8>>, PresentoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub language_code: String,
    pub format: AudioFormat,
}

/// Text-to-speech synthesis. Returns one encoded audio clip.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PresentoError>;
}
