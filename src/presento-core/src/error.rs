//! Error types for the presentation pipeline.

use std::fmt;

use thiserror::Error;

/// A pipeline stage, used to tag errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Narrative,
    Slides,
    Refine,
    Extract,
    Images,
    Dialogue,
    Speech,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Narrative => "narrative",
            Stage::Slides => "slides",
            Stage::Refine => "refine",
            Stage::Extract => "extract",
            Stage::Images => "images",
            Stage::Dialogue => "dialogue",
            Stage::Speech => "speech",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
pub enum PresentoError {
    #[error("{stage} generation failed: {message}")]
    Generation { stage: Stage, message: String },

    #[error("{stage} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        stage: Stage,
        attempts: u32,
        last: String,
    },

    #[error("Invalid structured output: {message}")]
    StructuredData { message: String, raw: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Failed to release session {session}: {message}")]
    ResourceCleanup { session: String, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PresentoError {
    /// Shorthand for a [`PresentoError::Generation`] error.
    pub fn generation(stage: Stage, message: impl Into<String>) -> Self {
        PresentoError::Generation {
            stage,
            message: message.into(),
        }
    }

    /// Message shown to whoever started the run.
    pub fn user_message(&self) -> String {
        match self {
            PresentoError::StructuredData { .. } => "Error: Invalid JSON generated.".to_string(),
            other => format!("An error occurred: {}", other),
        }
    }
}
