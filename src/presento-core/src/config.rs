//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PresentoError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub generation: GenerationConfig,
    pub images: ImagesConfig,
    pub retry: RetryConfig,
    pub voices: VoicesConfig,
    pub prompts: PromptsConfig,
    pub output: OutputConfig,
    pub service: ServiceConfig,
}

/// Model identifiers passed to the backends.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub text_model: String,
    pub image_model: String,
    pub speech_model: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text_model: "gpt-4o".to_string(),
            image_model: "gpt-image-1".to_string(),
            speech_model: "tts-1".to_string(),
        }
    }
}

/// Text generation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub narrative_max_tokens: u32,
    /// Pause after opening an agent session.
    pub session_settle_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            narrative_max_tokens: 8192,
            session_settle_ms: 1000,
        }
    }
}

impl GenerationConfig {
    pub fn session_settle(&self) -> Duration {
        Duration::from_millis(self.session_settle_ms)
    }
}

/// Fixed parameters for every image request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub aspect_ratio: String,
    pub negative_prompt: String,
    pub watermark: bool,
    pub seed_min: u64,
    pub seed_max: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".to_string(),
            negative_prompt: "blurry and deformed".to_string(),
            watermark: false,
            seed_min: 100,
            seed_max: 500_000,
        }
    }
}

/// Retry policy for the image stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub host_voice: String,
    pub guest_voice: String,
    pub language_code: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            host_voice: "af_sky".to_string(),
            guest_voice: "bm_george".to_string(),
            language_code: "en-US".to_string(),
        }
    }
}

/// Instruction sets for the generation agents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub story_writer: String,
    pub slide_generator: String,
    pub slide_refiner: String,
    pub image_describer: String,
    pub json_converter: String,
    pub podcast_writer: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            story_writer: DEFAULT_STORY_WRITER.to_string(),
            slide_generator: DEFAULT_SLIDE_GENERATOR.to_string(),
            slide_refiner: DEFAULT_SLIDE_REFINER.to_string(),
            image_describer: DEFAULT_IMAGE_DESCRIBER.to_string(),
            json_converter: DEFAULT_JSON_CONVERTER.to_string(),
            podcast_writer: DEFAULT_PODCAST_WRITER.to_string(),
        }
    }
}

/// Where artifacts and the operational log go.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub log_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            log_file: PathBuf::from("presentation_generation.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub max_concurrent_runs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PresentoError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PresentoError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, PresentoError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PresentoError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PresentoError> {
        if self.voices.host_voice.trim().is_empty() || self.voices.guest_voice.trim().is_empty() {
            return Err(PresentoError::Config(
                "Voice IDs cannot be empty".to_string(),
            ));
        }
        if self.images.seed_min > self.images.seed_max {
            return Err(PresentoError::Config(format!(
                "Empty seed range {}..={}",
                self.images.seed_min, self.images.seed_max
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(PresentoError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.service.max_concurrent_runs == 0 {
            return Err(PresentoError::Config(
                "service.max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

const DEFAULT_STORY_WRITER: &str = "You are a helpful story writer and an expert on any given topic. Do not ask clarifying questions.";

const DEFAULT_SLIDE_GENERATOR: &str = "You create clear, concise slide decks. Each slide has a title, a short paragraph (max 3 sentences), and bullet points (a MUST have). Separate slides with '=== slide ==='.";

const DEFAULT_SLIDE_REFINER: &str = r#"You are a slide deck expert, specializing in creating clear, concise, and engaging presentations.
Your task is to review and improve the provided slide deck.
For each slide in the deck, carefully analyze the title, description, and key takeaways.
Suggest changes that enhance clarity, conciseness, and audience engagement.
If a slide effectively communicates its message and does not require improvement, leave the text as is.
You MUST return the FULL revised slide deck, including ALL original slides, even if unchanged.
Separate slides with '=== slide ==='."#;

const DEFAULT_IMAGE_DESCRIBER: &str = "You generate evocative image descriptions for slides, capturing the essence of the content and era. Suitable for a watercolor illustration.";

const DEFAULT_JSON_CONVERTER: &str = r#"Convert slide text to JSON: ```json
[
  {
    "title": "<title>",
    "description": "<description>",
    "takeaways": ["<takeaway 1>", "<takeaway 2>", "<takeaway 3>"]
  }, ...
]
```"#;

const DEFAULT_PODCAST_WRITER: &str = r#"You write a lively two-person podcast conversation about the slide deck you are given as JSON.

SPEAKERS:
- The host introduces the topic and asks questions.
- The guest is an expert who explains each slide.

OUTPUT RULES:
- Start every host turn on a new line with "|* "
- Start every guest turn on a new line with "|+ "
- Output ONLY spoken words - no stage directions, no markdown
"#;
