//! Presento Core Library
//!
//! Turns a topic into a slide-deck PDF and, optionally, a narrated podcast
//! by sequencing text, image and speech generators.

pub mod admission;
pub mod artifacts;
pub mod backend;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod extract;
pub mod images;
pub mod openai;
pub mod orchestrator;
pub mod pdf;
pub mod progress;
pub mod render;
pub mod session;
pub mod slide;
pub mod speech;
pub mod tts;

#[cfg(test)]
mod testing;

pub use admission::RunAdmission;
pub use backend::{Agent, AgentBackend, ImageBackend, SessionId, SpeechBackend, TextGenerator};
pub use config::Config;
pub use error::{PresentoError, Stage};
pub use openai::{ApiConfig, HttpImageBackend, HttpSpeechBackend, OpenAiBackend};
pub use orchestrator::{Backends, PipelineOrchestrator, RunArtifacts, RunRequest};
pub use progress::{Progress, ProgressCallback};
pub use slide::{DialogueSegment, SlideDeck, SlideRecord, Speaker};
pub use tts::KokoroSpeech;
