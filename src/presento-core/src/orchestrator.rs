//! Pipeline orchestration.
//!
//! Runs story generation, slide generation, refinement, structured
//! extraction, image attachment, rendering and the optional podcast, and
//! releases every agent session the run opened before returning.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::backend::{Agent, AgentBackend, ImageBackend, SessionId, SpeechBackend, TextGenerator};
use crate::config::{Config, PromptsConfig};
use crate::dialogue;
use crate::error::{PresentoError, Stage};
use crate::extract;
use crate::images::{IMAGES_START, ImageAttachmentStage, RetryPolicy};
use crate::progress::{ProgressCallback, ProgressReporter, subrange};
use crate::render;
use crate::session::SessionLedger;
use crate::slide::{DialogueSegment, SlideDeck};
use crate::speech::SpeechSynthesisStage;

const REFINE_START: f32 = 0.2;
const REFINE_SPAN: f32 = 0.1;

/// The generators a pipeline runs against.
#[derive(Clone)]
pub struct Backends {
    pub text: Arc<dyn TextGenerator>,
    pub agents: Arc<dyn AgentBackend>,
    pub images: Arc<dyn ImageBackend>,
    /// Required only for podcast runs.
    pub speech: Option<Arc<dyn SpeechBackend>>,
}

/// The instruction sets run inside sessions.
#[derive(Debug, Clone)]
pub struct AgentSet {
    pub slide_generator: Agent,
    pub slide_refiner: Agent,
    pub image_describer: Agent,
    pub json_converter: Agent,
    pub podcast_writer: Agent,
}

impl AgentSet {
    pub fn from_prompts(prompts: &PromptsConfig) -> Self {
        Self {
            slide_generator: Agent::new("Slide Generator", &prompts.slide_generator),
            slide_refiner: Agent::new("Slide Refiner", &prompts.slide_refiner),
            image_describer: Agent::new("Image Descriptions", &prompts.image_describer),
            json_converter: Agent::new("JSON Converter", &prompts.json_converter),
            podcast_writer: Agent::new("Podcast Writer", &prompts.podcast_writer),
        }
    }
}

/// What to generate in one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub topic: String,
    pub refinement_rounds: u32,
    pub podcast: bool,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, refinement_rounds: u32) -> Self {
        Self {
            topic: topic.into(),
            refinement_rounds,
            podcast: false,
        }
    }

    pub fn with_podcast(mut self, podcast: bool) -> Self {
        self.podcast = podcast;
        self
    }
}

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub run_id: String,
    pub document: Vec<u8>,
    pub document_path: PathBuf,
    pub audio: Option<Vec<u8>>,
    pub audio_path: Option<PathBuf>,
    pub deck: SlideDeck,
    pub segments: Vec<DialogueSegment>,
}

/// State owned by one invocation of the pipeline.
struct PipelineRun {
    id: String,
    request: RunRequest,
    deck_text: String,
    deck: SlideDeck,
    segments: Vec<DialogueSegment>,
    sessions: SessionLedger,
    progress: ProgressReporter,
}

/// Re-tag backend failures with the stage they happened in.
fn at_stage(stage: Stage) -> impl FnOnce(PresentoError) -> PresentoError {
    move |e| match e {
        PresentoError::Generation { message, .. } => PresentoError::Generation { stage, message },
        e @ (PresentoError::OpenAI(_) | PresentoError::Http(_) | PresentoError::Json(_)) => {
            PresentoError::generation(stage, e.to_string())
        }
        other => other,
    }
}

/// Orchestrates one or more presentation runs over shared backends.
pub struct PipelineOrchestrator {
    config: Config,
    backends: Backends,
    agents: AgentSet,
    retry: RetryPolicy,
    callback: Option<ProgressCallback>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator with the given configuration.
    pub fn new(config: Config, backends: Backends) -> Result<Self, PresentoError> {
        config.validate()?;
        let agents = AgentSet::from_prompts(&config.prompts);
        let retry = RetryPolicy::from_config(&config.retry);

        Ok(Self {
            config,
            backends,
            agents,
            retry,
            callback: None,
        })
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn validate(&self, request: &RunRequest) -> Result<(), PresentoError> {
        if request.topic.trim().is_empty() {
            return Err(PresentoError::InvalidRequest(
                "topic cannot be empty".to_string(),
            ));
        }
        if request.refinement_rounds == 0 {
            return Err(PresentoError::InvalidRequest(
                "at least one refinement round is required".to_string(),
            ));
        }
        if request.podcast && self.backends.speech.is_none() {
            return Err(PresentoError::InvalidRequest(
                "podcast mode needs a speech backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the full pipeline for `request`.
    ///
    /// Every session opened along the way is released before this returns,
    /// whether the run succeeded or not.
    pub async fn run(&self, request: RunRequest) -> Result<RunArtifacts, PresentoError> {
        self.validate(&request)?;

        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id, topic = %request.topic);

        async move {
            let mut run = PipelineRun {
                progress: ProgressReporter::new(run_id.clone(), self.callback.clone()),
                id: run_id,
                request,
                deck_text: String::new(),
                deck: SlideDeck::new(),
                segments: Vec::new(),
                sessions: SessionLedger::new(),
            };

            let result = self.execute(&mut run).await;

            let opened = run.sessions.len();
            let failures = run.sessions.release_all(self.backends.agents.as_ref()).await;
            tracing::info!(opened, failures, "Released sessions");

            match result {
                Ok(artifacts) => {
                    run.progress.report(1.0, "Done!");
                    Ok(artifacts)
                }
                Err(e) => {
                    if let PresentoError::StructuredData { message, raw } = &e {
                        tracing::error!(%message, %raw, "JSON decoding error");
                    } else {
                        tracing::error!(error = %e, "Run failed");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn open_session(&self, run: &mut PipelineRun) -> Result<SessionId, PresentoError> {
        let id = run.sessions.open(self.backends.agents.as_ref()).await?;
        let settle = self.config.generation.session_settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(id)
    }

    async fn execute(&self, run: &mut PipelineRun) -> Result<RunArtifacts, PresentoError> {
        let agents = self.backends.agents.as_ref();
        let mut store = ArtifactStore::open(&self.config.output.directory, run.id.clone()).await?;

        run.progress.report(0.0, "Generating story...");
        let story = self
            .backends
            .text
            .generate(
                &self.config.prompts.story_writer,
                &run.request.topic,
                self.config.generation.narrative_max_tokens,
            )
            .await
            .map_err(at_stage(Stage::Narrative))?;
        tracing::info!(%story, "Generated story");

        run.progress.report(0.1, "Generating initial slides...");
        let session = self.open_session(run).await.map_err(at_stage(Stage::Slides))?;
        run.deck_text = agents
            .run(
                &session,
                &self.agents.slide_generator,
                &format!("Write a slide deck for:\n{}", story),
            )
            .await
            .map_err(at_stage(Stage::Slides))?;
        tracing::info!(slides = %run.deck_text, "Generated initial slides");

        self.refine(run).await?;

        run.progress.report(0.3, "Converting to JSON...");
        let session = self.open_session(run).await.map_err(at_stage(Stage::Extract))?;
        let raw = agents
            .run(&session, &self.agents.json_converter, &run.deck_text)
            .await
            .map_err(at_stage(Stage::Extract))?;
        run.deck = extract::extract(&raw)?;

        run.progress.report(IMAGES_START, "Generating image descriptions and images...");
        let session = self.open_session(run).await.map_err(at_stage(Stage::Images))?;
        let stage = ImageAttachmentStage {
            agents,
            images: self.backends.images.as_ref(),
            describer: &self.agents.image_describer,
            settings: &self.config.images,
            retry: &self.retry,
        };
        stage
            .attach(&mut run.deck, &run.request.topic, &session, &mut run.progress)
            .await?;

        run.progress.report(0.9, "Creating PDF...");
        let deck = run.deck.clone();
        let title = run.request.topic.clone();
        let document = tokio::task::spawn_blocking(move || render::render(&deck, &title))
            .await
            .map_err(|e| PresentoError::Render(format!("render task failed: {}", e)))??;

        let audio = if run.request.podcast {
            Some(self.podcast(run, &mut store).await?)
        } else {
            None
        };

        // Nothing final is written until every stage has succeeded.
        let written = self.write_outputs(&mut store, &document, audio.as_deref()).await;
        let (document_path, audio_path) = match written {
            Ok(paths) => paths,
            Err(e) => {
                store.discard_finals().await;
                return Err(e);
            }
        };

        Ok(RunArtifacts {
            run_id: run.id.clone(),
            document,
            document_path,
            audio,
            audio_path,
            deck: run.deck.clone(),
            segments: run.segments.clone(),
        })
    }

    async fn write_outputs(
        &self,
        store: &mut ArtifactStore,
        document: &[u8],
        audio: Option<&[u8]>,
    ) -> Result<(PathBuf, Option<PathBuf>), PresentoError> {
        let document_path = store.write_final("slides", "pdf", document).await?;
        let audio_path = match audio {
            Some(audio) => Some(store.write_final("podcast", "wav", audio).await?),
            None => None,
        };
        Ok((document_path, audio_path))
    }

    /// Replace the deck text with each refiner round's full output.
    async fn refine(&self, run: &mut PipelineRun) -> Result<(), PresentoError> {
        let rounds = run.request.refinement_rounds as usize;
        run.progress.report(REFINE_START, "Refining slides...");

        for round in 0..rounds {
            let session = self.open_session(run).await.map_err(at_stage(Stage::Refine))?;
            let refined = self
                .backends
                .agents
                .run(&session, &self.agents.slide_refiner, &run.deck_text)
                .await
                .map_err(at_stage(Stage::Refine))?;
            run.deck_text = refined;

            run.progress.report(
                subrange(REFINE_START, REFINE_SPAN, round + 1, rounds),
                format!("Refining slides (round {}/{})", round + 1, rounds),
            );
            tracing::info!(round = round + 1, slides = %run.deck_text, "Refined slides");
        }

        Ok(())
    }

    async fn podcast(
        &self,
        run: &mut PipelineRun,
        store: &mut ArtifactStore,
    ) -> Result<Vec<u8>, PresentoError> {
        let speech = self.backends.speech.as_deref().ok_or_else(|| {
            PresentoError::InvalidRequest("podcast mode needs a speech backend".to_string())
        })?;

        run.progress.report(0.92, "Writing podcast script...");
        let slides_json = serde_json::to_string_pretty(&run.deck)?;
        let session = self.open_session(run).await.map_err(at_stage(Stage::Dialogue))?;
        let transcript = self
            .backends
            .agents
            .run(&session, &self.agents.podcast_writer, &slides_json)
            .await
            .map_err(at_stage(Stage::Dialogue))?;
        tracing::info!(%transcript, "Generated podcast script");

        run.segments = dialogue::segment(&transcript);
        if run.segments.is_empty() {
            return Err(PresentoError::generation(
                Stage::Dialogue,
                "transcript has no host or guest turns",
            ));
        }

        run.progress.report(0.95, "Synthesizing podcast audio...");
        let stage = SpeechSynthesisStage {
            speech,
            voices: &self.config.voices,
        };
        stage
            .synthesize(&run.segments, store)
            .await
            .map_err(at_stage(Stage::Speech))
    }
}
