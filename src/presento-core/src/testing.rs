//! Recording stubs for the backend traits.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{
    Agent, AgentBackend, ImageBackend, ImageRequest, SessionId, SpeechBackend, SpeechRequest,
    TextGenerator,
};
use crate::error::{PresentoError, Stage};
use crate::slide::{SlideDeck, SlideRecord};
use crate::tts::encode_wav;

pub const TWO_SLIDE_JSON: &str = r#"```json
[
  {"title": "Beginnings", "description": "How it started.", "takeaways": ["Curiosity", "Iteration"]},
  {"title": "Outcomes", "description": "What we learned.", "takeaways": ["Ship small"]}
]
```"#;

pub const TRANSCRIPT: &str = "Welcome to the show!\n|* Today we talk beginnings.\n|+ It all started\nwith curiosity.\n|* And outcomes?\n|+ Ship small.";

pub fn sample_deck() -> SlideDeck {
    vec![
        SlideRecord::new("Beginnings", "How it started.").with_takeaways(["Curiosity", "Iteration"]),
        SlideRecord::new("Outcomes", "What we learned.").with_takeaways(["Ship small"]),
    ]
}

/// A small PNG image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 120, 40]),
    ));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageOutputFormat::Png)
        .unwrap();
    cursor.into_inner()
}

/// Narrative generator returning a fixed story.
pub struct StubText {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl StubText {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls seen.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubText {
    async fn generate(
        &self,
        _system: &str,
        prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, PresentoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("A long story about {}.", prompt))
    }
}

/// One recorded agent run.
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub session: SessionId,
    pub agent: String,
    pub content: String,
}

/// Agent sessions answering from per-agent queues.
pub struct StubAgents {
    next_id: AtomicUsize,
    created: Mutex<Vec<SessionId>>,
    deleted: Mutex<Vec<SessionId>>,
    delete_attempts: AtomicUsize,
    fail_delete_at: Option<usize>,
    failing_agent: Option<String>,
    responses: Mutex<HashMap<String, VecDeque<String>>>,
    calls: Mutex<Vec<AgentCall>>,
}

impl StubAgents {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            delete_attempts: AtomicUsize::new(0),
            fail_delete_at: None,
            failing_agent: None,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies for `agent`; once drained, defaults apply.
    pub fn with_responses<I, S>(self, agent: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .lock()
            .unwrap()
            .insert(agent.to_string(), replies.into_iter().map(Into::into).collect());
        self
    }

    /// Make the delete call with this zero-based index fail.
    pub fn failing_delete(mut self, index: usize) -> Self {
        self.fail_delete_at = Some(index);
        self
    }

    /// Make every run of `agent` fail.
    pub fn failing_agent(mut self, agent: &str) -> Self {
        self.failing_agent = Some(agent.to_string());
        self
    }

    pub fn created(&self) -> Vec<SessionId> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<SessionId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, agent: &str) -> Vec<AgentCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.agent == agent)
            .collect()
    }

    fn default_reply(agent: &str, content: &str) -> String {
        match agent {
            "JSON Converter" => TWO_SLIDE_JSON.to_string(),
            "Podcast Writer" => TRANSCRIPT.to_string(),
            "Image Descriptions" => "A watercolor of a lighthouse".to_string(),
            _ => format!("=== slide ===\n{}", content),
        }
    }
}

#[async_trait]
impl AgentBackend for StubAgents {
    async fn create_session(&self) -> Result<SessionId, PresentoError> {
        let id = SessionId(format!(
            "session-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        ));
        self.created.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn run(
        &self,
        session: &SessionId,
        agent: &Agent,
        content: &str,
    ) -> Result<String, PresentoError> {
        self.calls.lock().unwrap().push(AgentCall {
            session: session.clone(),
            agent: agent.name.clone(),
            content: content.to_string(),
        });

        if self.failing_agent.as_deref() == Some(agent.name.as_str()) {
            return Err(PresentoError::generation(
                Stage::Slides,
                format!("{} is unavailable", agent.name),
            ));
        }

        let queued = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&agent.name)
            .and_then(|q| q.pop_front());
        Ok(queued.unwrap_or_else(|| Self::default_reply(&agent.name, content)))
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), PresentoError> {
        let attempt = self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_at == Some(attempt) {
            return Err(PresentoError::ResourceCleanup {
                session: session.to_string(),
                message: "backend refused".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(session.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Image,
    Empty,
    Fail,
}

/// Image backend playing back scripted outcomes, then succeeding.
pub struct StubImages {
    script: Mutex<VecDeque<ImageOutcome>>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl StubImages {
    pub fn new(script: Vec<ImageOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always_succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBackend for StubImages {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<Vec<u8>>, PresentoError> {
        self.requests.lock().unwrap().push(request.clone());
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ImageOutcome::Image);
        match outcome {
            ImageOutcome::Image => Ok(vec![png_bytes(4, 3)]),
            ImageOutcome::Empty => Ok(Vec::new()),
            ImageOutcome::Fail => Err(PresentoError::generation(Stage::Images, "quota exceeded")),
        }
    }
}

/// Speech backend emitting silence proportional to the text length.
pub struct StubSpeech {
    fail_at: Option<usize>,
    requests: Mutex<Vec<SpeechRequest>>,
    clips: Mutex<Vec<Vec<u8>>>,
}

impl StubSpeech {
    pub fn new() -> Self {
        Self {
            fail_at: None,
            requests: Mutex::new(Vec::new()),
            clips: Mutex::new(Vec::new()),
        }
    }

    /// Fail the request with this zero-based index.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clips(&self) -> Vec<Vec<u8>> {
        self.clips.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechBackend for StubSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PresentoError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(PresentoError::generation(Stage::Speech, "voice unavailable"));
        }

        let clip = encode_wav(&vec![0.25; request.text.len() * 10], 24_000)?;
        self.clips.lock().unwrap().push(clip.clone());
        Ok(clip)
    }
}
