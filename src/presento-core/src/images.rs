//! Per-slide image generation.

use std::time::Duration;

use rand::Rng;

use crate::backend::{Agent, AgentBackend, ImageBackend, ImageRequest, SessionId};
use crate::config::{ImagesConfig, RetryConfig};
use crate::error::{PresentoError, Stage};
use crate::progress::{ProgressReporter, subrange};
use crate::slide::{SlideDeck, SlideRecord};

/// Progress span covered by the image stage.
pub const IMAGES_START: f32 = 0.4;
pub const IMAGES_SPAN: f32 = 0.5;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): 1x, 2x, 4x... capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Pick the seed shared by every image request of a run.
pub fn pick_seed(settings: &ImagesConfig) -> u64 {
    rand::rng().random_range(settings.seed_min..=settings.seed_max)
}

fn describe_request(topic: &str, slide: &SlideRecord) -> String {
    format!(
        "Topic: {}.\nSlide title: {}\nSlide main message: {}\nSlide bullet points: {:?}",
        topic, slide.title, slide.description, slide.takeaways
    )
}

/// Attaches one generated image to every slide of a deck.
pub struct ImageAttachmentStage<'a> {
    pub agents: &'a dyn AgentBackend,
    pub images: &'a dyn ImageBackend,
    pub describer: &'a Agent,
    pub settings: &'a ImagesConfig,
    pub retry: &'a RetryPolicy,
}

impl ImageAttachmentStage<'_> {
    /// Attach images with a freshly picked run seed.
    pub async fn attach(
        &self,
        deck: &mut SlideDeck,
        topic: &str,
        session: &SessionId,
        progress: &mut ProgressReporter,
    ) -> Result<(), PresentoError> {
        let seed = pick_seed(self.settings);
        tracing::info!(seed, "Random seed");
        self.attach_with_seed(deck, topic, session, seed, progress)
            .await
    }

    /// Attach images in deck order using `seed` for every request.
    pub async fn attach_with_seed(
        &self,
        deck: &mut SlideDeck,
        topic: &str,
        session: &SessionId,
        seed: u64,
        progress: &mut ProgressReporter,
    ) -> Result<(), PresentoError> {
        let total = deck.len();

        for (index, slide) in deck.iter_mut().enumerate() {
            if slide.image.is_none() {
                let image = self.generate_for(slide, topic, session, seed, index).await?;
                slide.attach_image(image);
            }

            progress.report(
                subrange(IMAGES_START, IMAGES_SPAN, index + 1, total),
                format!("Generating image {}/{}", index + 1, total),
            );
        }

        Ok(())
    }

    async fn generate_for(
        &self,
        slide: &SlideRecord,
        topic: &str,
        session: &SessionId,
        seed: u64,
        index: usize,
    ) -> Result<Vec<u8>, PresentoError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let last = match self.try_once(slide, topic, session, seed).await {
                Ok((prompt, Some(image))) => {
                    tracing::info!(slide = index + 1, %prompt, "Generated image");
                    return Ok(image);
                }
                Ok((prompt, None)) => {
                    tracing::warn!(slide = index + 1, %prompt, attempt, "No image generated. Retrying...");
                    format!("no image returned for prompt: {}", prompt)
                }
                Err(e) => {
                    tracing::error!(slide = index + 1, attempt, error = %e, "Image generation error. Retrying...");
                    e.to_string()
                }
            };

            if attempt >= self.retry.max_attempts {
                return Err(PresentoError::RetriesExhausted {
                    stage: Stage::Images,
                    attempts: attempt,
                    last,
                });
            }

            tokio::time::sleep(self.retry.delay_for(attempt)).await;
        }
    }

    async fn try_once(
        &self,
        slide: &SlideRecord,
        topic: &str,
        session: &SessionId,
        seed: u64,
    ) -> Result<(String, Option<Vec<u8>>), PresentoError> {
        let prompt = self
            .agents
            .run(session, self.describer, &describe_request(topic, slide))
            .await?;

        let request = ImageRequest {
            prompt: prompt.clone(),
            aspect_ratio: self.settings.aspect_ratio.clone(),
            count: 1,
            negative_prompt: self.settings.negative_prompt.clone(),
            seed,
            watermark: self.settings.watermark,
        };

        let image = self
            .images
            .generate(&request)
            .await?
            .into_iter()
            .find(|blob| !blob.is_empty());

        Ok((prompt, image))
    }
}
