//! Podcast audio from dialogue segments.

use crate::artifacts::ArtifactStore;
use crate::backend::{AudioFormat, SpeechBackend, SpeechRequest};
use crate::config::VoicesConfig;
use crate::error::{PresentoError, Stage};
use crate::slide::{DialogueSegment, Speaker};
use crate::tts::concat_wav;

/// Synthesizes each turn with its speaker's voice and joins the clips.
pub struct SpeechSynthesisStage<'a> {
    pub speech: &'a dyn SpeechBackend,
    pub voices: &'a VoicesConfig,
}

impl SpeechSynthesisStage<'_> {
    /// Get voice ID for a speaker.
    pub fn voice_for(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Host => &self.voices.host_voice,
            Speaker::Guest => &self.voices.guest_voice,
        }
    }

    /// Render every segment in order and return the joined track.
    ///
    /// Any failed segment fails the whole stage. Per-segment files written to
    /// `store` are removed before returning, on success and on failure.
    pub async fn synthesize(
        &self,
        segments: &[DialogueSegment],
        store: &mut ArtifactStore,
    ) -> Result<Vec<u8>, PresentoError> {
        let result = self.synthesize_segments(segments, store).await;
        let failures = store.clean_intermediates().await;
        if failures > 0 {
            tracing::warn!(failures, "Some segment files were left behind");
        }
        result
    }

    async fn synthesize_segments(
        &self,
        segments: &[DialogueSegment],
        store: &mut ArtifactStore,
    ) -> Result<Vec<u8>, PresentoError> {
        let spoken: Vec<&DialogueSegment> = segments
            .iter()
            .filter(|segment| {
                let has_words = !segment.utterance.trim().is_empty();
                if !has_words {
                    tracing::warn!(
                        speaker = segment.speaker.display_name(),
                        "Skipping empty turn"
                    );
                }
                has_words
            })
            .collect();

        if spoken.is_empty() {
            return Err(PresentoError::generation(
                Stage::Speech,
                "transcript contains no spoken dialogue turns",
            ));
        }

        let mut paths = Vec::with_capacity(spoken.len());
        for (index, segment) in spoken.iter().enumerate() {
            let request = SpeechRequest {
                text: segment.utterance.clone(),
                voice: self.voice_for(segment.speaker).to_string(),
                language_code: self.voices.language_code.clone(),
                format: AudioFormat::Wav,
            };

            tracing::info!(
                segment = index + 1,
                total = spoken.len(),
                speaker = segment.speaker.display_name(),
                "Synthesizing segment"
            );
            let clip = self.speech.synthesize(&request).await?;

            let path = store
                .write_intermediate(
                    &format!("segment-{}", index + 1),
                    request.format.extension(),
                    &clip,
                )
                .await?;
            paths.push(path);
        }

        let mut clips = Vec::with_capacity(paths.len());
        for path in &paths {
            clips.push(tokio::fs::read(path).await?);
        }

        concat_wav(&clips)
    }
}
