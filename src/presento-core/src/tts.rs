//! Local speech synthesis with kokoro-tiny, plus WAV helpers.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;

use crate::backend::{SpeechBackend, SpeechRequest};
use crate::error::{PresentoError, Stage};

/// Sample rate of kokoro output.
pub const KOKORO_SAMPLE_RATE: u32 = 24_000;

/// Speech backend running the kokoro model in-process.
pub struct KokoroSpeech {
    engine: Arc<Mutex<TtsEngine>>,
    available_voices: Vec<String>,
}

impl KokoroSpeech {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new() -> Result<Self, PresentoError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PresentoError::Config(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            available_voices,
        })
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), PresentoError> {
        if !self.available_voices.iter().any(|v| v == voice_id) {
            let mut english: Vec<&String> = self
                .available_voices
                .iter()
                .filter(|v| {
                    v.starts_with("af_")
                        || v.starts_with("am_")
                        || v.starts_with("bf_")
                        || v.starts_with("bm_")
                })
                .collect();
            english.sort();

            return Err(PresentoError::Config(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                english
                    .iter()
                    .map(|v| format!("  - {}", v))
                    .collect::<Vec<_>>()
                    .join("\n")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechBackend for KokoroSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PresentoError> {
        self.validate_voice(&request.voice)?;

        // Kokoro has a strict limit on input length.
        let chunks = split_into_chunks(&request.text, 200);

        let voice = request.voice.clone();
        let samples = synthesize_blocking(self.engine.clone(), chunks, move |engine, chunk| {
            engine.synthesize(chunk, Some(voice.as_str()))
        })
        .await?;

        if samples.is_empty() {
            return Err(PresentoError::generation(
                Stage::Speech,
                "synthesis produced no audio",
            ));
        }

        encode_wav(&samples, KOKORO_SAMPLE_RATE)
    }
}

/// Run `synth` over every chunk on the blocking pool, holding the engine
/// lock for the whole segment so chunks of one turn stay together.
async fn synthesize_blocking<E, F>(
    engine: Arc<Mutex<E>>,
    chunks: Vec<String>,
    synth: F,
) -> Result<Vec<f32>, PresentoError>
where
    E: Send + 'static,
    F: Fn(&mut E, &str) -> Result<Vec<f32>, String> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<Vec<f32>, PresentoError> {
        let mut engine = engine.lock().map_err(|_| {
            PresentoError::generation(Stage::Speech, "TTS engine lock poisoned")
        })?;

        let mut samples = Vec::new();
        for chunk in &chunks {
            let chunk_samples = synth(&mut *engine, chunk).map_err(|e| {
                PresentoError::generation(Stage::Speech, format!("Synthesis failed: {}", e))
            })?;
            samples.extend(chunk_samples);
        }
        Ok(samples)
    })
    .await
    .map_err(|e| PresentoError::generation(Stage::Speech, format!("synthesis task failed: {}", e)))?
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // If single sentence is too long, split by commas
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Encode mono f32 samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, PresentoError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Duration of a WAV clip in frames per channel.
pub fn wav_frames(clip: &[u8]) -> Result<u32, PresentoError> {
    let reader = hound::WavReader::new(Cursor::new(clip))?;
    Ok(reader.duration())
}

/// Concatenate WAV clips back to back, with no gaps.
///
/// All clips must share the same sample rate, channel count and sample
/// format as the first one.
pub fn concat_wav(clips: &[Vec<u8>]) -> Result<Vec<u8>, PresentoError> {
    let first = clips
        .first()
        .ok_or_else(|| PresentoError::generation(Stage::Speech, "no audio clips to join"))?;
    let spec = hound::WavReader::new(Cursor::new(first.as_slice()))?.spec();

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for (index, clip) in clips.iter().enumerate() {
            let mut reader = hound::WavReader::new(Cursor::new(clip.as_slice()))?;
            if reader.spec() != spec {
                return Err(PresentoError::generation(
                    Stage::Speech,
                    format!("clip {} has a different WAV format", index + 1),
                ));
            }
            match spec.sample_format {
                hound::SampleFormat::Int => {
                    for sample in reader.samples::<i32>() {
                        writer.write_sample(sample?)?;
                    }
                }
                hound::SampleFormat::Float => {
                    for sample in reader.samples::<f32>() {
                        writer.write_sample(sample?)?;
                    }
                }
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_synthesis_leaves_runtime_free() {
        let engine = Arc::new(Mutex::new(0usize));
        let chunks = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let synth = async {
            let samples = synthesize_blocking(engine.clone(), chunks, |calls, chunk| {
                std::thread::sleep(Duration::from_millis(60));
                *calls += 1;
                Ok(vec![0.0; chunk.len()])
            })
            .await
            .unwrap();
            (samples, Instant::now())
        };
        let ticker = async {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Instant::now()
        };

        let ((samples, synth_done), ticker_done) = tokio::join!(synth, ticker);

        assert!(ticker_done < synth_done);
        assert_eq!(samples.len(), 3 + 3 + 5);
        assert_eq!(*engine.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_chunk_failure_is_speech_error() {
        let engine = Arc::new(Mutex::new(()));
        let result = synthesize_blocking(engine, vec!["a".to_string()], |_, _| {
            Err("model exploded".to_string())
        })
        .await;

        assert!(matches!(
            result,
            Err(PresentoError::Generation {
                stage: Stage::Speech,
                ..
            })
        ));
    }

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.len() <= 35);
        }
    }

    #[test]
    fn test_split_into_chunks_keeps_all_words() {
        let text = "One, two, three, four, five, six, seven, eight, nine, ten.";
        let joined = split_into_chunks(text, 15).join(" ");
        for word in ["One", "five", "ten."] {
            assert!(joined.contains(word));
        }
    }

    #[test]
    fn test_encode_wav_frame_count() {
        let clip = encode_wav(&[0.0, 0.5, -0.5, 1.0], 24_000).unwrap();
        assert_eq!(wav_frames(&clip).unwrap(), 4);
    }

    #[test]
    fn test_concat_has_no_gaps() {
        let a = encode_wav(&[0.1; 100], 24_000).unwrap();
        let b = encode_wav(&[0.2; 250], 24_000).unwrap();
        let joined = concat_wav(&[a, b]).unwrap();
        assert_eq!(wav_frames(&joined).unwrap(), 350);
    }

    #[test]
    fn test_concat_rejects_mismatched_rates() {
        let a = encode_wav(&[0.1; 10], 24_000).unwrap();
        let b = encode_wav(&[0.1; 10], 16_000).unwrap();
        assert!(concat_wav(&[a, b]).is_err());
    }

    #[test]
    fn test_concat_requires_clips() {
        assert!(concat_wav(&[]).is_err());
    }
}
