//! Slide and dialogue records produced during a run.

use serde::{Deserialize, Serialize};

/// One slide of a generated deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SlideRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Bullet points, in display order.
    #[serde(default)]
    pub takeaways: Vec<String>,
    /// Encoded image bytes, attached by the image stage.
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl SlideRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_takeaways<I, S>(mut self, takeaways: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.takeaways = takeaways.into_iter().map(Into::into).collect();
        self
    }

    /// Attach an image unless one is already present.
    ///
    /// Returns `false` when the slide already had an image.
    pub fn attach_image(&mut self, image: Vec<u8>) -> bool {
        if self.image.is_some() {
            return false;
        }
        self.image = Some(image);
        true
    }
}

/// The slides of one run. Its length is fixed once extracted.
pub type SlideDeck = Vec<SlideRecord>;

/// Who is speaking in a podcast turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Speaker {
    Host,
    Guest,
}

impl Speaker {
    pub fn display_name(&self) -> &str {
        match self {
            Speaker::Host => "HOST",
            Speaker::Guest => "GUEST",
        }
    }
}

/// A single conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSegment {
    pub speaker: Speaker,
    pub utterance: String,
}

impl DialogueSegment {
    pub fn new(speaker: Speaker, utterance: impl Into<String>) -> Self {
        Self {
            speaker,
            utterance: utterance.into(),
        }
    }
}
