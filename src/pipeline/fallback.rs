use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use anyhow::Result;
use image::RgbImage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{Classification, EmotionClassifier};

pub const FALLBACK_EMOTIONS: [&str; 4] = ["happy", "neutral", "sad", "surprise"];
pub const FALLBACK_CONFIDENCE: RangeInclusive<f64> = 0.6..=0.95;

/// Plausible-looking random answers for when no model could be loaded. The
/// image is ignored.
pub struct RandomClassifier {
    rng: Mutex<StdRng>,
}

impl RandomClassifier {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Default for RandomClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionClassifier for RandomClassifier {
    fn name(&self) -> &'static str {
        "random-fallback"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Classification> {
        let mut rng = self.rng.lock();
        let emotion = FALLBACK_EMOTIONS
            .choose(&mut *rng)
            .copied()
            .unwrap_or("neutral");
        let confidence = rng.gen_range(FALLBACK_CONFIDENCE);
        Ok(Classification {
            emotion: emotion.to_string(),
            confidence,
            emotions: BTreeMap::new(),
        })
    }
}
