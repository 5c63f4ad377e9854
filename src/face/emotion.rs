//! Facial emotion classification.
//!
//! Uses the FER+ network from the ONNX model zoo. It takes a 64x64 grayscale crop of a face and
//! outputs one score per [`Emotion`].

use std::{fmt, path::Path};

use anyhow::Context;
use itertools::Itertools;

use crate::image::AsImageView;
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::{softmax_in_place, TotalF32};
use crate::timer::Timer;

/// An emotion the classifier can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
    Contempt,
}

impl Emotion {
    /// All emotions, in declaration order.
    pub const ALL: [Emotion; 8] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
        Emotion::Contempt,
    ];

    /// Returns the lower-case label used in annotations and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
            Emotion::Contempt => "contempt",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order of the network's output logits.
const NETWORK_ORDER: [Emotion; 8] = [
    Emotion::Neutral,
    Emotion::Happy,
    Emotion::Surprise,
    Emotion::Sad,
    Emotion::Angry,
    Emotion::Disgust,
    Emotion::Fear,
    Emotion::Contempt,
];

/// Per-emotion scores of a single face, as percentages that sum to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionReading {
    scores: [f32; 8],
}

impl EmotionReading {
    /// Creates a reading from per-emotion percentages, in the order of [`Emotion::ALL`].
    pub fn new(scores: [f32; 8]) -> Self {
        Self { scores }
    }

    /// Creates a reading with `confidence` percent for `emotion`, and the rest of the 100% spread
    /// evenly over all other emotions.
    pub fn single(emotion: Emotion, confidence: f32) -> Self {
        let rest = (100.0 - confidence) / 7.0;
        let mut scores = [rest; 8];
        scores[emotion as usize] = confidence;
        Self { scores }
    }

    /// Creates a reading from raw network logits, given in the network's output order.
    fn from_logits(mut logits: [f32; 8]) -> Self {
        softmax_in_place(&mut logits);

        let mut scores = [0.0; 8];
        for (emotion, prob) in NETWORK_ORDER.iter().zip(logits) {
            scores[*emotion as usize] = prob * 100.0;
        }
        Self { scores }
    }

    /// Returns the emotion with the highest score.
    pub fn dominant(&self) -> Emotion {
        let index = self
            .scores
            .iter()
            .position_max_by_key(|score| TotalF32(**score))
            .unwrap_or(Emotion::Neutral as usize);
        Emotion::ALL[index]
    }

    /// Returns the score of the dominant emotion, in percent.
    pub fn confidence(&self) -> f32 {
        self.score(self.dominant())
    }

    /// Returns the score of `emotion`, in percent.
    pub fn score(&self, emotion: Emotion) -> f32 {
        self.scores[emotion as usize]
    }

    /// Iterates over all emotions and their scores.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.into_iter().map(|emotion| (emotion, self.score(emotion)))
    }
}

/// The FER+ emotion recognition network.
pub struct EmotionNetwork {
    cnn: Cnn,
}

impl EmotionNetwork {
    /// Model file name expected in the model directory.
    pub const MODEL_FILE: &'static str = "emotion-ferplus-8.onnx";

    /// Loads the network from [`Self::MODEL_FILE`] in `model_dir`.
    pub fn load<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        let path = model_dir.as_ref().join(Self::MODEL_FILE);
        let nn = NeuralNetwork::from_path(&path)?
            .load()
            .with_context(|| format!("failed to load emotion model '{}'", path.display()))?;

        // The network wants unnormalized grayscale values.
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=255.0))?;
        Ok(Self { cnn })
    }

    fn extract(outputs: &Outputs) -> anyhow::Result<EmotionReading> {
        anyhow::ensure!(!outputs.is_empty(), "emotion network produced no outputs");
        let scores = &outputs[0];
        anyhow::ensure!(
            scores.shape() == [1, 8],
            "unexpected emotion output shape {:?}",
            scores.shape()
        );

        let mut logits = [0.0; 8];
        logits.copy_from_slice(scores.index([0]).as_slice());
        Ok(EmotionReading::from_logits(logits))
    }
}

/// Classifies the emotion shown by a face.
pub struct EmotionClassifier {
    network: EmotionNetwork,
    t_infer: Timer,
}

impl EmotionClassifier {
    pub fn new(network: EmotionNetwork) -> Self {
        Self {
            network,
            t_infer: Timer::new("emotion"),
        }
    }

    /// Classifies the face shown in `face`.
    ///
    /// `face` should be a crop of a single face. It is stretched to the network's input size.
    pub fn classify<V: AsImageView>(&self, face: &V) -> anyhow::Result<EmotionReading> {
        let outputs = self.t_infer.time(|| self.network.cnn.estimate(face))?;
        let reading = EmotionNetwork::extract(&outputs)?;
        log::trace!(
            "emotion: {} ({:.1}%)",
            reading.dominant(),
            reading.confidence()
        );
        Ok(reading)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::tensor::Tensor;
    use approx::assert_relative_eq;

    fn network_logits(emotion: Emotion, logit: f32) -> [f32; 8] {
        let mut logits = [0.0; 8];
        let index = NETWORK_ORDER.iter().position(|e| *e == emotion).unwrap();
        logits[index] = logit;
        logits
    }

    #[test]
    fn maps_network_order() {
        for emotion in Emotion::ALL {
            let reading = EmotionReading::from_logits(network_logits(emotion, 10.0));
            assert_eq!(reading.dominant(), emotion);
        }
    }

    #[test]
    fn scores_are_percentages() {
        let reading = EmotionReading::from_logits([0.5, -1.0, 2.0, 0.0, 1.0, 3.0, -2.0, 0.25]);
        let total: f32 = reading.iter().map(|(_, score)| score).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-3);
        assert!(reading.iter().all(|(_, score)| (0.0..=100.0).contains(&score)));

        // index 5 of the network order is disgust
        assert_eq!(reading.dominant(), Emotion::Disgust);
        assert_eq!(reading.confidence(), reading.score(Emotion::Disgust));
    }

    #[test]
    fn uniform_logits_are_uncertain() {
        let reading = EmotionReading::from_logits([1.0; 8]);
        assert_relative_eq!(reading.confidence(), 12.5, epsilon = 1e-4);
    }

    #[test]
    fn non_finite_logit_has_no_confidence() {
        let reading = EmotionReading::from_logits(network_logits(Emotion::Sad, f32::INFINITY));
        assert!(reading.confidence().is_nan());
    }

    #[test]
    fn extract_from_outputs() {
        let logits = network_logits(Emotion::Happy, 6.0);
        let outputs: Outputs = [Tensor::from_iter(&[1, 8], logits)].into_iter().collect();
        let reading = EmotionNetwork::extract(&outputs).unwrap();
        assert_eq!(reading.dominant(), Emotion::Happy);
        assert!(reading.confidence() > 95.0, "{}", reading.confidence());
    }

    #[test]
    fn extract_rejects_wrong_shape() {
        let outputs: Outputs = [Tensor::from([0.0; 7])].into_iter().collect();
        assert!(EmotionNetwork::extract(&outputs).is_err());
    }

    #[test]
    fn single_emotion_reading() {
        let reading = EmotionReading::single(Emotion::Fear, 40.0);
        assert_eq!(reading.dominant(), Emotion::Fear);
        assert_eq!(reading.confidence(), 40.0);
        let total: f32 = reading.iter().map(|(_, score)| score).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-3);

        let reading = EmotionReading::new([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 100.0, 0.0]);
        assert_eq!(reading.dominant(), Emotion::Neutral);
    }

    #[test]
    fn names() {
        assert_eq!(Emotion::Happy.to_string(), "happy");
        assert_eq!(Emotion::Surprise.name(), "surprise");
    }
}
