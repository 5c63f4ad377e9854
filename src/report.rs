//! Per-run bookkeeping and the summary report.
//!
//! A [`Tally`] is updated while frames are processed. Once the run is over, it is turned into a
//! [`Report`], which renders as plain text:
//!
//! ```text
//! Total Frames Analisados: 120
//! Número de Anomalias: 3
//! Movimento dos Braços: 2
//! Emoções Detectadas:
//!   happy: 80
//!   neutral: 37
//! ```

use std::{fmt, fs, path::Path};

use anyhow::Context;

use crate::body::arm::ArmMovementCounter;
use crate::face::emotion::{Emotion, EmotionReading};

/// Default file name of the written report.
pub const DEFAULT_REPORT_PATH: &str = "relatorio_analise.txt";

/// Default minimum emotion confidence (in percent) for a reading to be tallied.
pub const DEFAULT_EMOTION_THRESHOLD: f32 = 60.0;

/// Number of faces per [`Emotion`], in the order the emotions were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmotionHistogram {
    counts: Vec<(Emotion, u64)>,
}

impl EmotionHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, emotion: Emotion) {
        match self.counts.iter_mut().find(|(e, _)| *e == emotion) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((emotion, 1)),
        }
    }

    /// Returns how often `emotion` was counted, or 0 if it never was.
    pub fn get(&self, emotion: Emotion) -> u64 {
        self.counts
            .iter()
            .find(|(e, _)| *e == emotion)
            .map_or(0, |(_, count)| *count)
    }

    /// Iterates over all counted emotions, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u64)> + '_ {
        self.counts.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

/// Outcome of [`Tally::record_emotion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The reading was confident enough and its dominant emotion was counted.
    Tallied(Emotion),
    /// The reading's confidence was below the threshold.
    Anomaly,
}

/// Running counters of an analysis run.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    frames: u64,
    anomalies: u64,
    arms: ArmMovementCounter,
    histogram: EmotionHistogram,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a frame that was successfully read.
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Records the emotion reading of one face.
    ///
    /// Only readings whose confidence reaches `threshold` (in percent) are tallied. Everything
    /// else, including a NaN confidence, counts as an anomaly and leaves the histogram untouched.
    pub fn record_emotion(&mut self, reading: &EmotionReading, threshold: f32) -> Verdict {
        if reading.confidence() >= threshold {
            let emotion = reading.dominant();
            self.histogram.increment(emotion);
            Verdict::Tallied(emotion)
        } else {
            self.anomalies += 1;
            Verdict::Anomaly
        }
    }

    /// Records the arm state of a frame in which a pose was found.
    ///
    /// Returns `true` when this starts a new arm movement.
    pub fn record_pose(&mut self, arm_raised: bool) -> bool {
        self.arms.update(arm_raised)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn arm_movements(&self) -> u64 {
        self.arms.count()
    }

    pub fn histogram(&self) -> &EmotionHistogram {
        &self.histogram
    }
}

/// The summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    frames: u64,
    anomalies: u64,
    arm_movements: u64,
    histogram: EmotionHistogram,
}

impl From<Tally> for Report {
    fn from(tally: Tally) -> Self {
        Self {
            frames: tally.frames,
            anomalies: tally.anomalies,
            arm_movements: tally.arms.count(),
            histogram: tally.histogram,
        }
    }
}

impl Report {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn arm_movements(&self) -> u64 {
        self.arm_movements
    }

    pub fn histogram(&self) -> &EmotionHistogram {
        &self.histogram
    }

    /// Writes the rendered report to `path`, replacing any existing file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string())
            .with_context(|| format!("failed to write report to '{}'", path.display()))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Frames Analisados: {}", self.frames)?;
        writeln!(f, "Número de Anomalias: {}", self.anomalies)?;
        writeln!(f, "Movimento dos Braços: {}", self.arm_movements)?;
        writeln!(f, "Emoções Detectadas:")?;
        for (emotion, count) in self.histogram.iter() {
            writeln!(f, "  {}: {}", emotion, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_keeps_first_seen_order() {
        let mut histogram = EmotionHistogram::new();
        for emotion in [Emotion::Sad, Emotion::Happy, Emotion::Sad, Emotion::Fear, Emotion::Happy] {
            histogram.increment(emotion);
        }

        assert_eq!(
            histogram.iter().collect::<Vec<_>>(),
            [(Emotion::Sad, 2), (Emotion::Happy, 2), (Emotion::Fear, 1)]
        );
        assert_eq!(histogram.get(Emotion::Angry), 0);
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.len(), 3);
    }

    #[test]
    fn renders_empty_report() {
        let report = Report::from(Tally::new());
        assert_eq!(
            report.to_string(),
            "Total Frames Analisados: 0\n\
             Número de Anomalias: 0\n\
             Movimento dos Braços: 0\n\
             Emoções Detectadas:\n"
        );
    }

    #[test]
    fn renders_counts() {
        let mut tally = Tally::new();
        for _ in 0..4 {
            tally.record_frame();
        }
        tally.histogram.increment(Emotion::Neutral);
        tally.histogram.increment(Emotion::Happy);
        tally.histogram.increment(Emotion::Neutral);
        tally.anomalies = 1;
        tally.record_pose(true);

        assert_eq!(
            Report::from(tally).to_string(),
            "Total Frames Analisados: 4\n\
             Número de Anomalias: 1\n\
             Movimento dos Braços: 1\n\
             Emoções Detectadas:\n  \
             neutral: 2\n  \
             happy: 1\n"
        );
    }

    #[test]
    fn low_confidence_is_anomaly() {
        let mut tally = Tally::new();
        let threshold = DEFAULT_EMOTION_THRESHOLD;

        let verdict = tally.record_emotion(&EmotionReading::single(Emotion::Sad, 59.9), threshold);
        assert_eq!(verdict, Verdict::Anomaly);
        assert!(tally.histogram().is_empty());

        // The threshold itself is confident enough.
        let verdict = tally.record_emotion(&EmotionReading::single(Emotion::Sad, 60.0), threshold);
        assert_eq!(verdict, Verdict::Tallied(Emotion::Sad));

        assert_eq!(tally.anomalies(), 1);
        assert_eq!(tally.histogram().get(Emotion::Sad), 1);
    }

    #[test]
    fn nan_confidence_is_anomaly() {
        let mut tally = Tally::new();
        let reading = EmotionReading::new([f32::NAN; 8]);
        assert!(reading.confidence().is_nan());

        let verdict = tally.record_emotion(&reading, DEFAULT_EMOTION_THRESHOLD);
        assert_eq!(verdict, Verdict::Anomaly);
        assert_eq!(tally.anomalies(), 1);
        assert!(tally.histogram().is_empty());

        let mut scores = [1.0; 8];
        scores[Emotion::Happy as usize] = 93.0;
        scores[Emotion::Angry as usize] = f32::NAN;
        let verdict = tally.record_emotion(&EmotionReading::new(scores), DEFAULT_EMOTION_THRESHOLD);
        assert_eq!(verdict, Verdict::Anomaly);
        assert_eq!(tally.anomalies(), 2);
        assert!(tally.histogram().is_empty());
    }

    #[test]
    fn pose_updates_are_edge_triggered() {
        let mut tally = Tally::new();
        assert!(tally.record_pose(true));
        assert!(!tally.record_pose(true));
        assert!(!tally.record_pose(false));
        assert!(tally.record_pose(true));
        assert_eq!(tally.arm_movements(), 2);
    }
}
