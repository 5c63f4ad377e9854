//! Command-line configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::body::landmark::PoseModel;
use crate::report::{DEFAULT_EMOTION_THRESHOLD, DEFAULT_REPORT_PATH};

/// Which BlazeFace variant to detect faces with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FaceRange {
    /// Faces close to the camera (within about 2 meters).
    Short,
    /// Faces up to about 5 meters from the camera.
    #[default]
    Full,
}

/// Analyzes faces, emotions and arm movements in a video and writes a summary report.
#[derive(Debug, Clone, Parser)]
#[command(name = "emotrack", version)]
pub struct Config {
    /// Video file to analyze.
    #[arg(value_name = "VIDEO", default_value = "video.mp4")]
    pub video: PathBuf,

    /// Directory containing the ONNX model files.
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub models: PathBuf,

    /// Where to write the text report.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_REPORT_PATH)]
    pub report: PathBuf,

    /// Also write the annotated frames to this video file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Don't open a window showing the annotated frames.
    #[arg(long)]
    pub headless: bool,

    #[arg(long, value_enum, default_value_t = FaceRange::Full)]
    pub face_range: FaceRange,

    /// Minimum face detection confidence (0 to 1).
    #[arg(long, default_value_t = 0.5)]
    pub face_confidence: f32,

    /// Emotion readings below this confidence (in percent) count as anomalies.
    #[arg(long, default_value_t = DEFAULT_EMOTION_THRESHOLD)]
    pub emotion_threshold: f32,

    /// Pose landmark model size: lite, full or heavy.
    #[arg(long, default_value_t = PoseModel::Heavy)]
    pub pose_model: PoseModel,

    /// Smooth pose landmarks across frames with this EMA factor (0 to 1, lower is smoother).
    #[arg(long, value_name = "ALPHA")]
    pub smoothing: Option<f32>,

    #[arg(long, default_value = "Tech Challenge Fase 4")]
    pub window_title: String,
}

impl Config {
    /// Checks that all numeric settings are within their valid ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.face_confidence) {
            anyhow::bail!(
                "face confidence must be between 0 and 1, got {}",
                self.face_confidence
            );
        }
        if !(0.0..=100.0).contains(&self.emotion_threshold) {
            anyhow::bail!(
                "emotion threshold must be between 0 and 100, got {}",
                self.emotion_threshold
            );
        }
        if let Some(alpha) = self.smoothing {
            if !(alpha > 0.0 && alpha <= 1.0) {
                anyhow::bail!("smoothing factor must be in (0, 1], got {}", alpha);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("emotrack").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.video, PathBuf::from("video.mp4"));
        assert_eq!(config.models, PathBuf::from("models"));
        assert_eq!(config.report, PathBuf::from("relatorio_analise.txt"));
        assert_eq!(config.output, None);
        assert!(!config.headless);
        assert_eq!(config.face_range, FaceRange::Full);
        assert_eq!(config.face_confidence, 0.5);
        assert_eq!(config.emotion_threshold, 60.0);
        assert_eq!(config.pose_model, PoseModel::Heavy);
        assert_eq!(config.smoothing, None);
        assert_eq!(config.window_title, "Tech Challenge Fase 4");
        config.validate().unwrap();
    }

    #[test]
    fn flags() {
        let config = parse(&[
            "clip.avi",
            "--headless",
            "--face-range",
            "short",
            "--pose-model",
            "lite",
            "--emotion-threshold",
            "75",
            "--smoothing",
            "0.4",
            "--output",
            "annotated.mp4",
        ]);
        assert_eq!(config.video, PathBuf::from("clip.avi"));
        assert!(config.headless);
        assert_eq!(config.face_range, FaceRange::Short);
        assert_eq!(config.pose_model, PoseModel::Lite);
        assert_eq!(config.emotion_threshold, 75.0);
        assert_eq!(config.smoothing, Some(0.4));
        assert_eq!(config.output, Some(PathBuf::from("annotated.mp4")));
    }

    #[test]
    fn rejects_unknown_pose_model() {
        let result = Config::try_parse_from(["emotrack", "--pose-model", "giant"]);
        assert!(result.is_err());
    }

    #[test]
    fn validate_ranges() {
        assert!(parse(&["--face-confidence", "1.5"]).validate().is_err());
        assert!(parse(&["--emotion-threshold", "101"]).validate().is_err());
        assert!(parse(&["--smoothing", "0"]).validate().is_err());
        assert!(parse(&["--smoothing", "1"]).validate().is_ok());
    }
}
