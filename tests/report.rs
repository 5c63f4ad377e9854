use std::fs;

use emotrack::face::emotion::{Emotion, EmotionReading};
use emotrack::report::{Report, Tally, Verdict, DEFAULT_EMOTION_THRESHOLD};

/// A synthetic frame: the faces found in it and whether a pose with raised arms was tracked.
struct Frame {
    faces: Vec<EmotionReading>,
    pose: Option<bool>,
}

fn random_frames(rng: &mut fastrand::Rng, count: usize) -> Vec<Frame> {
    (0..count)
        .map(|_| {
            let faces = (0..rng.usize(0..4))
                .map(|_| {
                    let emotion = Emotion::ALL[rng.usize(..Emotion::ALL.len())];
                    EmotionReading::single(emotion, 20.0 + rng.f32() * 80.0)
                })
                .collect();
            let pose = rng.bool().then(|| rng.bool());
            Frame { faces, pose }
        })
        .collect()
}

fn tally_frames(frames: &[Frame]) -> Tally {
    let mut tally = Tally::new();
    for frame in frames {
        tally.record_frame();
        for face in &frame.faces {
            tally.record_emotion(face, DEFAULT_EMOTION_THRESHOLD);
        }
        if let Some(raised) = frame.pose {
            tally.record_pose(raised);
        }
    }
    tally
}

#[test]
fn every_face_is_tallied_or_anomalous() {
    let mut rng = fastrand::Rng::with_seed(1234);
    for _ in 0..20 {
        let count = rng.usize(0..200);
        let frames = random_frames(&mut rng, count);
        let tally = tally_frames(&frames);

        let faces: usize = frames.iter().map(|f| f.faces.len()).sum();
        assert_eq!(tally.frames(), frames.len() as u64);
        assert_eq!(tally.histogram().total() + tally.anomalies(), faces as u64);

        let confident = frames
            .iter()
            .flat_map(|f| &f.faces)
            .filter(|r| r.confidence() >= DEFAULT_EMOTION_THRESHOLD)
            .count();
        assert_eq!(tally.histogram().total(), confident as u64);
    }
}

#[test]
fn frames_without_faces_change_nothing() {
    let mut tally = Tally::new();
    for _ in 0..10 {
        tally.record_frame();
    }
    assert_eq!(tally.frames(), 10);
    assert_eq!(tally.anomalies(), 0);
    assert!(tally.histogram().is_empty());
}

#[test]
fn arm_movements_ignore_frames_without_pose() {
    let frames = [Some(true), None, None, Some(true), Some(false), None, Some(true)]
        .into_iter()
        .map(|pose| Frame {
            faces: Vec::new(),
            pose,
        })
        .collect::<Vec<_>>();

    let tally = tally_frames(&frames);
    assert_eq!(tally.arm_movements(), 2);
}

#[test]
fn written_report() {
    let mut tally = Tally::new();
    tally.record_frame();
    tally.record_frame();
    tally.record_frame();
    assert_eq!(
        tally.record_emotion(&EmotionReading::single(Emotion::Surprise, 88.0), 60.0),
        Verdict::Tallied(Emotion::Surprise)
    );
    tally.record_emotion(&EmotionReading::single(Emotion::Happy, 61.0), 60.0);
    tally.record_emotion(&EmotionReading::single(Emotion::Surprise, 70.0), 60.0);
    tally.record_emotion(&EmotionReading::single(Emotion::Sad, 30.0), 60.0);
    tally.record_pose(false);
    tally.record_pose(true);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relatorio_analise.txt");
    Report::from(tally).write(&path).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Total Frames Analisados: 3\n\
         Número de Anomalias: 1\n\
         Movimento dos Braços: 1\n\
         Emoções Detectadas:\n  \
         surprise: 2\n  \
         happy: 1\n"
    );
}

#[test]
fn write_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.txt");
    let err = Report::from(Tally::new()).write(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to write report"), "{:#}", err);
}
