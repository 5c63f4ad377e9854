use std::{collections::HashSet, fs};

use emotrack::body::detection::PoseNetwork;
use emotrack::body::landmark::PoseModel;
use emotrack::face::detection::{FullRangeNetwork, ShortRangeNetwork};
use emotrack::face::emotion::EmotionNetwork;

/// Collects the file names listed in the first column of the table in `models/README.md`.
fn documented_models() -> HashSet<String> {
    let file = fs::read_to_string("models/README.md").unwrap();

    let mut present = HashSet::new();
    let mut in_table = false;
    for line in file.lines() {
        if in_table {
            if line.starts_with('|') {
                let rest = &line[line.find('`').unwrap() + 1..];
                let name = &rest[..rest.find('`').unwrap()];
                assert!(present.insert(name.to_string()), "`{}` is listed twice", name);
            } else {
                break;
            }
        } else if line.starts_with("|---") {
            in_table = true;
        }
    }
    present
}

#[test]
fn model_files_are_documented() {
    let mut documented = documented_models();
    assert!(!documented.is_empty());

    let expected = [
        ShortRangeNetwork::MODEL_FILE,
        FullRangeNetwork::MODEL_FILE,
        EmotionNetwork::MODEL_FILE,
        PoseNetwork::MODEL_FILE,
        PoseModel::Lite.file_name(),
        PoseModel::Full.file_name(),
        PoseModel::Heavy.file_name(),
    ];
    for name in expected {
        if !documented.remove(name) {
            panic!("model file `{}` is not listed in models/README.md", name);
        }
    }

    assert!(
        documented.is_empty(),
        "models/README.md lists unused files: {:?}",
        documented
    );
}
