//! Config file → constrainer and voice chain wiring.

use std::time::Duration;

use chadgpt::ChadConfig;
use chadgpt::constrain::ResponseConstrainer;
use chadgpt::voice::{ProviderKind, SynthesisOrchestrator};
use chadgpt::{Mood, Response};

use crate::helpers::RecordingSink;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let clips = dir.join("clips");
    std::fs::create_dir_all(&clips).unwrap();
    std::fs::write(clips.join("okay.mp3"), b"ID3").unwrap();
    std::fs::write(clips.join("okay_bored.mp3"), b"ID3").unwrap();

    let path = dir.join("config.toml");
    let toml = format!(
        r#"
[constraint]
fallback = {{ fixed = "nah" }}

[voice]
chain = ["clips"]
max_delay_ms = 0

[voice.clips]
dir = '{}'

[[voice.clips.entries]]
response = "okay"
mood = "apathetic"
file = "okay_bored.mp3"
"#,
        clips.display()
    );
    std::fs::write(&path, toml).unwrap();
    path
}

#[test]
fn test_fixed_fallback_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChadConfig::from_file(&write_config(dir.path())).unwrap();

    let constrainer = ResponseConstrainer::new(&config.constraint);
    let constrained = constrainer.constrain("Let me explain quantum physics to you.");
    assert_eq!(constrained.response, Response::Nah);
    assert!(constrained.substituted);
}

#[tokio::test]
async fn test_configured_clip_chain_plays_mood_tagged_clip() {
    let dir = tempfile::tempdir().unwrap();
    let config = ChadConfig::from_file(&write_config(dir.path())).unwrap();

    let sink = RecordingSink::new(Duration::from_millis(10));
    let orch = SynthesisOrchestrator::from_config(&config.voice, sink.clone());

    let outcome = orch.speak(Response::Okay, Mood::Apathetic).await;
    assert_eq!(outcome.played_by(), Some(ProviderKind::Clips));
    let started = sink.started();
    assert_eq!(started.len(), 1);
    assert!(started[0].ends_with("okay_bored.mp3"), "{}", started[0]);

    // No clip for "Word" in the directory: the only provider cannot help.
    let silent = orch.speak(Response::Word, Mood::Smirk).await;
    assert_eq!(silent.played_by(), None);
}
