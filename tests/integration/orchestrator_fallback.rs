//! Fallback chain, cooldown and cancellation behaviour of the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use chadgpt::voice::{
    CircuitState, FailureStage, OrchestratorState, ProviderFamily, ProviderKind, RenderOutcome,
};
use chadgpt::{Mood, Response};

use crate::helpers::{Behavior, RecordingSink, StubProvider, orchestrator};

const PLAY: Duration = Duration::from_millis(200);

#[tokio::test(start_paused = true)]
async fn test_failed_provider_falls_through() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let neural = StubProvider::new(ProviderKind::LocalNeural, Behavior::Succeed);
    let sink = RecordingSink::new(PLAY);
    let orch = orchestrator(&[clips.clone(), neural.clone()], sink.clone());

    let outcome = orch.speak(Response::Word, Mood::Smirk).await;
    match outcome {
        RenderOutcome::Played {
            provider, skipped, ..
        } => {
            assert_eq!(provider, ProviderKind::LocalNeural);
            assert_eq!(skipped.len(), 1);
            assert_eq!(skipped[0].provider, ProviderKind::Clips);
            assert_eq!(skipped[0].stage, FailureStage::Render);
        }
        other => panic!("expected playback, got {other:?}"),
    }
    assert_eq!(sink.completed(), vec!["local_neural:Word".to_owned()]);

    let states = orch.provider_states();
    assert!(matches!(states[0].1.state(), CircuitState::Open { .. }));
    assert_eq!(states[0].1.last_error(), Some("HTTP 500: stub failure"));
    assert_eq!(states[1].1.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_skips_then_retries_after_expiry() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let orch = orchestrator(&[clips.clone(), system.clone()], RecordingSink::new(PLAY));

    // Single strike: one failure demotes.
    let first = orch.speak(Response::Okay, Mood::Apathetic).await;
    assert_eq!(first.played_by(), Some(ProviderKind::SystemSpeech));
    assert_eq!(clips.renders(), 1);

    // Within the cooldown the provider is skipped without an attempt.
    let second = orch.speak(Response::Okay, Mood::Apathetic).await;
    match &second {
        RenderOutcome::Played { skipped, .. } => {
            assert_eq!(skipped[0].stage, FailureStage::Cooldown);
        }
        other => panic!("expected playback, got {other:?}"),
    }
    assert_eq!(clips.renders(), 1);
    assert_eq!(clips.probes(), 1);

    // After the cooldown the provider gets another chance and recovers.
    tokio::time::advance(Duration::from_secs(31)).await;
    clips.set_behavior(Behavior::Succeed);
    let third = orch.speak(Response::Okay, Mood::Apathetic).await;
    assert_eq!(third.played_by(), Some(ProviderKind::Clips));
    assert_eq!(clips.renders(), 2);
    assert_eq!(orch.provider_states()[0].1.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_restarts_cooldown() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let orch = orchestrator(&[clips.clone(), system], RecordingSink::new(PLAY));

    orch.speak(Response::Sure, Mood::Excited).await;
    tokio::time::advance(Duration::from_secs(31)).await;
    orch.speak(Response::Sure, Mood::Excited).await;
    assert_eq!(clips.renders(), 2);

    // Still failing: skipped again for a fresh cooldown.
    tokio::time::advance(Duration::from_secs(10)).await;
    orch.speak(Response::Sure, Mood::Excited).await;
    assert_eq!(clips.renders(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_chain_is_no_audio() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Fail);
    let sink = RecordingSink::new(PLAY);
    let orch = orchestrator(&[clips, system], sink.clone());

    let outcome = orch.speak(Response::Nah, Mood::Neutral).await;
    match outcome {
        RenderOutcome::NoAudio { failures, .. } => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().all(|f| f.stage == FailureStage::Render));
        }
        other => panic!("expected no audio, got {other:?}"),
    }
    assert!(sink.started().is_empty());
    assert_eq!(orch.state(), OrchestratorState::Idle);

    // Everything cooling down: no render attempts at all.
    let again = orch.speak(Response::Nah, Mood::Neutral).await;
    match again {
        RenderOutcome::NoAudio { failures, .. } => {
            assert!(failures.iter().all(|f| f.stage == FailureStage::Cooldown));
        }
        other => panic!("expected no audio, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_does_not_demote() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Unavailable);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let orch = orchestrator(&[clips.clone(), system], RecordingSink::new(PLAY));

    let first = orch.speak(Response::Haha, Mood::Neutral).await;
    assert_eq!(first.played_by(), Some(ProviderKind::SystemSpeech));
    orch.speak(Response::Haha, Mood::Neutral).await;

    assert_eq!(clips.probes(), 2);
    assert_eq!(clips.renders(), 0);
    assert_eq!(orch.provider_states()[0].1.consecutive_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_render_timeout_demotes() {
    let neural = StubProvider::with_timeout(
        ProviderKind::LocalNeural,
        Behavior::Hang,
        Duration::from_secs(2),
    );
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let orch = orchestrator(&[neural.clone(), system], RecordingSink::new(PLAY));

    let outcome = orch.speak(Response::Okay, Mood::Neutral).await;
    match outcome {
        RenderOutcome::Played {
            provider, skipped, ..
        } => {
            assert_eq!(provider, ProviderKind::SystemSpeech);
            assert!(skipped[0].detail.contains("timed out"), "{}", skipped[0]);
        }
        other => panic!("expected playback, got {other:?}"),
    }
    assert!(!orch.provider_states()[0].1.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_newer_speak_supersedes_playing_utterance() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Succeed);
    let sink = RecordingSink::new(Duration::from_secs(5));
    let orch = Arc::new(orchestrator(&[clips.clone()], sink.clone()));

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.speak(Response::Okay, Mood::Apathetic).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(orch.state(), OrchestratorState::Playing(ProviderKind::Clips));

    let second = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.speak(Response::Nah, Mood::Neutral).await })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert!(matches!(first, RenderOutcome::Cancelled { .. }));
    assert_eq!(second.played_by(), Some(ProviderKind::Clips));
    assert_ne!(first.request_id(), second.request_id());

    // Only the newer utterance ever finished playing.
    assert_eq!(sink.completed(), vec!["clips:Nah".to_owned()]);
    assert_eq!(
        sink.started(),
        vec!["clips:Okay".to_owned(), "clips:Nah".to_owned()]
    );
    assert!(clips.stops() >= 1);
    assert!(sink.stops() >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_rendering_cancels_and_stops_provider() {
    let neural = StubProvider::with_timeout(
        ProviderKind::LocalNeural,
        Behavior::Hang,
        Duration::from_secs(60),
    );
    let sink = RecordingSink::new(PLAY);
    let orch = Arc::new(orchestrator(&[neural.clone()], sink.clone()));

    let task = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.speak(Response::Sure, Mood::Excited).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        orch.state(),
        OrchestratorState::Rendering(ProviderKind::LocalNeural)
    );

    orch.stop();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, RenderOutcome::Cancelled { .. }));
    assert_eq!(neural.stops(), 1);
    assert!(sink.started().is_empty());
    assert_eq!(orch.state(), OrchestratorState::Idle);
    // Cancellation is not a provider failure.
    assert!(orch.provider_states()[0].1.is_available());
}

#[tokio::test(start_paused = true)]
async fn test_full_chain_reaches_first_capable_provider() {
    let chain = [
        StubProvider::new(ProviderKind::Clips, Behavior::Fail),
        StubProvider::new(ProviderKind::LocalNeural, Behavior::Unavailable),
        StubProvider::new(ProviderKind::ElevenLabs, Behavior::Fail),
        StubProvider::new(ProviderKind::Jammable, Behavior::Succeed),
        StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed),
    ];
    let sink = RecordingSink::new(PLAY);
    let orch = orchestrator(&chain, sink.clone());

    let outcome = orch.speak(Response::AllGood, Mood::Neutral).await;
    match outcome {
        RenderOutcome::Played {
            provider, skipped, ..
        } => {
            assert_eq!(provider, ProviderKind::Jammable);
            let stages: Vec<_> = skipped.iter().map(|f| (f.provider, f.stage)).collect();
            assert_eq!(
                stages,
                vec![
                    (ProviderKind::Clips, FailureStage::Render),
                    (ProviderKind::LocalNeural, FailureStage::Probe),
                    (ProviderKind::ElevenLabs, FailureStage::Render),
                ]
            );
        }
        other => panic!("expected playback, got {other:?}"),
    }
    assert_eq!(chain[4].renders(), 0);
    assert_eq!(sink.completed(), vec!["jammable:All good".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_last_resort_gets_fresh_apathetic_params_per_request() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Unavailable);
    let neural = StubProvider::new(ProviderKind::LocalNeural, Behavior::Fail);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let orch = orchestrator(&[clips, neural.clone(), system.clone()], RecordingSink::new(PLAY));

    for _ in 0..2 {
        let outcome = orch.speak(Response::Okay, Mood::Apathetic).await;
        assert_eq!(outcome.played_by(), Some(ProviderKind::SystemSpeech));
    }

    assert_eq!(neural.params()[0].family, ProviderFamily::LocalNeural);

    let params = system.params();
    assert_eq!(params.len(), 2);
    for p in &params {
        assert_eq!(p.family, ProviderFamily::SystemSpeech);
        assert!((p.rate - 0.8).abs() <= 0.8 * 0.05 + 1e-5, "rate {}", p.rate);
        assert!((p.pitch - 1.0).abs() <= 0.05 + 1e-5, "pitch {}", p.pitch);
    }
    // Each utterance is jittered independently.
    assert_ne!(params[0], params[1]);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_speak_releases_request() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Succeed);
    let sink = RecordingSink::new(Duration::from_secs(5));
    let orch = orchestrator(&[clips.clone()], sink.clone());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(500),
        orch.speak(Response::Okay, Mood::Apathetic),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(orch.state(), OrchestratorState::Idle);

    // Nothing left to stop: the abandoned request's provider is not touched.
    orch.stop();
    assert_eq!(clips.stops(), 0);
    assert_eq!(sink.stops(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(orch.state(), OrchestratorState::Idle);
    assert!(sink.completed().is_empty());

    let outcome = orch.speak(Response::Nah, Mood::Neutral).await;
    assert_eq!(outcome.played_by(), Some(ProviderKind::Clips));
}
