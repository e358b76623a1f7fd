//! End-to-end turns: completion → constrainer → presenter → voice chain.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chadgpt::chat::{ChatSession, Reply};
use chadgpt::companion::{Companion, Presenter, Turn};
use chadgpt::completion::CompletionService;
use chadgpt::constrain::ResponseConstrainer;
use chadgpt::voice::{ProviderKind, RenderOutcome};
use chadgpt::{ChadError, Mood, Response};

use crate::helpers::{Behavior, RecordingSink, StubProvider, orchestrator};

struct Canned(Result<&'static str, &'static str>);

#[async_trait]
impl CompletionService for Canned {
    async fn complete(&self, _prompt: &str) -> chadgpt::Result<String> {
        self.0
            .map(str::to_owned)
            .map_err(|e| ChadError::Completion(e.to_owned()))
    }
}

#[derive(Default)]
struct Screen {
    shown: Mutex<Vec<(Response, Mood)>>,
    moods: Mutex<Vec<Mood>>,
    audio: Mutex<Vec<Option<ProviderKind>>>,
}

impl Presenter for Screen {
    fn show_reply(&self, reply: &Reply) {
        self.shown.lock().unwrap().push((reply.response, reply.mood));
    }

    fn set_mood(&self, mood: Mood) {
        self.moods.lock().unwrap().push(mood);
    }

    fn audio_finished(&self, outcome: &RenderOutcome) {
        self.audio.lock().unwrap().push(outcome.played_by());
    }
}

fn companion(
    completion: Canned,
    chain: &[Arc<StubProvider>],
    sink: Arc<RecordingSink>,
    screen: Arc<Screen>,
) -> Companion {
    let chat = ChatSession::new(Arc::new(completion), ResponseConstrainer::default());
    let voice = Arc::new(orchestrator(chain, sink));
    Companion::new(chat, Some(voice), screen)
}

#[tokio::test(start_paused = true)]
async fn test_reply_is_shown_then_spoken_by_fallback() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let system = StubProvider::new(ProviderKind::SystemSpeech, Behavior::Succeed);
    let sink = RecordingSink::new(Duration::from_millis(300));
    let screen = Arc::new(Screen::default());
    let companion = companion(
        Canned(Ok("**thinking** Chad: Sure.")),
        &[clips, system],
        sink.clone(),
        screen.clone(),
    );

    let turn = companion.turn("wanna get pizza?").await.unwrap();
    match turn {
        Turn::Replied { reply, audio } => {
            assert_eq!(reply.response, Response::Sure);
            assert_eq!(reply.mood, Mood::Excited);
            assert!(!reply.substituted);
            assert_eq!(
                audio.and_then(|o| o.played_by()),
                Some(ProviderKind::SystemSpeech)
            );
        }
        Turn::Failed { error, .. } => panic!("turn failed: {error}"),
    }

    assert_eq!(
        *screen.shown.lock().unwrap(),
        vec![(Response::Sure, Mood::Excited)]
    );
    assert_eq!(
        *screen.audio.lock().unwrap(),
        vec![Some(ProviderKind::SystemSpeech)]
    );
    assert_eq!(sink.completed(), vec!["system_speech:Sure".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_chain_keeps_conversation_going() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Fail);
    let screen = Arc::new(Screen::default());
    let companion = companion(
        Canned(Ok("Okay.")),
        &[clips],
        RecordingSink::new(Duration::from_millis(100)),
        screen.clone(),
    );

    for _ in 0..2 {
        let turn = companion.turn("hey chad").await.unwrap();
        let reply = turn.reply().expect("reply despite silent voice");
        assert_eq!(reply.response, Response::Okay);
        assert_eq!(reply.mood, Mood::Apathetic);
    }
    assert_eq!(*screen.audio.lock().unwrap(), vec![None, None]);
}

#[tokio::test(start_paused = true)]
async fn test_completion_failure_is_apathetic_and_silent() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Succeed);
    let sink = RecordingSink::new(Duration::from_millis(100));
    let screen = Arc::new(Screen::default());
    let companion = companion(
        Canned(Err("connection refused")),
        &[clips.clone()],
        sink.clone(),
        screen.clone(),
    );

    let turn = companion.turn("hello?").await.unwrap();
    assert!(matches!(
        turn,
        Turn::Failed {
            mood: Mood::Apathetic,
            error: ChadError::Completion(_),
        }
    ));
    assert!(screen.shown.lock().unwrap().is_empty());
    assert_eq!(clips.renders(), 0);
    assert!(sink.started().is_empty());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(
        *screen.moods.lock().unwrap(),
        vec![Mood::Apathetic, Mood::Neutral]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_silences_current_reply() {
    let clips = StubProvider::new(ProviderKind::Clips, Behavior::Succeed);
    let sink = RecordingSink::new(Duration::from_secs(10));
    let screen = Arc::new(Screen::default());
    let companion = Arc::new(companion(
        Canned(Ok("Haha")),
        &[clips],
        sink.clone(),
        screen,
    ));

    let task = {
        let companion = Arc::clone(&companion);
        tokio::spawn(async move { companion.turn("knock knock").await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    companion.stop();

    let turn = task.await.unwrap().unwrap();
    match turn {
        Turn::Replied { audio, .. } => {
            assert!(matches!(audio, Some(RenderOutcome::Cancelled { .. })));
        }
        Turn::Failed { error, .. } => panic!("turn failed: {error}"),
    }
    assert!(sink.completed().is_empty());
    assert_eq!(sink.started(), vec!["clips:Haha".to_owned()]);
}
