//! Offline reply-quality evaluation.
//!
//! Sends a fixed set of messages through a [`ChatSession`] and measures how
//! well the model stays in character before the constrainer steps in.

use std::fmt;

use crate::chat::{ChatSession, Reply};
use crate::mood::Mood;
use crate::personality::{OKAY_TARGET_SHARE, WORKED_EXAMPLES};
use crate::response::Response;

/// One evaluation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalCase {
    pub id: &'static str,
    pub message: &'static str,
}

/// The built-in message set: greetings, innuendo, questions Chad should
/// miss, and topics well above his pay grade.
pub const DEFAULT_CASES: &[EvalCase] = &[
    EvalCase {
        id: "basic_greeting",
        message: "hey chad",
    },
    EvalCase {
        id: "how_are_you",
        message: "how are you?",
    },
    EvalCase {
        id: "literal_interpretation",
        message: "your mom is hot",
    },
    EvalCase {
        id: "question_missing",
        message: "want to go to the mall later?",
    },
    EvalCase {
        id: "food_obsession",
        message: "hungry",
    },
    EvalCase {
        id: "excitement",
        message: "awesome party!",
    },
    EvalCase {
        id: "confusion",
        message: "what do you think about quantum physics?",
    },
    EvalCase {
        id: "congratulations",
        message: "congratulations",
    },
    EvalCase {
        id: "joke",
        message: "that's funny",
    },
    EvalCase {
        id: "agreement",
        message: "do you agree?",
    },
    EvalCase {
        id: "correction",
        message: "is that right?",
    },
    EvalCase {
        id: "thanks",
        message: "thanks",
    },
];

/// What happened to one case in one round.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub case: EvalCase,
    pub outcome: Result<Reply, String>,
}

/// Aggregated evaluation results.
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    pub results: Vec<CaseResult>,
}

impl EvalReport {
    fn replies(&self) -> impl Iterator<Item = &Reply> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    pub fn answered(&self) -> usize {
        self.replies().count()
    }

    pub fn errors(&self) -> usize {
        self.results.len() - self.answered()
    }

    /// Share of answered cases whose raw completion was already in the
    /// vocabulary.
    pub fn compliance_rate(&self) -> f64 {
        let answered = self.answered();
        if answered == 0 {
            return 0.0;
        }
        let compliant = self.replies().filter(|r| !r.substituted).count();
        compliant as f64 / answered as f64
    }

    pub fn substitution_rate(&self) -> f64 {
        if self.answered() == 0 {
            0.0
        } else {
            1.0 - self.compliance_rate()
        }
    }

    /// Count per response, in vocabulary order.
    pub fn response_counts(&self) -> Vec<(Response, usize)> {
        Response::ALL
            .iter()
            .map(|&response| {
                let n = self.replies().filter(|r| r.response == response).count();
                (response, n)
            })
            .collect()
    }

    pub fn mood_counts(&self) -> Vec<(Mood, usize)> {
        Mood::ALL
            .iter()
            .map(|&mood| (mood, self.replies().filter(|r| r.mood == mood).count()))
            .collect()
    }

    /// Share of answered cases that came out as "Okay".
    pub fn okay_share(&self) -> f64 {
        let answered = self.answered();
        if answered == 0 {
            return 0.0;
        }
        let okay = self.replies().filter(|r| r.response == Response::Okay).count();
        okay as f64 / answered as f64
    }

    /// Worked examples from the persona prompt answered as intended, over
    /// those that were asked.
    pub fn example_accuracy(&self) -> Option<f64> {
        let graded: Vec<bool> = self
            .results
            .iter()
            .filter_map(|r| {
                let expected = WORKED_EXAMPLES
                    .iter()
                    .find(|(message, _)| *message == r.case.message)?
                    .1;
                let reply = r.outcome.as_ref().ok()?;
                Some(reply.response == expected)
            })
            .collect();
        if graded.is_empty() {
            return None;
        }
        Some(graded.iter().filter(|ok| **ok).count() as f64 / graded.len() as f64)
    }

    /// 0–100: half raw compliance, half closeness to the "Okay" target.
    pub fn score(&self) -> u32 {
        if self.answered() == 0 {
            return 0;
        }
        let distance = (self.okay_share() - OKAY_TARGET_SHARE).abs() / OKAY_TARGET_SHARE;
        let okay_score = (1.0 - distance).clamp(0.0, 1.0);
        let score = 50.0 * self.compliance_rate() + 50.0 * okay_score;
        score.round().clamp(0.0, 100.0) as u32
    }

    pub fn grade(&self) -> &'static str {
        grade(self.score())
    }
}

/// Letter grade for a 0–100 score.
pub fn grade(score: u32) -> &'static str {
    match score {
        90.. => "A+",
        80..=89 => "A",
        70..=79 => "B",
        60..=69 => "C",
        50..=59 => "D",
        _ => "F",
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cases: {} answered, {} failed", self.answered(), self.errors())?;
        writeln!(
            f,
            "raw compliance: {:.1}%  substitutions: {:.1}%",
            self.compliance_rate() * 100.0,
            self.substitution_rate() * 100.0
        )?;
        writeln!(f, "responses:")?;
        for (response, n) in self.response_counts() {
            writeln!(f, "  {:<9} {n}", response.text())?;
        }
        writeln!(f, "moods:")?;
        for (mood, n) in self.mood_counts() {
            writeln!(f, "  {:<9} {n}", mood.as_str())?;
        }
        writeln!(
            f,
            "okay share: {:.1}% (target {:.0}%)",
            self.okay_share() * 100.0,
            OKAY_TARGET_SHARE * 100.0
        )?;
        if let Some(accuracy) = self.example_accuracy() {
            writeln!(f, "worked examples: {:.1}%", accuracy * 100.0)?;
        }
        write!(f, "score: {}/100 ({})", self.score(), self.grade())
    }
}

/// Run every case `rounds` times through `chat`.
pub async fn run(chat: &ChatSession, cases: &[EvalCase], rounds: usize) -> EvalReport {
    let mut results = Vec::with_capacity(cases.len() * rounds);
    for round in 0..rounds {
        for case in cases {
            let outcome = chat.reply(case.message).await.map_err(|e| e.to_string());
            match &outcome {
                Ok(reply) => tracing::info!(
                    round,
                    case = case.id,
                    response = %reply.response,
                    substituted = reply.substituted,
                    "evaluated"
                ),
                Err(e) => tracing::warn!(round, case = case.id, error = %e, "case failed"),
            }
            results.push(CaseResult {
                case: *case,
                outcome,
            });
        }
    }
    EvalReport { results }
}
