//! Mood tags and the lexical rules that derive them.
//!
//! The mood is computed from the text of the chosen reply, never from the raw
//! model output, so the same reply always carries the same mood.

use serde::{Deserialize, Serialize};

/// Emotional tag that drives avatar expression and voice parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Apathetic,
    Grin,
    Excited,
    Smirk,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Neutral,
        Mood::Apathetic,
        Mood::Grin,
        Mood::Excited,
        Mood::Smirk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Apathetic => "apathetic",
            Self::Grin => "grin",
            Self::Excited => "excited",
            Self::Smirk => "smirk",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Keyword rules ───────────────────────────────────────────────────────

/// Ordered (mood, needles). First rule with any matching needle wins.
const MOOD_RULES: &[(Mood, &[&str])] = &[
    (Mood::Excited, &["!", "sure", "awesome"]),
    (Mood::Grin, &["\u{1F60F}", "grin", "innuendo"]),
    (Mood::Apathetic, &["okay", "meh", "whatever"]),
    (Mood::Smirk, &["\u{1F60E}", "cool", "sick"]),
];

/// Derive a mood from reply text.
///
/// Matching is a lowercase substring scan; text matching no rule is
/// [`Mood::Neutral`].
pub fn derive_mood(text: &str) -> Mood {
    let lower = text.to_lowercase();
    MOOD_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(Mood::Neutral, |(mood, _)| *mood)
}
