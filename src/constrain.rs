//! Maps free-form completion text onto the closed reply vocabulary.
//!
//! The completion service is instructed to answer with one of the six
//! [`Response`] texts but routinely adds quotes, speaker labels, list markers,
//! narration ("…, said Chad with a grin") or an offer of further help. The
//! constrainer strips that noise, matches what is left against the vocabulary
//! and, when nothing matches, substitutes a reply according to the configured
//! [`FallbackPolicy`].
//!
//! Substitution is intentional: the output space is closed no matter what the
//! model says. The [`Constrained::substituted`] flag keeps it observable.

use std::sync::LazyLock;

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::config::{ConstraintConfig, FallbackPolicy};
use crate::mood::{Mood, derive_mood};
use crate::response::Response;

/// Outcome of constraining one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constrained {
    pub response: Response,
    pub mood: Mood,
    /// `true` when the cleaned text did not match and a fallback was chosen.
    pub substituted: bool,
}

// ── Cleanup patterns ────────────────────────────────────────────────────

// Patterns are literals; compilation cannot fail at runtime.
#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static cleanup pattern")
}

/// Inline `**aside**` spans, dropped whole.
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| pattern(r"\*\*.*?\*\*"));

static CHAD_LABEL: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)^chad:\s*"));

/// Longest marker first so `**x**` is not read as `*` around `*x*`.
const EMPHASIS_MARKERS: [&str; 4] = ["**", "__", "*", "_"];

/// Remove emphasis markers that wrap the whole text, keeping what they wrap.
fn unwrap_emphasis(mut text: &str) -> &str {
    loop {
        let inner = EMPHASIS_MARKERS.iter().find_map(|m| {
            text.strip_prefix(m)
                .and_then(|t| t.strip_suffix(m))
                .map(str::trim)
                .filter(|t| !t.is_empty() && !t.contains(m))
        });
        match inner {
            Some(t) => text = t,
            None => return text,
        }
    }
}

/// Applied in order, each followed by a trim.
static CLEANUP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // speaker labels
        r"(?i)^chad:\s*",
        r"^.*?:\s*",
        // list markers
        r"^\d+\.\s*",
        r"^-\s*",
        r"^\*\s*",
        // narration
        r",\s*(?i:said\s+chad).*$",
        r",\s*(?i:chad\s+said).*$",
        r",\s*(?i:replied\s+chad).*$",
        r",\s*(?i:chad\s+replied).*$",
        // offers of further help
        r"\.\s*(?i:how\s+can\s+i\s+).*$",
        r"\.\s*(?i:what\s+can\s+i\s+).*$",
        r"\.\s*(?i:how\s+may\s+i\s+).*$",
        r"\.\s*(?i:is\s+there\s+).*$",
        r"\.\s*(?i:do\s+you\s+).*$",
    ]
    .into_iter()
    .map(pattern)
    .collect()
});

/// Strip quoting, formatting and narration from raw completion text.
pub fn clean(raw: &str) -> String {
    let mut text = raw.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = &text[1..text.len() - 1];
    }

    let text = unwrap_emphasis(text.trim());
    let text = CHAD_LABEL.replace(text, "");
    let text = unwrap_emphasis(text.trim());

    let mut text = EMPHASIS.replace_all(text, "").trim().to_owned();
    for re in CLEANUP.iter() {
        text = re.replace(&text, "").trim().to_owned();
    }
    text
}

/// Validates completion text against the reply vocabulary.
#[derive(Debug, Clone)]
pub struct ResponseConstrainer {
    max_len: usize,
    fallback: FallbackPolicy,
}

impl Default for ResponseConstrainer {
    fn default() -> Self {
        Self::new(&ConstraintConfig::default())
    }
}

impl ResponseConstrainer {
    pub fn new(config: &ConstraintConfig) -> Self {
        Self {
            max_len: config.max_len,
            fallback: config.fallback,
        }
    }

    /// Constrain `raw` using the thread-local random source.
    pub fn constrain(&self, raw: &str) -> Constrained {
        self.constrain_with(raw, &mut rand::thread_rng())
    }

    /// Constrain `raw`, drawing any random fallback from `rng`.
    ///
    /// Never fails: the result is always a member of [`Response::ALL`].
    pub fn constrain_with<R: Rng + ?Sized>(&self, raw: &str, rng: &mut R) -> Constrained {
        let cleaned = clean(raw);
        let candidate = cleaned.strip_suffix('.').unwrap_or(&cleaned);

        let matched = if candidate.is_empty() || candidate.chars().count() > self.max_len {
            None
        } else {
            Response::from_text(candidate)
        };

        let (response, substituted) = match matched {
            Some(r) => (r, false),
            None => {
                let r = self.pick_fallback(rng);
                tracing::debug!(raw = %raw, cleaned = %cleaned, fallback = %r, "reply outside vocabulary");
                (r, true)
            }
        };

        Constrained {
            response,
            mood: derive_mood(response.text()),
            substituted,
        }
    }

    fn pick_fallback<R: Rng + ?Sized>(&self, rng: &mut R) -> Response {
        match self.fallback {
            FallbackPolicy::Fixed(r) => r,
            FallbackPolicy::Random => Response::ALL
                .choose(rng)
                .copied()
                .unwrap_or(Response::Okay),
        }
    }
}
