//! The closed reply vocabulary.
//!
//! Chad only ever says one of six things. Every line shown or spoken as
//! Chad's passes through [`crate::constrain::ResponseConstrainer`] first, which
//! guarantees it is one of these.

use serde::{Deserialize, Serialize};

/// One permitted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Okay,
    AllGood,
    Sure,
    Word,
    Haha,
    Nah,
}

impl Response {
    /// Every member of the vocabulary, in prompt order.
    pub const ALL: [Response; 6] = [
        Response::AllGood,
        Response::Okay,
        Response::Sure,
        Response::Word,
        Response::Haha,
        Response::Nah,
    ];

    /// Canonical display and speech text.
    pub fn text(self) -> &'static str {
        match self {
            Self::Okay => "Okay",
            Self::AllGood => "All good",
            Self::Sure => "Sure",
            Self::Word => "Word",
            Self::Haha => "Haha",
            Self::Nah => "Nah",
        }
    }

    /// File name of the default recorded clip for this reply.
    pub fn default_asset(self) -> &'static str {
        match self {
            Self::Okay => "okay.mp3",
            Self::AllGood => "all good.mp3",
            Self::Sure => "sure.mp3",
            Self::Word => "word.mp3",
            Self::Haha => "haha.mp3",
            Self::Nah => "nah.mp3",
        }
    }

    /// Case-insensitive exact match against the canonical texts.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.text().eq_ignore_ascii_case(text))
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

impl std::str::FromStr for Response {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s).ok_or_else(|| format!("not an allowed response: {s:?}"))
    }
}
