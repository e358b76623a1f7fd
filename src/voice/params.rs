//! Mood to voice-parameter mapping.
//!
//! Each provider family has its own table and valid ranges, but every table
//! follows the same rule: on rate, pitch and volume, Excited > Neutral >
//! Apathetic. Values are clamped to the family's [`ParamBounds`] before they
//! leave this module.

use std::ops::RangeInclusive;

use crate::mood::Mood;

/// Provider families that share a parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    /// Recorded clip playback.
    Clip,
    /// Local neural model.
    LocalNeural,
    /// Cloud voice clone APIs.
    Cloud,
    /// Platform speech engine.
    SystemSpeech,
}

/// Valid ranges a family accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    pub rate: RangeInclusive<f32>,
    pub pitch: RangeInclusive<f32>,
    pub volume: RangeInclusive<f32>,
}

fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        return *range.start();
    }
    value.clamp(*range.start(), *range.end())
}

impl ParamBounds {
    pub fn contains(&self, params: &RenderParameters) -> bool {
        self.rate.contains(&params.rate)
            && self.pitch.contains(&params.pitch)
            && self.volume.contains(&params.volume)
    }

    pub fn clamp(&self, params: &mut RenderParameters) {
        params.rate = clamp_to(params.rate, &self.rate);
        params.pitch = clamp_to(params.pitch, &self.pitch);
        params.volume = clamp_to(params.volume, &self.volume);
    }
}

impl ProviderFamily {
    pub fn bounds(self) -> ParamBounds {
        match self {
            // Playback speed range that still sounds like speech.
            Self::Clip => ParamBounds {
                rate: 0.8..=2.0,
                pitch: 0.8..=1.2,
                volume: 0.0..=1.0,
            },
            Self::LocalNeural | Self::Cloud => ParamBounds {
                rate: 0.5..=2.0,
                pitch: 0.5..=2.0,
                volume: 0.0..=1.0,
            },
            Self::SystemSpeech => ParamBounds {
                rate: 0.1..=10.0,
                pitch: 0.0..=2.0,
                volume: 0.0..=1.0,
            },
        }
    }
}

/// Family-specific settings beyond rate, pitch and volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tuning {
    /// Nothing beyond rate, pitch and volume.
    Plain,
    /// Sampling temperature for the local model.
    Neural { temperature: f32 },
    /// Cloud clone settings. ElevenLabs reads the first three, Jammable the
    /// emotion tag.
    Cloud {
        stability: f32,
        similarity_boost: f32,
        style: f32,
        emotion: &'static str,
    },
}

/// Parameters for one render, computed fresh per utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters {
    pub family: ProviderFamily,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub tuning: Tuning,
}

// ── Tables ──────────────────────────────────────────────────────────────

/// (rate, pitch, volume)
fn energy(mood: Mood, family: ProviderFamily) -> (f32, f32, f32) {
    match family {
        // Recordings are sped up to match Chad's delivery.
        ProviderFamily::Clip => match mood {
            Mood::Neutral => (1.6, 1.0, 0.9),
            Mood::Excited => (1.7, 1.05, 1.0),
            Mood::Apathetic => (1.5, 0.95, 0.8),
            Mood::Grin => (1.65, 1.02, 0.95),
            Mood::Smirk => (1.55, 0.98, 0.85),
        },
        ProviderFamily::LocalNeural | ProviderFamily::Cloud => match mood {
            Mood::Neutral => (1.0, 1.0, 0.9),
            Mood::Excited => (1.1, 1.1, 1.0),
            Mood::Apathetic => (0.9, 0.9, 0.8),
            Mood::Grin => (1.05, 1.05, 0.95),
            Mood::Smirk => (0.95, 0.95, 0.85),
        },
        ProviderFamily::SystemSpeech => match mood {
            Mood::Neutral => (0.9, 1.1, 0.9),
            Mood::Excited => (1.0, 1.15, 1.0),
            Mood::Apathetic => (0.8, 1.0, 0.8),
            Mood::Grin => (0.95, 1.1, 0.95),
            Mood::Smirk => (0.85, 1.05, 0.85),
        },
    }
}

fn tuning(mood: Mood, family: ProviderFamily) -> Tuning {
    match family {
        ProviderFamily::Clip | ProviderFamily::SystemSpeech => Tuning::Plain,
        ProviderFamily::LocalNeural => Tuning::Neural {
            temperature: match mood {
                Mood::Neutral => 0.7,
                Mood::Excited => 0.8,
                Mood::Apathetic => 0.6,
                Mood::Grin => 0.75,
                Mood::Smirk => 0.65,
            },
        },
        ProviderFamily::Cloud => {
            let (stability, similarity_boost, style, emotion) = match mood {
                Mood::Neutral => (0.7, 0.8, 0.2, "neutral"),
                Mood::Excited => (0.6, 0.9, 0.8, "excited"),
                Mood::Apathetic => (0.8, 0.7, 0.1, "bored"),
                Mood::Grin => (0.7, 0.85, 0.6, "amused"),
                Mood::Smirk => (0.75, 0.8, 0.4, "sly"),
            };
            Tuning::Cloud {
                stability,
                similarity_boost,
                style,
                emotion,
            }
        }
    }
}

/// Parameters for `mood` on a provider of `family`, clamped to its bounds.
pub fn params_for(mood: Mood, family: ProviderFamily) -> RenderParameters {
    let (rate, pitch, volume) = energy(mood, family);
    let mut params = RenderParameters {
        family,
        rate,
        pitch,
        volume,
        tuning: tuning(mood, family),
    };
    family.bounds().clamp(&mut params);
    params
}
