//! Per-utterance jitter so repeated replies never sound machine-identical.

use std::time::Duration;

use rand::Rng;

use super::params::RenderParameters;

/// Largest accepted jitter magnitude.
const MAX_MAGNITUDE: f32 = 0.5;

/// Jittered parameters plus the pause before playback starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jittered {
    pub params: RenderParameters,
    pub delay: Duration,
}

/// Applies bounded random variation to render parameters.
#[derive(Debug, Clone, Copy)]
pub struct NaturalVariationInjector {
    magnitude: f32,
    max_delay: Duration,
}

impl Default for NaturalVariationInjector {
    fn default() -> Self {
        Self::new(0.05, Duration::from_millis(100))
    }
}

impl NaturalVariationInjector {
    /// `magnitude` is a fraction (0.05 = ±5%), clamped to `0.0..=0.5`.
    pub fn new(magnitude: f32, max_delay: Duration) -> Self {
        let magnitude = if magnitude.is_finite() {
            magnitude.clamp(0.0, MAX_MAGNITUDE)
        } else {
            0.0
        };
        Self {
            magnitude,
            max_delay,
        }
    }

    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// Jitter `params` and draw a pre-playback delay.
    pub fn apply<R: Rng + ?Sized>(&self, params: &RenderParameters, rng: &mut R) -> Jittered {
        Jittered {
            params: jitter(params, self.magnitude, rng),
            delay: self.delay(rng),
        }
    }

    fn delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Independently perturb rate, pitch and volume by up to `±magnitude`
/// (relative), then clamp to the family's bounds.
pub fn jitter<R: Rng + ?Sized>(
    params: &RenderParameters,
    magnitude: f32,
    rng: &mut R,
) -> RenderParameters {
    let m = if magnitude.is_finite() {
        magnitude.clamp(0.0, MAX_MAGNITUDE)
    } else {
        0.0
    };
    let mut out = *params;
    out.rate *= 1.0 + rng.gen_range(-m..=m);
    out.pitch *= 1.0 + rng.gen_range(-m..=m);
    out.volume *= 1.0 + rng.gen_range(-m..=m);
    params.family.bounds().clamp(&mut out);
    out
}
