use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use crate::audio::telemetry::AudioBlock;
use crate::settings::VisualizerSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostSide {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug)]
struct Boost {
    side: BoostSide,
    ticks_left: u32,
}

/// Per-band amplitude state, advanced once per visualizer tick.
pub struct AmplitudeModel {
    settings: VisualizerSettings,
    amplitude: Vec<f32>,
    target: Vec<f32>,
    history: Vec<VecDeque<f32>>,
    boost: Option<Boost>,
    /// Vertical envelope for bar rendering: edges short, centre tall.
    envelope: Vec<f32>,
    rng: StdRng,
}

impl AmplitudeModel {
    pub fn new(settings: VisualizerSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_seed(settings: VisualizerSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: VisualizerSettings, rng: StdRng) -> Self {
        let bands = settings.bands.max(1);
        let depth = settings.history.max(1);
        Self {
            amplitude: vec![0.0; bands],
            target: vec![0.0; bands],
            history: (0..bands)
                .map(|_| std::iter::repeat(0.0).take(depth).collect())
                .collect(),
            boost: None,
            envelope: envelope(bands),
            settings: VisualizerSettings { bands, history: depth, ..settings },
            rng,
        }
    }

    pub fn bands(&self) -> usize {
        self.amplitude.len()
    }

    pub fn amplitudes(&self) -> &[f32] {
        &self.amplitude
    }

    /// Targets of the last tick, boost included.
    pub fn targets(&self) -> &[f32] {
        &self.target
    }

    pub fn boost_side(&self) -> Option<BoostSide> {
        self.boost.map(|b| b.side)
    }

    /// One tick: derive targets from `block` (silence if `None`), roll the
    /// boost dice, then smooth every band toward its target.
    pub fn update(&mut self, block: Option<&AudioBlock>) {
        self.compute_targets(block);
        self.apply_boost();
        self.smooth();
    }

    fn compute_targets(&mut self, block: Option<&AudioBlock>) {
        let bands = self.bands();
        self.target.iter_mut().for_each(|t| *t = 0.0);

        let Some(block) = block else { return };
        let data: Vec<f32> = block.first_channel().collect();
        let segment = data.len() / bands;
        if segment == 0 {
            return;
        }

        for (target, chunk) in self.target.iter_mut().zip(data.chunks_exact(segment)) {
            let mean_sq = chunk.iter().map(|s| s * s).sum::<f32>() / segment as f32;
            *target = mean_sq.sqrt();
        }
    }

    fn apply_boost(&mut self) {
        if let Some(boost) = self.boost.filter(|b| b.ticks_left > 0) {
            let mid = self.bands() / 2;
            let range = match boost.side {
                BoostSide::Left => 0..mid,
                BoostSide::Right => mid..self.target.len(),
            };
            for t in &mut self.target[range] {
                *t *= self.settings.boost_strength;
            }
            self.boost = Some(Boost {
                ticks_left: boost.ticks_left - 1,
                ..boost
            });
            return;
        }

        let interval = self.settings.boost_interval.max(1);
        self.boost = if self.rng.gen_range(1..=interval) == 1 {
            let side = if self.rng.gen_bool(0.5) {
                BoostSide::Left
            } else {
                BoostSide::Right
            };
            Some(Boost {
                side,
                ticks_left: self.settings.boost_duration,
            })
        } else {
            None
        };
    }

    fn smooth(&mut self) {
        let s = &self.settings;
        for ((amp, target), history) in self
            .amplitude
            .iter_mut()
            .zip(&self.target)
            .zip(&mut self.history)
        {
            history.pop_front();
            history.push_back(*target);
            let avg = history.iter().sum::<f32>() / history.len() as f32;

            let factor = if avg > *amp { s.attack } else { s.release };
            let smoothed = factor * avg + (1.0 - factor) * *amp;
            let delta = smoothed - *amp;

            *amp = if delta.abs() > s.max_delta {
                *amp + delta.signum() * s.max_delta
            } else {
                smoothed
            };
        }
    }

    /// Bar heights in `0..=max_height`, normalised to the loudest band and
    /// shaped by the envelope.
    pub fn bar_heights(&self, max_height: f32) -> Vec<f32> {
        let peak = self.amplitude.iter().copied().fold(1e-6_f32, f32::max);
        self.amplitude
            .iter()
            .zip(&self.envelope)
            .map(|(amp, env)| amp / peak * env * max_height)
            .collect()
    }
}

/// `0.7 * (cos(x - π/2) * 0.5 + 0.5) + 0.3` over `x ∈ [0, π]`.
fn envelope(bands: usize) -> Vec<f32> {
    let step = if bands > 1 {
        std::f32::consts::PI / (bands - 1) as f32
    } else {
        0.0
    };
    (0..bands)
        .map(|i| {
            let x = i as f32 * step;
            0.7 * ((x - std::f32::consts::FRAC_PI_2).cos() * 0.5 + 0.5) + 0.3
        })
        .collect()
}
