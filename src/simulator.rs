//! Synthetic signal metrics derived from chain parameters.
//!
//! Nothing here touches audio. Channel levels take a bounded random walk
//! while the engine is playing, and every other figure is a closed-form
//! function of those levels and the current module parameters. Renderers
//! only ever see a [`SignalSnapshot`], so a real analysis pipeline can
//! replace [`RandomWalkSimulator`] behind the [`SignalSource`] trait.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::chain::ProcessingChain;
use crate::registry::{ChainId, ModuleId};

pub const HISTORY_LEN: usize = 100;
pub const BROADCAST_STEP: f32 = 15.0;
pub const SPATIAL_RATIO: f32 = 0.3;
pub const SPATIAL_NOMINAL: f32 = 50.0;

const BASELINE_LEFT: f32 = 60.0;
const BASELINE_RIGHT: f32 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LevelSample {
    pub left: f32,
    pub right: f32,
    pub mono: f32,
    pub difference: f32,
    pub composite: f32,
}

/// Instantaneous simulated signal state for one chain. All levels are on a
/// 0–100 scale except `correlation` (−1..+1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub left: f32,
    pub right: f32,
    pub mono: f32,
    pub difference: f32,
    pub composite: f32,
    pub pilot: f32,
    pub rds: f32,
    pub hd: f32,
    pub correlation: f32,
    pub history: VecDeque<LevelSample>,
    pub history_len: usize,
    pub sequence: u64,
    pub elapsed: f32,
}

impl SignalSnapshot {
    /// Deterministic starting point for a chain, history pre-filled.
    pub fn baseline(chain: &ProcessingChain, history_len: usize) -> Self {
        let history_len = history_len.max(1);
        let mut snapshot = SignalSnapshot::from_levels(chain, BASELINE_LEFT, BASELINE_RIGHT);
        let sample = snapshot.sample();
        snapshot.history = std::iter::repeat(sample).take(history_len).collect();
        snapshot.history_len = history_len;
        snapshot
    }

    fn from_levels(chain: &ProcessingChain, left: f32, right: f32) -> Self {
        let d = derive_levels(chain, left, right);
        SignalSnapshot {
            left,
            right,
            mono: d.mono,
            difference: d.difference,
            composite: d.composite,
            pilot: d.pilot,
            rds: d.rds,
            hd: d.hd,
            correlation: d.correlation,
            history: VecDeque::new(),
            history_len: 0,
            sequence: 0,
            elapsed: 0.0,
        }
    }

    pub fn sample(&self) -> LevelSample {
        LevelSample {
            left: self.left,
            right: self.right,
            mono: self.mono,
            difference: self.difference,
            composite: self.composite,
        }
    }
}

/// Everything the simulator computes from channel levels plus parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedLevels {
    pub mono: f32,
    pub difference: f32,
    pub composite: f32,
    pub pilot: f32,
    pub rds: f32,
    pub hd: f32,
    pub correlation: f32,
}

/// `|left − right| × width/100`, capped to the meter scale.
pub fn difference_level(left: f32, right: f32, width: f32) -> f32 {
    ((left - right).abs() * (width / 100.0)).clamp(0.0, 100.0)
}

/// Width of the stereo stage that feeds the difference signal, if that
/// stage is switched on.
pub fn stereo_width(chain: &ProcessingChain) -> Option<f32> {
    match chain.id() {
        ChainId::Broadcast => chain
            .active_module(ModuleId::StereoEncoder)
            .map(|m| m.number("stereo_width")),
        ChainId::Spatial => chain
            .active_module(ModuleId::WidthControl)
            .map(|m| m.number("width")),
    }
}

pub fn derive_levels(chain: &ProcessingChain, left: f32, right: f32) -> DerivedLevels {
    let mono = (left + right) / 2.0;
    let difference = stereo_width(chain)
        .map(|w| difference_level(left, right, w))
        .unwrap_or(0.0);
    let pilot = chain
        .active_module(ModuleId::StereoEncoder)
        .map(|m| m.number("pilot_level"))
        .unwrap_or(0.0);
    let rds = chain
        .active_module(ModuleId::RdsEncoder)
        .map(|m| m.number("drive_level"))
        .unwrap_or(0.0);
    let hd = chain
        .active_module(ModuleId::HdRadio)
        .map(|m| m.number("injection_level"))
        .unwrap_or(0.0);
    let drive_db = chain
        .active_module(ModuleId::CompositeClipper)
        .map(|m| m.number("drive"))
        .unwrap_or(0.0);
    let composite =
        ((mono + difference / 2.0) * 10f32.powf(drive_db / 20.0) + pilot + rds).clamp(0.0, 100.0);
    let correlation = match chain.active_module(ModuleId::PhaseCorrection) {
        Some(m) => m.number("rotation").to_radians().cos(),
        None => (1.0 - 2.0 * difference / 100.0).clamp(-1.0, 1.0),
    };
    DerivedLevels {
        mono,
        difference,
        composite,
        pilot,
        rds,
        hd,
        correlation,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationBounds {
    /// Absolute per-tick step for broadcast channel levels.
    pub broadcast_step: f32,
    /// Relative spread around `spatial_nominal` for spatial channel levels.
    pub spatial_ratio: f32,
    pub spatial_nominal: f32,
}

impl Default for PerturbationBounds {
    fn default() -> Self {
        PerturbationBounds {
            broadcast_step: BROADCAST_STEP,
            spatial_ratio: SPATIAL_RATIO,
            spatial_nominal: SPATIAL_NOMINAL,
        }
    }
}

pub trait SignalSource {
    /// Next snapshot for `chain`. A disabled chain or a paused engine
    /// returns `previous` unchanged.
    fn tick(
        &mut self,
        chain: &ProcessingChain,
        previous: &SignalSnapshot,
        playing: bool,
        dt: f32,
    ) -> SignalSnapshot;
}

pub struct RandomWalkSimulator<R: Rng = StdRng> {
    rng: R,
    bounds: PerturbationBounds,
}

impl RandomWalkSimulator<StdRng> {
    pub fn seeded(seed: u64, bounds: PerturbationBounds) -> Self {
        RandomWalkSimulator::with_rng(StdRng::seed_from_u64(seed), bounds)
    }

    pub fn from_entropy(bounds: PerturbationBounds) -> Self {
        RandomWalkSimulator::with_rng(StdRng::from_entropy(), bounds)
    }
}

impl<R: Rng> RandomWalkSimulator<R> {
    pub fn with_rng(rng: R, bounds: PerturbationBounds) -> Self {
        RandomWalkSimulator { rng, bounds }
    }

    fn walk(&mut self, level: f32) -> f32 {
        let step = self.bounds.broadcast_step.abs();
        (level + self.rng.gen_range(-step..=step)).clamp(0.0, 100.0)
    }

    fn jitter(&mut self) -> f32 {
        let ratio = self.bounds.spatial_ratio.abs();
        let factor = 1.0 + self.rng.gen_range(-ratio..=ratio);
        (self.bounds.spatial_nominal * factor).clamp(0.0, 100.0)
    }
}

impl<R: Rng> SignalSource for RandomWalkSimulator<R> {
    fn tick(
        &mut self,
        chain: &ProcessingChain,
        previous: &SignalSnapshot,
        playing: bool,
        dt: f32,
    ) -> SignalSnapshot {
        if !chain.enabled() || !playing {
            return previous.clone();
        }

        let (left, right) = match chain.id() {
            ChainId::Broadcast => (self.walk(previous.left), self.walk(previous.right)),
            ChainId::Spatial => (self.jitter(), self.jitter()),
        };

        let mut next = SignalSnapshot::from_levels(chain, left, right);
        let capacity = previous.history_len.max(1);
        let mut history = previous.history.clone();
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(next.sample());
        next.history = history;
        next.history_len = capacity;
        next.sequence = previous.sequence + 1;
        next.elapsed = previous.elapsed + if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;
    use approx::assert_relative_eq;

    fn sim() -> RandomWalkSimulator {
        RandomWalkSimulator::seeded(7, PerturbationBounds::default())
    }

    #[test]
    fn test_difference_follows_width() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        chain
            .module_mut(ModuleId::StereoEncoder)
            .unwrap()
            .set_parameter("stereo_width", ParamValue::Number(110.0))
            .unwrap();
        let d = derive_levels(&chain, 80.0, 60.0);
        assert_relative_eq!(d.difference, 22.0, epsilon = 1e-4);
        assert_relative_eq!(d.mono, 70.0);
    }

    #[test]
    fn test_disabled_encoder_zeroes_difference_and_pilot() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        chain.module_mut(ModuleId::StereoEncoder).unwrap().set_enabled(false);
        let d = derive_levels(&chain, 80.0, 60.0);
        assert_eq!(d.difference, 0.0);
        assert_eq!(d.pilot, 0.0);
    }

    #[test]
    fn test_pilot_and_rds_mirror_parameters() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        chain
            .module_mut(ModuleId::StereoEncoder)
            .unwrap()
            .set_parameter("pilot_level", ParamValue::Number(10.5))
            .unwrap();
        let d = derive_levels(&chain, 50.0, 50.0);
        assert_eq!(d.pilot, 10.5);
        assert_eq!(d.rds, 4.0);
        assert_eq!(d.hd, 0.0);
    }

    #[test]
    fn test_correlation_from_rotation() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        chain
            .module_mut(ModuleId::PhaseCorrection)
            .unwrap()
            .set_parameter("rotation", ParamValue::Number(180.0))
            .unwrap();
        let d = derive_levels(&chain, 50.0, 50.0);
        assert_relative_eq!(d.correlation, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_disabled_chain_freezes() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        let start = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        chain.set_enabled(false);
        let mut sim = sim();
        let next = sim.tick(&chain, &start, true, 0.016);
        assert_eq!(next, start);
    }

    #[test]
    fn test_paused_freezes() {
        let chain = ProcessingChain::new(ChainId::Spatial);
        let start = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        let mut sim = sim();
        assert_eq!(sim.tick(&chain, &start, false, 0.016), start);
    }

    #[test]
    fn test_broadcast_walk_is_bounded() {
        let chain = ProcessingChain::new(ChainId::Broadcast);
        let mut snap = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        let mut sim = sim();
        for _ in 0..500 {
            let next = sim.tick(&chain, &snap, true, 0.016);
            assert!((next.left - snap.left).abs() <= BROADCAST_STEP + 1e-4);
            assert!((0.0..=100.0).contains(&next.left));
            assert!((0.0..=100.0).contains(&next.right));
            assert_relative_eq!(next.mono, (next.left + next.right) / 2.0);
            snap = next;
        }
        assert_eq!(snap.sequence, 500);
    }

    #[test]
    fn test_spatial_levels_stay_within_ratio() {
        let chain = ProcessingChain::new(ChainId::Spatial);
        let mut snap = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        let mut sim = sim();
        for _ in 0..200 {
            snap = sim.tick(&chain, &snap, true, 0.016);
            assert!(snap.left >= 35.0 - 1e-3 && snap.left <= 65.0 + 1e-3);
        }
    }

    #[test]
    fn test_history_keeps_capacity() {
        let chain = ProcessingChain::new(ChainId::Broadcast);
        let start = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        assert_eq!(start.history.len(), HISTORY_LEN);
        let mut sim = sim();
        let next = sim.tick(&chain, &start, true, 0.016);
        assert_eq!(next.history.len(), HISTORY_LEN);
        assert_eq!(*next.history.back().unwrap(), next.sample());
        assert_eq!(next.history[0], start.history[1]);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let chain = ProcessingChain::new(ChainId::Broadcast);
        let start = SignalSnapshot::baseline(&chain, HISTORY_LEN);
        let a = sim().tick(&chain, &start, true, 0.016);
        let b = sim().tick(&chain, &start, true, 0.016);
        assert_eq!(a, b);
    }
}
