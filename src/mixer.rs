//! Two-channel studio mixer with automatic mic-over-program balance.
//!
//! The balance law is a single threshold with no hysteresis or smoothing:
//! while auto-balance is on and the mic channel is above the threshold, the
//! program channel is pulled to the ducked level; otherwise it sits at the
//! level the operator last set by hand.

use serde::Serialize;
use tracing::debug;

pub const AUTO_BALANCE_THRESHOLD: f32 = 30.0;
pub const AUTO_BALANCE_DUCKED: f32 = 25.0;
pub const PROGRAM_NORMAL: f32 = 75.0;

pub const MIC: usize = 0;
pub const PROGRAM: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixerChannel {
    pub name: &'static str,
    pub level: f32,
    pub target: f32,
    pub fader: f32,
    pub normal: f32,
}

impl MixerChannel {
    fn new(name: &'static str, normal: f32) -> Self {
        MixerChannel {
            name,
            level: normal,
            target: normal,
            fader: normal,
            normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mixer {
    channels: [MixerChannel; 2],
    auto_balance: bool,
    ducked: bool,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer {
            channels: [MixerChannel::new("Mic", 0.0), MixerChannel::new("Program", PROGRAM_NORMAL)],
            auto_balance: false,
            ducked: false,
        }
    }
}

impl Mixer {
    pub fn channels(&self) -> &[MixerChannel; 2] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&MixerChannel> {
        self.channels.get(index)
    }

    pub fn auto_balance(&self) -> bool {
        self.auto_balance
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    pub fn set_auto_balance(&mut self, active: bool) {
        self.auto_balance = active;
    }

    /// Host-driven input level for a channel, 0–100.
    pub fn set_level(&mut self, index: usize, level: f32) {
        if let Some(ch) = self.channels.get_mut(index) {
            if level.is_finite() {
                ch.level = level.clamp(0.0, 100.0);
            }
        }
    }

    /// Operator fader move. Outside a duck this also becomes the channel's
    /// normal level.
    pub fn set_fader(&mut self, index: usize, fader: f32) {
        let ducked = self.ducked;
        if let Some(ch) = self.channels.get_mut(index) {
            if !fader.is_finite() {
                return;
            }
            let fader = fader.clamp(0.0, 100.0);
            ch.fader = fader;
            ch.target = fader;
            if !(ducked && index == PROGRAM) {
                ch.normal = fader;
            }
        }
    }

    /// One control step of the balance law, then the program level follows
    /// its target.
    pub fn tick(&mut self) {
        if self.auto_balance {
            let mic_active = self.channels[MIC].level > AUTO_BALANCE_THRESHOLD;
            let program = &mut self.channels[PROGRAM];
            if mic_active {
                program.target = AUTO_BALANCE_DUCKED;
                program.fader = AUTO_BALANCE_DUCKED;
            } else {
                program.target = program.normal;
                program.fader = program.normal;
            }
            if mic_active != self.ducked {
                debug!(ducked = mic_active, "auto-balance switched");
            }
            self.ducked = mic_active;
        } else {
            self.ducked = false;
        }
        let program = &mut self.channels[PROGRAM];
        program.level = program.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mic_over_threshold_ducks_program() {
        let mut mixer = Mixer::default();
        mixer.set_auto_balance(true);
        mixer.set_level(MIC, 45.0);
        mixer.tick();
        let program = &mixer.channels()[PROGRAM];
        assert_eq!(program.target, 25.0);
        assert_eq!(program.fader, 25.0);
        assert_eq!(program.level, 25.0);
        assert!(mixer.is_ducked());
    }

    #[test]
    fn test_program_recovers_when_mic_quiet() {
        let mut mixer = Mixer::default();
        mixer.set_auto_balance(true);
        mixer.set_level(MIC, 45.0);
        mixer.tick();
        mixer.set_level(MIC, 10.0);
        mixer.tick();
        mixer.tick();
        let program = &mixer.channels()[PROGRAM];
        assert_eq!(program.target, 75.0);
        assert_eq!(program.fader, 75.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut mixer = Mixer::default();
        mixer.set_auto_balance(true);
        mixer.set_level(MIC, 30.0);
        mixer.tick();
        assert_eq!(mixer.channels()[PROGRAM].fader, 75.0);
    }

    #[test]
    fn test_no_balance_when_inactive() {
        let mut mixer = Mixer::default();
        mixer.set_level(MIC, 90.0);
        mixer.tick();
        assert_eq!(mixer.channels()[PROGRAM].fader, 75.0);
    }

    #[test]
    fn test_fader_during_duck_keeps_normal() {
        let mut mixer = Mixer::default();
        mixer.set_fader(PROGRAM, 60.0);
        mixer.set_auto_balance(true);
        mixer.set_level(MIC, 50.0);
        mixer.tick();
        mixer.set_fader(PROGRAM, 20.0);
        mixer.set_level(MIC, 0.0);
        mixer.tick();
        assert_eq!(mixer.channels()[PROGRAM].fader, 60.0);
    }
}
