//! The fixed module catalogue for both processing chains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::param::{EditRule, ParamSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainId {
    /// FM/AM/HD/DAB+ transmission chain.
    Broadcast,
    /// Stereo/spatial image chain.
    Spatial,
}

impl ChainId {
    pub const ALL: [ChainId; 2] = [ChainId::Broadcast, ChainId::Spatial];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Broadcast => "broadcast",
            ChainId::Spatial => "spatial",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChainId::Broadcast => "FM / AM / HD",
            ChainId::Spatial => "Stereo / Spatial",
        }
    }

    /// Modules of this chain in signal order.
    pub fn modules(&self) -> &'static [ModuleId] {
        match self {
            ChainId::Broadcast => &[
                ModuleId::PreEmphasis,
                ModuleId::StereoEncoder,
                ModuleId::RdsEncoder,
                ModuleId::CompositeClipper,
                ModuleId::HdRadio,
                ModuleId::DabPlus,
            ],
            ChainId::Spatial => &[
                ModuleId::Enhancer,
                ModuleId::WidthControl,
                ModuleId::MidSide,
                ModuleId::PhaseCorrection,
                ModuleId::Panning,
            ],
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" | "fm" => Ok(ChainId::Broadcast),
            "spatial" | "stereo" => Ok(ChainId::Spatial),
            other => Err(format!("unknown chain '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    PreEmphasis,
    StereoEncoder,
    RdsEncoder,
    CompositeClipper,
    HdRadio,
    DabPlus,
    Enhancer,
    WidthControl,
    MidSide,
    PhaseCorrection,
    Panning,
}

impl ModuleId {
    pub const ALL: [ModuleId; 11] = [
        ModuleId::PreEmphasis,
        ModuleId::StereoEncoder,
        ModuleId::RdsEncoder,
        ModuleId::CompositeClipper,
        ModuleId::HdRadio,
        ModuleId::DabPlus,
        ModuleId::Enhancer,
        ModuleId::WidthControl,
        ModuleId::MidSide,
        ModuleId::PhaseCorrection,
        ModuleId::Panning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::PreEmphasis => "pre_emphasis",
            ModuleId::StereoEncoder => "stereo_encoder",
            ModuleId::RdsEncoder => "rds_encoder",
            ModuleId::CompositeClipper => "composite_clipper",
            ModuleId::HdRadio => "hd_radio",
            ModuleId::DabPlus => "dab_plus",
            ModuleId::Enhancer => "enhancer",
            ModuleId::WidthControl => "width_control",
            ModuleId::MidSide => "mid_side",
            ModuleId::PhaseCorrection => "phase_correction",
            ModuleId::Panning => "panning",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModuleId::PreEmphasis => "Pre-emphasis",
            ModuleId::StereoEncoder => "Stereo Encoder",
            ModuleId::RdsEncoder => "RDS Encoder",
            ModuleId::CompositeClipper => "Composite Clipper",
            ModuleId::HdRadio => "HD Radio",
            ModuleId::DabPlus => "DAB+",
            ModuleId::Enhancer => "Enhancer",
            ModuleId::WidthControl => "Width Control",
            ModuleId::MidSide => "Mid/Side",
            ModuleId::PhaseCorrection => "Phase Correction",
            ModuleId::Panning => "Panning",
        }
    }

    pub fn chain(&self) -> ChainId {
        match self {
            ModuleId::PreEmphasis
            | ModuleId::StereoEncoder
            | ModuleId::RdsEncoder
            | ModuleId::CompositeClipper
            | ModuleId::HdRadio
            | ModuleId::DabPlus => ChainId::Broadcast,
            ModuleId::Enhancer
            | ModuleId::WidthControl
            | ModuleId::MidSide
            | ModuleId::PhaseCorrection
            | ModuleId::Panning => ChainId::Spatial,
        }
    }

    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, ModuleId::HdRadio | ModuleId::DabPlus)
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        match self {
            ModuleId::PreEmphasis => PRE_EMPHASIS,
            ModuleId::StereoEncoder => STEREO_ENCODER,
            ModuleId::RdsEncoder => RDS_ENCODER,
            ModuleId::CompositeClipper => COMPOSITE_CLIPPER,
            ModuleId::HdRadio => HD_RADIO,
            ModuleId::DabPlus => DAB_PLUS,
            ModuleId::Enhancer => ENHANCER,
            ModuleId::WidthControl => WIDTH_CONTROL,
            ModuleId::MidSide => MID_SIDE,
            ModuleId::PhaseCorrection => PHASE_CORRECTION,
            ModuleId::Panning => PANNING,
        }
    }

    pub fn spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.specs().iter().find(|s| s.name == name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ModuleId::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("unknown module '{}'", s))
    }
}

pub const PREEMPHASIS_TYPES: &[&str] = &["none", "50us", "75us"];

const PRE_EMPHASIS: &[ParamSpec] = &[
    ParamSpec::choice("type", "Type", PREEMPHASIS_TYPES, "75us"),
    ParamSpec::range("deemphasis_amount", "De-emphasis Amount", "%", 0.0, 100.0, 1.0, 100.0)
        .editable_when(EditRule::ChoiceIsNot { param: "type", value: "none" }),
    ParamSpec::range("hf_limit", "HF Limit", "dB", -12.0, 0.0, 0.5, -3.0),
];

const STEREO_ENCODER: &[ParamSpec] = &[
    ParamSpec::range("pilot_level", "Pilot Level", "%", 0.0, 20.0, 0.1, 9.0),
    ParamSpec::range("stereo_width", "Stereo Width", "%", 0.0, 150.0, 1.0, 100.0),
    ParamSpec::range("pilot_phase", "Pilot Phase", "°", -10.0, 10.0, 0.1, 0.0),
];

const RDS_GROUP_MIX: &[ParamSpec] = &[
    ParamSpec::range("g0a", "0A groups", "", 0.0, 10.0, 1.0, 4.0),
    ParamSpec::range("g2a", "2A groups", "", 0.0, 10.0, 1.0, 1.0),
    ParamSpec::range("g4a", "4A groups", "", 0.0, 10.0, 1.0, 0.0),
];

const RDS_ENCODER: &[ParamSpec] = &[
    ParamSpec::range("drive_level", "Drive Level", "%", 0.0, 20.0, 0.1, 4.0),
    ParamSpec::range("pty", "Programme Type", "", 0.0, 31.0, 1.0, 10.0),
    ParamSpec::group("group_mix", "Group Mix", RDS_GROUP_MIX),
];

const COMPOSITE_CLIPPER: &[ParamSpec] = &[
    ParamSpec::range("threshold", "Clip Threshold", "%", 50.0, 100.0, 0.5, 92.0),
    ParamSpec::range("drive", "Drive", "dB", 0.0, 12.0, 0.5, 0.0),
    ParamSpec::range("lookahead_ms", "Lookahead", "ms", 0.0, 10.0, 0.5, 2.0),
];

const HD_RADIO: &[ParamSpec] = &[
    ParamSpec::range("injection_level", "Injection Level", "%", 0.0, 100.0, 1.0, 20.0),
    ParamSpec::choice("service_mode", "Service Mode", &["MP1", "MP2", "MP3", "MP5", "MP11"], "MP1"),
    ParamSpec::range("diversity_delay_ms", "Diversity Delay", "ms", 0.0, 10000.0, 1.0, 0.0),
];

const DAB_PLUS: &[ParamSpec] = &[
    ParamSpec::choice("bitrate_kbps", "Bitrate", &["48", "64", "72", "80", "96", "128"], "96"),
    ParamSpec::choice("protection", "Protection", &["EEP-1A", "EEP-2A", "EEP-3A", "EEP-4A"], "EEP-3A"),
    ParamSpec::choice("audio_codec", "Audio Codec", &["HE-AACv2", "HE-AACv1", "AAC-LC"], "HE-AACv2"),
    ParamSpec::range("level", "Level", "dBFS", -20.0, 0.0, 0.5, -6.0),
];

const ENHANCER_EQ: &[ParamSpec] = &[
    ParamSpec::range("low", "Low", "dB", -12.0, 12.0, 0.5, 0.0),
    ParamSpec::range("mid", "Mid", "dB", -12.0, 12.0, 0.5, 0.0),
    ParamSpec::range("high", "High", "dB", -12.0, 12.0, 0.5, 0.0),
];

const ENHANCER: &[ParamSpec] = &[
    ParamSpec::range("intensity", "Intensity", "%", 0.0, 100.0, 1.0, 50.0),
    ParamSpec::range("image_width", "Image Width", "%", 0.0, 200.0, 1.0, 100.0),
    ParamSpec::group("eq", "Three-band EQ", ENHANCER_EQ),
];

const WIDTH_CONTROL: &[ParamSpec] = &[
    ParamSpec::range("width", "Width", "%", 0.0, 200.0, 1.0, 100.0),
    ParamSpec::range("bass_mono_cutoff", "Mono Bass Below", "Hz", 20.0, 500.0, 5.0, 120.0),
];

const MID_SIDE: &[ParamSpec] = &[
    ParamSpec::range("mid_gain", "Mid Gain", "dB", -12.0, 12.0, 0.5, 0.0),
    ParamSpec::range("side_gain", "Side Gain", "dB", -12.0, 12.0, 0.5, 0.0),
];

const PHASE_CORRECTION: &[ParamSpec] = &[
    ParamSpec::range("rotation", "Rotation", "°", -180.0, 180.0, 1.0, 0.0)
        .editable_when(EditRule::ToggleIs { param: "auto_correct", value: false }),
    ParamSpec::toggle("auto_correct", "Auto Correct", false),
];

const PANNING: &[ParamSpec] = &[
    ParamSpec::range("position", "Position", "", -100.0, 100.0, 1.0, 0.0),
    ParamSpec::choice("law", "Pan Law", &["-3dB", "-4.5dB", "-6dB"], "-3dB"),
];

const PTY_LABELS: [&str; 32] = [
    "None",
    "News",
    "Current affairs",
    "Information",
    "Sport",
    "Education",
    "Drama",
    "Culture",
    "Science",
    "Varied",
    "Pop music",
    "Rock music",
    "Easy listening",
    "Light classical",
    "Serious classical",
    "Other music",
    "Weather",
    "Finance",
    "Children's programmes",
    "Social affairs",
    "Religion",
    "Phone-in",
    "Travel",
    "Leisure",
    "Jazz music",
    "Country music",
    "National music",
    "Oldies music",
    "Folk music",
    "Documentary",
    "Alarm test",
    "Alarm",
];

/// Label for an RDS programme type code, as shown next to the `pty` value.
pub fn pty_label(code: u8) -> &'static str {
    PTY_LABELS.get(code as usize).copied().unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_module_belongs_to_its_chain() {
        for chain in ChainId::ALL {
            for module in chain.modules() {
                assert_eq!(module.chain(), chain);
            }
        }
    }

    #[test]
    fn test_module_round_trips_through_str() {
        for module in ModuleId::ALL {
            assert_eq!(module.as_str().parse::<ModuleId>().unwrap(), module);
        }
        assert_eq!("Width-Control".parse::<ModuleId>().unwrap(), ModuleId::WidthControl);
    }

    #[test]
    fn test_pty_labels() {
        assert_eq!(pty_label(10), "Pop music");
        assert_eq!(pty_label(31), "Alarm");
        assert_eq!(pty_label(40), "Unknown");
    }

    #[test]
    fn test_defaults_are_inside_their_domain() {
        use crate::param::ParamDomain;
        for module in ModuleId::ALL {
            for spec in module.specs() {
                if let ParamDomain::Range { min, max, default, .. } = spec.domain {
                    assert!(default >= min && default <= max, "{}.{}", module, spec.name);
                }
            }
        }
    }
}
