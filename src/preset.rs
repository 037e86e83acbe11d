//! Named bundles of module overrides, applied all-or-nothing.

use serde::{Deserialize, Serialize};

use crate::param::ParamValue;
use crate::registry::{ChainId, ModuleId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamOverride {
    pub param: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetTarget {
    /// Defaults to the preset's own chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainId>,
    pub module: ModuleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub overrides: Vec<ParamOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub chain: ChainId,
    pub targets: Vec<PresetTarget>,
}

impl Preset {
    pub fn target_chain(&self, target: &PresetTarget) -> ChainId {
        target.chain.unwrap_or(self.chain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetLibrary {
    presets: Vec<Preset>,
}

impl PresetLibrary {
    pub fn builtin() -> Self {
        PresetLibrary {
            presets: builtin_presets(),
        }
    }

    /// Adds or replaces (by id and chain) a preset.
    pub fn insert(&mut self, preset: Preset) {
        match self
            .presets
            .iter_mut()
            .find(|p| p.id == preset.id && p.chain == preset.chain)
        {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn extend(&mut self, presets: impl IntoIterator<Item = Preset>) {
        for preset in presets {
            self.insert(preset);
        }
    }

    pub fn get(&self, chain: ChainId, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.chain == chain && p.id == id)
    }

    pub fn for_chain(&self, chain: ChainId) -> impl Iterator<Item = &Preset> {
        self.presets.iter().filter(move |p| p.chain == chain)
    }

    pub fn all(&self) -> &[Preset] {
        &self.presets
    }

    pub fn from_json(json: &str) -> Result<Vec<Preset>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn target(module: ModuleId, enabled: Option<bool>, overrides: &[(&str, ParamValue)]) -> PresetTarget {
    PresetTarget {
        chain: None,
        module,
        enabled,
        overrides: overrides
            .iter()
            .map(|(param, value)| ParamOverride {
                param: param.to_string(),
                value: value.clone(),
            })
            .collect(),
    }
}

fn preset(id: &str, name: &str, description: &str, chain: ChainId, targets: Vec<PresetTarget>) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        chain,
        targets,
    }
}

fn num(v: f32) -> ParamValue {
    ParamValue::Number(v)
}

fn builtin_presets() -> Vec<Preset> {
    vec![
        preset(
            "fm-talk",
            "FM Talk",
            "Speech-friendly: narrower image, gentle clipping.",
            ChainId::Broadcast,
            vec![
                target(ModuleId::PreEmphasis, Some(true), &[("type", "75us".into()), ("hf_limit", num(-4.0))]),
                target(ModuleId::StereoEncoder, Some(true), &[("stereo_width", num(80.0)), ("pilot_level", num(9.0))]),
                target(ModuleId::RdsEncoder, Some(true), &[("drive_level", num(4.0)), ("pty", num(1.0))]),
                target(ModuleId::CompositeClipper, Some(true), &[("threshold", num(90.0)), ("drive", num(0.0))]),
            ],
        ),
        preset(
            "fm-music-loud",
            "FM Music (Loud)",
            "Wide image, driven composite clipper.",
            ChainId::Broadcast,
            vec![
                target(ModuleId::PreEmphasis, Some(true), &[("type", "75us".into()), ("hf_limit", num(-2.0))]),
                target(ModuleId::StereoEncoder, Some(true), &[("stereo_width", num(110.0)), ("pilot_level", num(9.0))]),
                target(ModuleId::RdsEncoder, Some(true), &[("drive_level", num(4.5)), ("pty", num(10.0))]),
                target(ModuleId::CompositeClipper, Some(true), &[("threshold", num(95.0)), ("drive", num(3.0))]),
            ],
        ),
        preset(
            "hd-simulcast",
            "HD Simulcast",
            "Hybrid analog/digital with diversity delay.",
            ChainId::Broadcast,
            vec![
                target(ModuleId::PreEmphasis, Some(true), &[("type", "75us".into())]),
                target(ModuleId::CompositeClipper, Some(true), &[("threshold", num(92.0))]),
                target(
                    ModuleId::HdRadio,
                    Some(true),
                    &[
                        ("injection_level", num(20.0)),
                        ("service_mode", "MP3".into()),
                        ("diversity_delay_ms", num(8000.0)),
                    ],
                ),
            ],
        ),
        preset(
            "dab-plus-feed",
            "DAB+ Feed",
            "European feed: 50 µs, DAB+ multiplex output.",
            ChainId::Broadcast,
            vec![
                target(ModuleId::PreEmphasis, Some(true), &[("type", "50us".into())]),
                target(
                    ModuleId::DabPlus,
                    Some(true),
                    &[
                        ("bitrate_kbps", "96".into()),
                        ("protection", "EEP-3A".into()),
                        ("audio_codec", "HE-AACv2".into()),
                        ("level", num(-9.0)),
                    ],
                ),
                target(ModuleId::HdRadio, Some(false), &[]),
            ],
        ),
        preset(
            "wide-music",
            "Wide Music",
            "Expanded image with enhancer lift.",
            ChainId::Spatial,
            vec![
                target(
                    ModuleId::Enhancer,
                    Some(true),
                    &[("intensity", num(70.0)), ("image_width", num(130.0)), ("eq.high", num(2.0))],
                ),
                target(ModuleId::WidthControl, Some(true), &[("width", num(140.0)), ("bass_mono_cutoff", num(120.0))]),
                target(ModuleId::PhaseCorrection, Some(true), &[("rotation", num(0.0))]),
            ],
        ),
        preset(
            "mono-safe",
            "Mono Safe",
            "Narrow image, wide mono bass zone.",
            ChainId::Spatial,
            vec![
                target(ModuleId::Enhancer, Some(true), &[("intensity", num(20.0)), ("image_width", num(80.0))]),
                target(ModuleId::WidthControl, Some(true), &[("width", num(60.0)), ("bass_mono_cutoff", num(200.0))]),
                target(ModuleId::MidSide, Some(true), &[("side_gain", num(-3.0))]),
                target(ModuleId::Panning, Some(true), &[("position", num(0.0))]),
            ],
        ),
        preset(
            "phase-fix",
            "Phase Fix",
            "Inverts one channel to recover a polarity-swapped feed.",
            ChainId::Spatial,
            vec![target(
                ModuleId::PhaseCorrection,
                Some(true),
                &[("auto_correct", false.into()), ("rotation", num(180.0))],
            )],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_targets_belong_to_their_chain() {
        let lib = PresetLibrary::builtin();
        for p in lib.all() {
            for t in &p.targets {
                assert_eq!(t.module.chain(), p.target_chain(t), "{}", p.id);
            }
        }
    }

    #[test]
    fn test_lookup_is_per_chain() {
        let lib = PresetLibrary::builtin();
        assert!(lib.get(ChainId::Broadcast, "fm-talk").is_some());
        assert!(lib.get(ChainId::Spatial, "fm-talk").is_none());
        assert_eq!(lib.for_chain(ChainId::Spatial).count(), 3);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut lib = PresetLibrary::builtin();
        let before = lib.all().len();
        let mut p = lib.get(ChainId::Broadcast, "fm-talk").unwrap().clone();
        p.name = "Talk v2".to_string();
        lib.insert(p);
        assert_eq!(lib.all().len(), before);
        assert_eq!(lib.get(ChainId::Broadcast, "fm-talk").unwrap().name, "Talk v2");
    }

    #[test]
    fn test_presets_from_json() {
        let json = r#"[{
            "id": "night",
            "name": "Night",
            "chain": "broadcast",
            "targets": [
                {"module": "composite_clipper", "overrides": [{"param": "threshold", "value": 85}]},
                {"module": "rds_encoder", "enabled": false}
            ]
        }]"#;
        let presets = PresetLibrary::from_json(json).unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].targets[0].overrides[0].value, ParamValue::Number(85.0));
        assert_eq!(presets[0].targets[1].enabled, Some(false));
    }
}
