use approx::assert_relative_eq;

use pulse_fm_chain::mixer::{MIC, PROGRAM};
use pulse_fm_chain::preset::PresetLibrary;
use pulse_fm_chain::render::spectrum::{corner_frequency, preemphasis_boost_db};
use pulse_fm_chain::scheduler::RecordingSurface;
use pulse_fm_chain::simulator::{derive_levels, stereo_width};
use pulse_fm_chain::{
    ChainError, ChainId, Engine, EngineConfig, FrameOutcome, ModuleId, ParamValue, ProcessingChain,
    RendererKind, SurfaceSize,
};

fn engine() -> Engine {
    Engine::new(&EngineConfig {
        seed: Some(7),
        ..EngineConfig::default()
    })
}

fn settings(chain: &ProcessingChain) -> Vec<(ModuleId, bool, Vec<(String, ParamValue)>)> {
    chain
        .modules()
        .iter()
        .map(|m| {
            let params = m.params().iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            (m.id(), m.enabled(), params)
        })
        .collect()
}

#[test]
fn test_numbers_clamp_and_snap() {
    let mut engine = engine();
    let b = ChainId::Broadcast;

    let stored = engine
        .set_parameter(b, ModuleId::StereoEncoder, "stereo_width", ParamValue::Number(173.0))
        .unwrap();
    assert_eq!(stored, ParamValue::Number(150.0));

    // on-grid values are stored exactly as given
    let stored = engine
        .set_parameter(b, ModuleId::StereoEncoder, "pilot_level", ParamValue::Number(9.3))
        .unwrap();
    assert_eq!(stored, ParamValue::Number(9.3));

    let stored = engine
        .set_parameter(b, ModuleId::PreEmphasis, "hf_limit", ParamValue::Number(-3.2))
        .unwrap();
    assert_eq!(stored, ParamValue::Number(-3.0));
}

#[test]
fn test_bad_choice_keeps_previous_value() {
    let mut engine = engine();
    let err = engine
        .set_parameter(
            ChainId::Broadcast,
            ModuleId::PreEmphasis,
            "type",
            ParamValue::Choice("90us".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, ChainError::InvalidParameter { .. }));
    let chain = engine.chain(ChainId::Broadcast).unwrap();
    assert_eq!(chain.module(ModuleId::PreEmphasis).unwrap().choice("type"), "75us");
}

#[test]
fn test_disable_keeps_parameters() {
    let mut engine = engine();
    let b = ChainId::Broadcast;
    engine
        .set_parameter(b, ModuleId::StereoEncoder, "stereo_width", ParamValue::Number(120.0))
        .unwrap();
    engine.set_module_enabled(b, ModuleId::StereoEncoder, false).unwrap();

    let chain = engine.chain(b).unwrap();
    assert_eq!(stereo_width(chain), None);
    assert_eq!(chain.module(ModuleId::StereoEncoder).unwrap().number("stereo_width"), 120.0);

    engine.set_module_enabled(b, ModuleId::StereoEncoder, true).unwrap();
    assert_eq!(stereo_width(engine.chain(b).unwrap()), Some(120.0));
}

#[test]
fn test_preset_is_all_or_nothing() {
    let mut engine = engine();
    let broken = PresetLibrary::from_json(
        r#"[{
            "id": "broken",
            "name": "Broken",
            "chain": "broadcast",
            "targets": [
                {"module": "stereo_encoder", "overrides": [{"param": "stereo_width", "value": 120}]},
                {"module": "pre_emphasis", "overrides": [{"param": "type", "value": "90us"}]}
            ]
        }]"#,
    )
    .unwrap();
    engine.load_presets(broken);

    let before = engine.chain(ChainId::Broadcast).unwrap().clone();
    assert!(engine.apply_preset(ChainId::Broadcast, "broken").is_err());
    assert_eq!(engine.chain(ChainId::Broadcast).unwrap(), &before);
}

#[test]
fn test_preset_is_idempotent() {
    let mut engine = engine();
    let first = engine.apply_preset(ChainId::Broadcast, "fm-talk").unwrap();
    let once = settings(engine.chain(ChainId::Broadcast).unwrap());
    let second = engine.apply_preset(ChainId::Broadcast, "fm-talk").unwrap();
    let twice = settings(engine.chain(ChainId::Broadcast).unwrap());
    assert_eq!(first, second);
    assert_eq!(once, twice);
}

#[test]
fn test_disabled_chain_freezes_snapshot() {
    let mut engine = engine();
    engine.set_chain_enabled(ChainId::Broadcast, false).unwrap();
    engine.set_playing(true);
    let before = engine.snapshot(ChainId::Broadcast).unwrap().clone();
    for _ in 0..10 {
        engine.advance(0.016);
    }
    assert_eq!(engine.snapshot(ChainId::Broadcast).unwrap(), &before);
    assert_eq!(engine.snapshot(ChainId::Spatial).unwrap().sequence, 10);
}

#[test]
fn test_difference_follows_stereo_width() {
    let mut chain = ProcessingChain::new(ChainId::Broadcast);
    chain
        .module_mut(ModuleId::StereoEncoder)
        .unwrap()
        .set_parameter("stereo_width", ParamValue::Number(110.0))
        .unwrap();
    let levels = derive_levels(&chain, 80.0, 60.0);
    assert_relative_eq!(levels.difference, 22.0, epsilon = 1e-4);
    assert_relative_eq!(levels.mono, 70.0);
}

#[test]
fn test_half_turn_rotation_inverts_correlation() {
    let mut chain = ProcessingChain::new(ChainId::Spatial);
    let phase = chain.module_mut(ModuleId::PhaseCorrection).unwrap();
    phase.set_enabled(true);
    phase.set_parameter("rotation", ParamValue::Number(180.0)).unwrap();
    let levels = derive_levels(&chain, 50.0, 50.0);
    assert_relative_eq!(levels.correlation, -1.0, epsilon = 1e-5);
}

#[test]
fn test_75us_corner_and_boost() {
    let fc = corner_frequency(75e-6);
    assert_relative_eq!(fc, 2122.07, epsilon = 0.05);
    assert_relative_eq!(preemphasis_boost_db(fc, 75e-6), 3.0103, epsilon = 1e-3);
}

#[test]
fn test_auto_balance_ducks_and_restores_program() {
    let mut engine = engine();
    engine.set_auto_balance(true);
    engine.set_playing(true);

    engine.set_mixer_level(MIC, 45.0);
    engine.advance(0.016);
    assert_eq!(engine.mixer().channels()[PROGRAM].level, 25.0);

    // threshold is exclusive
    engine.set_mixer_level(MIC, 30.0);
    engine.advance(0.016);
    assert_eq!(engine.mixer().channels()[PROGRAM].level, 75.0);
}

#[test]
fn test_resize_while_running() {
    let mut engine = engine();
    let surface = RecordingSurface::new();
    engine
        .register_surface(
            "scope",
            ChainId::Spatial,
            RendererKind::Vectorscope,
            Box::new(surface.clone()),
            100.0,
            50.0,
            2.0,
        )
        .unwrap();
    engine.start();

    assert!(matches!(engine.frame(0.016), FrameOutcome::Continue(_)));
    assert_eq!(surface.last_frame_size(), Some(SurfaceSize::new(200.0, 100.0)));

    engine.resize_surface("scope", 300.0, 150.0, 2.0).unwrap();
    assert_eq!(surface.last_provisioned(), Some((600, 300)));
    assert!(matches!(engine.frame(0.016), FrameOutcome::Continue(_)));
    assert_eq!(surface.last_frame_size(), Some(SurfaceSize::new(600.0, 300.0)));

    engine.stop();
    assert!(matches!(engine.frame(0.016), FrameOutcome::Stopped));
}
