//! The engine context that owns both processing chains.
//!
//! Hosts hold one [`Engine`] and talk to it through direct calls or
//! [`EngineCommand`] values. Renderers and the simulator only ever see
//! shared references to the chains.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::{ProcessingChain, VisualizationTab};
use crate::config::EngineConfig;
use crate::error::{ChainError, ChainResult};
use crate::mixer::Mixer;
use crate::param::ParamValue;
use crate::preset::{Preset, PresetLibrary};
use crate::registry::{ChainId, ModuleId};
use crate::render::RendererKind;
use crate::scheduler::{CancellationToken, DrawSurface, FrameReport, RenderScheduler, SchedulerState};
use crate::simulator::{RandomWalkSimulator, SignalSnapshot, SignalSource};

struct ChainRuntime {
    chain: ProcessingChain,
    snapshot: SignalSnapshot,
}

impl ChainRuntime {
    fn fresh(id: ChainId, history_len: usize) -> Self {
        let chain = ProcessingChain::new(id);
        let snapshot = SignalSnapshot::baseline(&chain, history_len);
        ChainRuntime { chain, snapshot }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    Continue(FrameReport),
    /// Not started, or nothing registered.
    Idle,
    /// The cancellation token fired.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    SetParameter {
        chain: ChainId,
        module: ModuleId,
        param: String,
        value: ParamValue,
    },
    SetModuleEnabled {
        chain: ChainId,
        module: ModuleId,
        enabled: bool,
    },
    SetChainEnabled {
        chain: ChainId,
        enabled: bool,
    },
    SetActiveTab {
        chain: ChainId,
        tab: VisualizationTab,
    },
    ApplyPreset {
        chain: ChainId,
        preset: String,
    },
    SetPlaying {
        playing: bool,
    },
    SetAutoBalance {
        active: bool,
    },
    SetMixerLevel {
        channel: usize,
        level: f32,
    },
    SetMixerFader {
        channel: usize,
        fader: f32,
    },
    TeardownChain {
        chain: ChainId,
    },
    RestoreChain {
        chain: ChainId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Applied,
    /// The value actually stored after clamping and snapping.
    Stored(ParamValue),
    PresetApplied(Vec<(ChainId, ModuleId)>),
}

pub struct Engine {
    chains: BTreeMap<ChainId, ChainRuntime>,
    source: Box<dyn SignalSource>,
    mixer: Mixer,
    presets: PresetLibrary,
    scheduler: RenderScheduler,
    playing: bool,
    history_len: usize,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        let source: Box<dyn SignalSource> = match config.seed {
            Some(seed) => Box::new(RandomWalkSimulator::seeded(seed, config.bounds())),
            None => Box::new(RandomWalkSimulator::from_entropy(config.bounds())),
        };
        Engine::with_source(config, source)
    }

    pub fn with_source(config: &EngineConfig, source: Box<dyn SignalSource>) -> Self {
        let history_len = config.history_len.max(1);
        let chains = ChainId::ALL
            .iter()
            .map(|id| (*id, ChainRuntime::fresh(*id, history_len)))
            .collect();
        let mut presets = PresetLibrary::builtin();
        presets.extend(config.presets.iter().cloned());
        info!(
            presets = presets.all().len(),
            history_len,
            seeded = config.seed.is_some(),
            "engine ready"
        );
        Engine {
            chains,
            source,
            mixer: Mixer::default(),
            presets,
            scheduler: RenderScheduler::new(config.skip_unchanged_frames),
            playing: false,
            history_len,
        }
    }

    fn runtime(&self, id: ChainId) -> ChainResult<&ChainRuntime> {
        self.chains.get(&id).ok_or(ChainError::ChainUnavailable(id))
    }

    fn runtime_mut(&mut self, id: ChainId) -> ChainResult<&mut ChainRuntime> {
        self.chains.get_mut(&id).ok_or(ChainError::ChainUnavailable(id))
    }

    pub fn chain(&self, id: ChainId) -> ChainResult<&ProcessingChain> {
        self.runtime(id).map(|rt| &rt.chain)
    }

    /// Every chain that has not been torn down.
    pub fn chains(&self) -> impl Iterator<Item = &ProcessingChain> {
        self.chains.values().map(|rt| &rt.chain)
    }

    pub fn snapshot(&self, id: ChainId) -> ChainResult<&SignalSnapshot> {
        self.runtime(id).map(|rt| &rt.snapshot)
    }

    pub fn set_parameter(
        &mut self,
        chain: ChainId,
        module: ModuleId,
        param: &str,
        value: ParamValue,
    ) -> ChainResult<ParamValue> {
        self.runtime_mut(chain)?
            .chain
            .module_mut(module)?
            .set_parameter(param, value)
    }

    pub fn set_module_enabled(&mut self, chain: ChainId, module: ModuleId, enabled: bool) -> ChainResult<()> {
        self.runtime_mut(chain)?.chain.module_mut(module)?.set_enabled(enabled);
        debug!(%chain, %module, enabled, "module switched");
        Ok(())
    }

    pub fn set_chain_enabled(&mut self, chain: ChainId, enabled: bool) -> ChainResult<()> {
        self.runtime_mut(chain)?.chain.set_enabled(enabled);
        info!(%chain, enabled, "chain switched");
        Ok(())
    }

    pub fn set_active_tab(&mut self, chain: ChainId, tab: VisualizationTab) -> ChainResult<()> {
        self.runtime_mut(chain)?.chain.set_active_tab(tab)
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    /// Merges extra presets over the library, replacing same-id entries.
    pub fn load_presets(&mut self, presets: Vec<Preset>) {
        let count = presets.len();
        self.presets.extend(presets);
        info!(count, "presets loaded");
    }

    /// Applies every target of a preset, or nothing.
    ///
    /// All writes are first made against copies of the affected chains. The
    /// copies replace the live chains only once every override and enable
    /// flag has validated. Returns the modules touched in declared order.
    pub fn apply_preset(&mut self, chain: ChainId, preset_id: &str) -> ChainResult<Vec<(ChainId, ModuleId)>> {
        self.runtime(chain)?;
        let preset = self
            .presets
            .get(chain, preset_id)
            .cloned()
            .ok_or_else(|| ChainError::UnknownPreset {
                chain,
                preset: preset_id.to_string(),
            })?;

        let mut staged: BTreeMap<ChainId, ProcessingChain> = BTreeMap::new();
        let mut touched = Vec::new();
        for target in &preset.targets {
            let target_chain = preset.target_chain(target);
            let working = match staged.entry(target_chain) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(self.runtime(target_chain)?.chain.clone()),
            };
            let module = working.module_mut(target.module)?;
            if let Some(enabled) = target.enabled {
                module.set_enabled(enabled);
            }
            for o in &target.overrides {
                let write = module.stage(&o.param, o.value.clone()).map_err(|e| {
                    warn!(preset = %preset.id, "preset rejected: {}", e);
                    e
                })?;
                module.commit(write);
            }
            if !touched.contains(&(target_chain, target.module)) {
                touched.push((target_chain, target.module));
            }
        }

        for (id, working) in staged {
            if let Some(rt) = self.chains.get_mut(&id) {
                rt.chain = working;
            }
        }
        info!(%chain, preset = %preset.id, modules = touched.len(), "preset applied");
        Ok(touched)
    }

    pub fn register_surface(
        &mut self,
        id: impl Into<String>,
        chain: ChainId,
        kind: RendererKind,
        handle: Box<dyn DrawSurface>,
        logical_width: f32,
        logical_height: f32,
        scale: f32,
    ) -> ChainResult<()> {
        self.runtime(chain)?;
        self.scheduler
            .register(id, chain, kind, handle, logical_width, logical_height, scale);
        Ok(())
    }

    pub fn unregister_surface(&mut self, id: &str) -> ChainResult<()> {
        self.scheduler.unregister(id)
    }

    pub fn resize_surface(&mut self, id: &str, width: f32, height: f32, scale: f32) -> ChainResult<()> {
        self.scheduler.resize(id, width, height, scale).map(|_| ())
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            info!(playing, "transport");
        }
        self.playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn set_auto_balance(&mut self, active: bool) {
        self.mixer.set_auto_balance(active);
    }

    pub fn set_mixer_level(&mut self, channel: usize, level: f32) {
        self.mixer.set_level(channel, level);
    }

    pub fn set_mixer_fader(&mut self, channel: usize, fader: f32) {
        self.mixer.set_fader(channel, fader);
    }

    /// Drops a chain and its snapshot. Surfaces bound to it stay registered
    /// but are skipped until the chain is restored.
    pub fn teardown_chain(&mut self, chain: ChainId) -> ChainResult<()> {
        self.chains
            .remove(&chain)
            .ok_or(ChainError::ChainUnavailable(chain))?;
        self.scheduler.invalidate_chain(chain);
        info!(%chain, "chain torn down");
        Ok(())
    }

    /// Rebuilds a chain from defaults. A chain that is still present is
    /// reset as well.
    pub fn restore_chain(&mut self, chain: ChainId) {
        self.chains
            .insert(chain, ChainRuntime::fresh(chain, self.history_len));
        self.scheduler.invalidate_chain(chain);
        info!(%chain, "chain restored");
    }

    pub fn start(&mut self) -> CancellationToken {
        self.scheduler.start()
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Advances every chain's snapshot and the mixer by one tick. Paused
    /// engines and disabled chains keep their snapshots.
    pub fn advance(&mut self, dt: f32) {
        let playing = self.playing;
        for rt in self.chains.values_mut() {
            rt.snapshot = self.source.tick(&rt.chain, &rt.snapshot, playing, dt);
        }
        if playing {
            self.mixer.tick();
        }
    }

    /// Host refresh callback.
    pub fn frame(&mut self, dt: f32) -> FrameOutcome {
        if self.scheduler.halt_if_cancelled() {
            return FrameOutcome::Stopped;
        }
        if self.scheduler.state() == SchedulerState::Idle {
            return FrameOutcome::Idle;
        }
        self.advance(dt);
        let chains = &self.chains;
        let report = self
            .scheduler
            .render_all(|id| chains.get(&id).map(|rt| (&rt.chain, &rt.snapshot)));
        FrameOutcome::Continue(report)
    }

    pub fn dispatch(&mut self, command: EngineCommand) -> ChainResult<CommandOutcome> {
        debug!(?command, "dispatch");
        match command {
            EngineCommand::SetParameter {
                chain,
                module,
                param,
                value,
            } => self
                .set_parameter(chain, module, &param, value)
                .map(CommandOutcome::Stored),
            EngineCommand::SetModuleEnabled { chain, module, enabled } => self
                .set_module_enabled(chain, module, enabled)
                .map(|_| CommandOutcome::Applied),
            EngineCommand::SetChainEnabled { chain, enabled } => self
                .set_chain_enabled(chain, enabled)
                .map(|_| CommandOutcome::Applied),
            EngineCommand::SetActiveTab { chain, tab } => {
                self.set_active_tab(chain, tab).map(|_| CommandOutcome::Applied)
            }
            EngineCommand::ApplyPreset { chain, preset } => self
                .apply_preset(chain, &preset)
                .map(CommandOutcome::PresetApplied),
            EngineCommand::SetPlaying { playing } => {
                self.set_playing(playing);
                Ok(CommandOutcome::Applied)
            }
            EngineCommand::SetAutoBalance { active } => {
                self.set_auto_balance(active);
                Ok(CommandOutcome::Applied)
            }
            EngineCommand::SetMixerLevel { channel, level } => {
                self.set_mixer_level(channel, level);
                Ok(CommandOutcome::Applied)
            }
            EngineCommand::SetMixerFader { channel, fader } => {
                self.set_mixer_fader(channel, fader);
                Ok(CommandOutcome::Applied)
            }
            EngineCommand::TeardownChain { chain } => {
                self.teardown_chain(chain).map(|_| CommandOutcome::Applied)
            }
            EngineCommand::RestoreChain { chain } => {
                self.restore_chain(chain);
                Ok(CommandOutcome::Applied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{MIC, PROGRAM};
    use crate::scheduler::RecordingSurface;

    fn engine() -> Engine {
        Engine::new(&EngineConfig {
            seed: Some(1),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_both_chains_present() {
        let e = engine();
        assert_eq!(e.chains().count(), 2);
        assert!(!e.is_playing());
        assert_eq!(e.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn test_torn_down_chain_rejects_everything() {
        let mut e = engine();
        e.teardown_chain(ChainId::Spatial).unwrap();
        let err = ChainError::ChainUnavailable(ChainId::Spatial);
        assert_eq!(e.chain(ChainId::Spatial).unwrap_err(), err);
        assert_eq!(e.snapshot(ChainId::Spatial).unwrap_err(), err);
        assert_eq!(
            e.set_parameter(ChainId::Spatial, ModuleId::Panning, "position", ParamValue::Number(10.0))
                .unwrap_err(),
            err
        );
        assert_eq!(e.apply_preset(ChainId::Spatial, "phase-fix").unwrap_err(), err);
        assert_eq!(e.teardown_chain(ChainId::Spatial).unwrap_err(), err);

        e.restore_chain(ChainId::Spatial);
        assert!(e.chain(ChainId::Spatial).is_ok());
    }

    #[test]
    fn test_unknown_preset() {
        let mut e = engine();
        assert!(matches!(
            e.apply_preset(ChainId::Broadcast, "wide-music"),
            Err(ChainError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn test_preset_touches_in_order() {
        let mut e = engine();
        let touched = e.apply_preset(ChainId::Broadcast, "hd-simulcast").unwrap();
        assert_eq!(
            touched,
            vec![
                (ChainId::Broadcast, ModuleId::PreEmphasis),
                (ChainId::Broadcast, ModuleId::CompositeClipper),
                (ChainId::Broadcast, ModuleId::HdRadio),
            ]
        );
        let hd = e.chain(ChainId::Broadcast).unwrap().module(ModuleId::HdRadio).unwrap();
        assert!(hd.enabled());
        assert_eq!(hd.number("diversity_delay_ms"), 8000.0);
    }

    #[test]
    fn test_bad_preset_commits_nothing() {
        let mut e = engine();
        let before = e.chain(ChainId::Broadcast).unwrap().clone();
        let bad: Vec<Preset> = PresetLibrary::from_json(
            r#"[{"id": "bad", "name": "Bad", "chain": "broadcast", "targets": [
                {"module": "stereo_encoder", "overrides": [{"param": "stereo_width", "value": 40}]},
                {"module": "pre_emphasis", "overrides": [{"param": "type", "value": "100us"}]}
            ]}]"#,
        )
        .unwrap();
        e.load_presets(bad);
        assert!(matches!(
            e.apply_preset(ChainId::Broadcast, "bad"),
            Err(ChainError::InvalidParameter { .. })
        ));
        assert_eq!(e.chain(ChainId::Broadcast).unwrap(), &before);
    }

    #[test]
    fn test_frame_idle_until_started_with_surfaces() {
        let mut e = engine();
        assert_eq!(e.frame(0.016), FrameOutcome::Idle);
        e.start();
        assert_eq!(e.frame(0.016), FrameOutcome::Idle);
        let rec = RecordingSurface::new();
        e.register_surface("meters", ChainId::Broadcast, RendererKind::LevelMeters, Box::new(rec.clone()), 100.0, 80.0, 1.0)
            .unwrap();
        assert!(matches!(e.frame(0.016), FrameOutcome::Continue(r) if r.rendered == 1));
        assert_eq!(rec.frame_count(), 1);
    }

    #[test]
    fn test_external_cancel_reports_stopped() {
        let mut e = engine();
        let rec = RecordingSurface::new();
        e.register_surface("v", ChainId::Spatial, RendererKind::Vectorscope, Box::new(rec.clone()), 100.0, 100.0, 1.0)
            .unwrap();
        let token = e.start();
        token.cancel();
        assert_eq!(e.frame(0.016), FrameOutcome::Stopped);
        assert_eq!(e.scheduler().surfaces().count(), 0);
        assert_eq!(rec.frame_count(), 0);
    }

    #[test]
    fn test_surfaces_registered_after_stop_survive() {
        let mut e = engine();
        e.start();
        e.stop();
        let rec = RecordingSurface::new();
        e.register_surface("s", ChainId::Spatial, RendererKind::PhaseCorrelation, Box::new(rec.clone()), 100.0, 100.0, 1.0)
            .unwrap();
        assert_eq!(e.frame(0.016), FrameOutcome::Stopped);
        assert_eq!(e.scheduler().surfaces().count(), 1);

        e.start();
        assert_eq!(e.scheduler_state(), SchedulerState::Running);
        assert!(matches!(e.frame(0.016), FrameOutcome::Continue(r) if r.rendered == 1));
        assert_eq!(rec.frame_count(), 1);
    }

    #[test]
    fn test_restored_chain_is_redrawn() {
        let mut e = Engine::new(&EngineConfig {
            seed: Some(1),
            skip_unchanged_frames: true,
            ..EngineConfig::default()
        });
        let rec = RecordingSurface::new();
        e.register_surface("p", ChainId::Spatial, RendererKind::PhaseCorrelation, Box::new(rec.clone()), 100.0, 100.0, 1.0)
            .unwrap();
        e.start();
        e.set_parameter(ChainId::Spatial, ModuleId::PhaseCorrection, "rotation", ParamValue::Number(90.0))
            .unwrap();
        e.frame(0.016);
        let at_90 = rec.last_list();

        e.restore_chain(ChainId::Spatial);
        e.set_parameter(ChainId::Spatial, ModuleId::PhaseCorrection, "rotation", ParamValue::Number(180.0))
            .unwrap();
        assert!(matches!(e.frame(0.016), FrameOutcome::Continue(r) if r.rendered == 1 && r.unchanged == 0));
        assert_eq!(rec.frame_count(), 2);
        assert_ne!(rec.last_list(), at_90);
    }

    #[test]
    fn test_paused_engine_keeps_snapshots() {
        let mut e = engine();
        let before = e.snapshot(ChainId::Broadcast).unwrap().clone();
        e.advance(0.016);
        assert_eq!(e.snapshot(ChainId::Broadcast).unwrap(), &before);
        e.set_playing(true);
        e.advance(0.016);
        assert_eq!(e.snapshot(ChainId::Broadcast).unwrap().sequence, 1);
    }

    #[test]
    fn test_dispatch_mirrors_direct_calls() {
        let mut e = engine();
        let out = e
            .dispatch(EngineCommand::SetParameter {
                chain: ChainId::Broadcast,
                module: ModuleId::StereoEncoder,
                param: "stereo_width".to_string(),
                value: ParamValue::Number(500.0),
            })
            .unwrap();
        assert_eq!(out, CommandOutcome::Stored(ParamValue::Number(150.0)));

        e.dispatch(EngineCommand::SetAutoBalance { active: true }).unwrap();
        e.dispatch(EngineCommand::SetMixerLevel { channel: MIC, level: 60.0 }).unwrap();
        e.dispatch(EngineCommand::SetPlaying { playing: true }).unwrap();
        e.advance(0.016);
        assert_eq!(e.mixer().channels()[PROGRAM].fader, 25.0);
    }

    #[test]
    fn test_command_json() {
        let cmd: EngineCommand = serde_json::from_str(
            r#"{"command": "apply_preset", "chain": "spatial", "preset": "mono-safe"}"#,
        )
        .unwrap();
        let mut e = engine();
        let out = e.dispatch(cmd).unwrap();
        assert!(matches!(out, CommandOutcome::PresetApplied(ref t) if t.len() == 4));
    }
}
