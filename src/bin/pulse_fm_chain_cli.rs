use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use pulse_fm_chain::config::EngineConfig;
use pulse_fm_chain::logging::init_logging;
use pulse_fm_chain::preset::PresetLibrary;
use pulse_fm_chain::render::RendererKind;
use pulse_fm_chain::scheduler::RecordingSurface;
use pulse_fm_chain::{ChainId, Engine, ModuleId, ParamValue};

/// Drive the processing model headless and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "pulse-fm-chain-cli", version)]
struct Cli {
    /// Engine config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Chain to operate on: broadcast or spatial
    #[arg(long, default_value = "broadcast")]
    chain: ChainId,
    /// Preset id to apply before ticking
    #[arg(long)]
    preset: Option<String>,
    /// Extra preset library (JSON array) merged over the built-ins
    #[arg(long)]
    presets: Option<PathBuf>,
    /// Parameter write, `module.param=value` (repeatable)
    #[arg(long = "set", value_name = "MODULE.PARAM=VALUE")]
    set: Vec<String>,
    /// Switch a module off (repeatable)
    #[arg(long = "disable", value_name = "MODULE")]
    disable: Vec<ModuleId>,
    /// Switch a module on (repeatable)
    #[arg(long = "enable", value_name = "MODULE")]
    enable: Vec<ModuleId>,
    /// Turn the whole chain off
    #[arg(long)]
    chain_off: bool,
    /// Simulator ticks to run while playing
    #[arg(long, default_value_t = 0)]
    ticks: u32,
    /// Seconds per tick
    #[arg(long, default_value_t = 0.016)]
    dt: f32,
    /// RNG seed, overrides the config
    #[arg(long)]
    seed: Option<u64>,
    /// Render one frame with this renderer and include its display list
    #[arg(long)]
    render: Option<RendererKind>,
    #[arg(long, default_value_t = 640.0)]
    width: f32,
    #[arg(long, default_value_t = 360.0)]
    height: f32,
    /// Device scale factor for the backing store
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
    /// List presets for the chain and exit
    #[arg(long)]
    list_presets: bool,
    #[arg(long)]
    log_level: Option<String>,
}

/// `stereo_encoder.stereo_width=110` or `rds_encoder.group_mix.g2a=3`.
fn parse_set(raw: &str) -> Result<(ModuleId, String, ParamValue)> {
    let (lhs, rhs) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected MODULE.PARAM=VALUE, got '{}'", raw))?;
    let (module, param) = lhs
        .split_once('.')
        .ok_or_else(|| anyhow!("expected MODULE.PARAM, got '{}'", lhs))?;
    let module = module.parse::<ModuleId>().map_err(|e| anyhow!(e))?;
    let value = serde_json::from_str::<ParamValue>(rhs.trim())
        .unwrap_or_else(|_| ParamValue::Choice(rhs.trim().to_string()));
    Ok((module, param.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    init_logging(cli.log_level.as_deref().or(config.log_level.as_deref()));

    let mut engine = Engine::new(&config);
    if let Some(path) = &cli.presets {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading presets {}", path.display()))?;
        engine.load_presets(PresetLibrary::from_json(&data)?);
    }

    let chain = cli.chain;
    if cli.list_presets {
        let list: Vec<_> = engine
            .presets()
            .for_chain(chain)
            .map(|p| json!({ "id": p.id, "name": p.name, "description": p.description }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let mut touched = Vec::new();
    if let Some(id) = &cli.preset {
        touched = engine.apply_preset(chain, id)?;
    }
    for module in &cli.enable {
        engine.set_module_enabled(chain, *module, true)?;
    }
    for module in &cli.disable {
        engine.set_module_enabled(chain, *module, false)?;
    }
    let mut stored = Vec::new();
    for raw in &cli.set {
        let (module, param, value) = parse_set(raw)?;
        let v = engine.set_parameter(chain, module, &param, value)?;
        stored.push(json!({ "module": module, "param": param, "stored": v }));
    }
    if cli.chain_off {
        engine.set_chain_enabled(chain, false)?;
    }

    engine.set_playing(cli.ticks > 0);
    for _ in 0..cli.ticks {
        engine.advance(cli.dt);
    }
    engine.set_playing(false);
    info!(ticks = cli.ticks, "simulation done");

    let render = match cli.render {
        Some(kind) => {
            let surface = RecordingSurface::new();
            engine.register_surface("cli", chain, kind, Box::new(surface.clone()), cli.width, cli.height, cli.scale)?;
            engine.start();
            let outcome = engine.frame(0.0);
            engine.stop();
            let list = surface.last_list();
            Some(json!({
                "kind": kind,
                "backing": surface.last_frame_size(),
                "outcome": outcome,
                "commands": list.len(),
                "display_list": list,
            }))
        }
        None => None,
    };

    let snapshot = engine.snapshot(chain)?;
    let out = json!({
        "chain": engine.chain(chain)?,
        "preset_touched": touched,
        "writes": stored,
        "snapshot": {
            "left": snapshot.left,
            "right": snapshot.right,
            "mono": snapshot.mono,
            "difference": snapshot.difference,
            "composite": snapshot.composite,
            "pilot": snapshot.pilot,
            "rds": snapshot.rds,
            "hd": snapshot.hd,
            "correlation": snapshot.correlation,
            "sequence": snapshot.sequence,
            "elapsed": snapshot.elapsed,
        },
        "mixer": engine.mixer(),
        "render": render,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
