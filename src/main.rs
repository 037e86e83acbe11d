mod app;

use app::App;
use iced::Application;
use tracing::{info, warn};

use pulse_fm_chain::config::EngineConfig;
use pulse_fm_chain::logging::init_logging;

fn main() -> iced::Result {
    let (config, load_error) = match EngineConfig::load_default() {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };
    init_logging(config.log_level.as_deref());
    if let Some(e) = load_error {
        warn!("config ignored: {:#}", e);
    }
    info!("Pulse FM processing chain");
    info!("CLI: cargo run --bin pulse-fm-chain-cli -- --help");
    App::run(iced::Settings::with_flags(config))
}
