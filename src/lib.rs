//! Parameter model, signal simulation and visualization engine for a
//! broadcast (FM/HD/DAB+) processing chain and a stereo/spatial chain.

pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mixer;
pub mod module;
pub mod param;
pub mod preset;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod simulator;

pub use chain::{ProcessingChain, VisualizationTab};
pub use config::EngineConfig;
pub use engine::{CommandOutcome, Engine, EngineCommand, FrameOutcome};
pub use error::{ChainError, ChainResult};
pub use param::ParamValue;
pub use registry::{ChainId, ModuleId};
pub use render::{DisplayList, DrawCommand, RendererKind, SurfaceSize};
