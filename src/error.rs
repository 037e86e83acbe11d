use thiserror::Error;

use crate::registry::{ChainId, ModuleId};

/// Everything that can go wrong when the UI drives the processing model.
///
/// None of these are fatal: the engine stays usable after any of them and
/// the caller decides whether to re-prompt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("invalid value for {module}.{param}: {reason}")]
    InvalidParameter {
        module: ModuleId,
        param: String,
        reason: String,
    },

    #[error("module {module} is not part of the {chain} chain")]
    UnknownModule { chain: ChainId, module: ModuleId },

    #[error("no preset named {preset} for the {chain} chain")]
    UnknownPreset { chain: ChainId, preset: String },

    #[error("{0} chain is unavailable")]
    ChainUnavailable(ChainId),

    #[error("surface {0} is unavailable")]
    SurfaceUnavailable(String),
}

impl ChainError {
    pub(crate) fn invalid(module: ModuleId, param: &str, reason: impl Into<String>) -> Self {
        ChainError::InvalidParameter {
            module,
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
