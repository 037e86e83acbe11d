use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::module::ProcessingModule;
use crate::registry::{ChainId, ModuleId};
use crate::render::RendererKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationTab {
    Spectrum,
    Meters,
    Vectorscope,
    Phase,
    StereoField,
}

impl fmt::Display for VisualizationTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisualizationTab::Spectrum => write!(f, "Spectrum"),
            VisualizationTab::Meters => write!(f, "Meters"),
            VisualizationTab::Vectorscope => write!(f, "Vectorscope"),
            VisualizationTab::Phase => write!(f, "Phase"),
            VisualizationTab::StereoField => write!(f, "Stereo Field"),
        }
    }
}

impl VisualizationTab {
    pub fn renderer(&self) -> RendererKind {
        match self {
            VisualizationTab::Spectrum => RendererKind::Spectrum,
            VisualizationTab::Meters => RendererKind::LevelMeters,
            VisualizationTab::Vectorscope => RendererKind::Vectorscope,
            VisualizationTab::Phase => RendererKind::PhaseCorrelation,
            VisualizationTab::StereoField => RendererKind::StereoField,
        }
    }
}

/// Tabs a chain offers, first one is the default.
pub fn tabs_for(chain: ChainId) -> &'static [VisualizationTab] {
    match chain {
        ChainId::Broadcast => &[
            VisualizationTab::Spectrum,
            VisualizationTab::Meters,
            VisualizationTab::Vectorscope,
        ],
        ChainId::Spatial => &[
            VisualizationTab::Vectorscope,
            VisualizationTab::Phase,
            VisualizationTab::StereoField,
            VisualizationTab::Meters,
        ],
    }
}

/// An ordered set of modules behind one master switch.
///
/// Module `enabled` flags are independent of the chain flag; turning the
/// chain off freezes the simulated signal but leaves every module as it was.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingChain {
    id: ChainId,
    enabled: bool,
    modules: Vec<ProcessingModule>,
    active_tab: VisualizationTab,
    revision: u64,
}

impl ProcessingChain {
    pub fn new(id: ChainId) -> Self {
        ProcessingChain {
            id,
            enabled: true,
            modules: id.modules().iter().map(|m| ProcessingModule::new(*m)).collect(),
            active_tab: tabs_for(id)[0],
            revision: 0,
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn modules(&self) -> &[ProcessingModule] {
        &self.modules
    }

    pub fn active_tab(&self) -> VisualizationTab {
        self.active_tab
    }

    pub fn module(&self, id: ModuleId) -> Option<&ProcessingModule> {
        self.modules.iter().find(|m| m.id() == id)
    }

    /// The module if it is part of this chain and switched on.
    pub fn active_module(&self, id: ModuleId) -> Option<&ProcessingModule> {
        self.module(id).filter(|m| m.enabled())
    }

    pub fn module_mut(&mut self, id: ModuleId) -> ChainResult<&mut ProcessingModule> {
        let chain = self.id;
        self.modules
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(ChainError::UnknownModule { chain, module: id })
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.revision += 1;
        }
    }

    pub fn set_active_tab(&mut self, tab: VisualizationTab) -> ChainResult<()> {
        if !tabs_for(self.id).contains(&tab) {
            return Err(ChainError::InvalidParameter {
                module: self.id.modules()[0],
                param: "active_tab".to_string(),
                reason: format!("{} is not offered by the {} chain", tab, self.id),
            });
        }
        if self.active_tab != tab {
            self.active_tab = tab;
            self.revision += 1;
        }
        Ok(())
    }

    /// Sum of the chain's own and all module revisions. Changes whenever
    /// anything a renderer reads from the chain changes.
    pub fn revision(&self) -> u64 {
        self.revision + self.modules.iter().map(|m| m.revision()).sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;

    #[test]
    fn test_chain_layout() {
        let chain = ProcessingChain::new(ChainId::Broadcast);
        assert!(chain.enabled());
        assert_eq!(chain.modules().len(), 6);
        assert_eq!(chain.modules()[0].id(), ModuleId::PreEmphasis);
        assert_eq!(chain.active_tab(), VisualizationTab::Spectrum);
        assert!(chain.active_module(ModuleId::HdRadio).is_none());
        assert!(chain.module(ModuleId::HdRadio).is_some());
    }

    #[test]
    fn test_foreign_module_rejected() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        assert_eq!(
            chain.module_mut(ModuleId::RdsEncoder).unwrap_err(),
            ChainError::UnknownModule {
                chain: ChainId::Spatial,
                module: ModuleId::RdsEncoder
            }
        );
    }

    #[test]
    fn test_chain_flag_does_not_touch_modules() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        chain.set_enabled(false);
        assert!(chain.modules().iter().all(|m| m.enabled()));
    }

    #[test]
    fn test_revision_tracks_module_writes() {
        let mut chain = ProcessingChain::new(ChainId::Spatial);
        let before = chain.revision();
        chain
            .module_mut(ModuleId::Panning)
            .unwrap()
            .set_parameter("position", ParamValue::Number(20.0))
            .unwrap();
        assert!(chain.revision() > before);
    }

    #[test]
    fn test_tab_must_be_offered() {
        let mut chain = ProcessingChain::new(ChainId::Broadcast);
        assert!(chain.set_active_tab(VisualizationTab::Phase).is_err());
        chain.set_active_tab(VisualizationTab::Meters).unwrap();
        assert_eq!(chain.active_tab(), VisualizationTab::Meters);
    }
}
