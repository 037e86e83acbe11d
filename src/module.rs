use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ChainError, ChainResult};
use crate::param::{EditRule, ParamSpec, ParamValue};
use crate::registry::ModuleId;

/// One stage of a processing chain.
///
/// Parameter storage is independent of both the module's `enabled` flag and
/// UI editability: a disabled module keeps every value it was given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingModule {
    id: ModuleId,
    enabled: bool,
    params: BTreeMap<&'static str, ParamValue>,
    revision: u64,
}

/// A validated write that has not been applied yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWrite {
    module: ModuleId,
    name: &'static str,
    path: String,
    value: ParamValue,
}

impl StagedWrite {
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }
}

impl ProcessingModule {
    pub fn new(id: ModuleId) -> Self {
        let params = id
            .specs()
            .iter()
            .map(|spec| (spec.name, spec.default_value()))
            .collect();
        ProcessingModule {
            id,
            enabled: id.enabled_by_default(),
            params,
            revision: 0,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn params(&self) -> &BTreeMap<&'static str, ParamValue> {
        &self.params
    }

    /// Looks up a stored value by dotted path (`group_mix.g2a`).
    pub fn param(&self, path: &str) -> Option<&ParamValue> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let mut value = self.params.get(head)?;
        for leaf in parts {
            value = value.as_group()?.get(leaf)?;
        }
        Some(value)
    }

    /// Numeric value at `path`, falling back to the declared default.
    pub fn number(&self, path: &str) -> f32 {
        self.param(path)
            .and_then(ParamValue::as_number)
            .or_else(|| self.spec(path).and_then(|s| s.default_value().as_number()))
            .unwrap_or(0.0)
    }

    pub fn choice(&self, path: &str) -> &str {
        self.param(path).and_then(ParamValue::as_choice).unwrap_or("")
    }

    pub fn toggle(&self, path: &str) -> bool {
        self.param(path).and_then(ParamValue::as_toggle).unwrap_or(false)
    }

    pub fn spec(&self, path: &str) -> Option<&'static ParamSpec> {
        let mut parts = path.split('.');
        let mut spec = self.id.spec(parts.next()?)?;
        for leaf in parts {
            spec = spec.child(leaf)?;
        }
        Some(spec)
    }

    /// Whether a UI should currently offer `path` for editing. Nested leaves
    /// follow the rule of their top-level parameter.
    pub fn is_editable(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(spec) = path.split('.').next().and_then(|head| self.id.spec(head)) else {
            return false;
        };
        match spec.edit {
            EditRule::Always => true,
            EditRule::ChoiceIsNot { param, value } => self.choice(param) != value,
            EditRule::ToggleIs { param, value } => self.toggle(param) == value,
        }
    }

    /// Validates a write against the parameter's domain without applying it.
    pub fn stage(&self, path: &str, value: ParamValue) -> ChainResult<StagedWrite> {
        let mut parts = path.splitn(2, '.');
        let head = parts.next().unwrap_or("");
        let spec = self
            .id
            .spec(head)
            .ok_or_else(|| ChainError::invalid(self.id, path, "unknown parameter"))?;

        // A leaf write is staged as a one-leaf merge into its group.
        let (name, value) = match parts.next() {
            None => (spec.name, value),
            Some(rest) => {
                let mut nested = value;
                for leaf in rest.rsplit('.') {
                    let mut map = BTreeMap::new();
                    map.insert(leaf.to_string(), nested);
                    nested = ParamValue::Group(map);
                }
                (spec.name, nested)
            }
        };

        let stored = spec.validate(self.id, name, self.params.get(name), value)?;
        Ok(StagedWrite {
            module: self.id,
            name,
            path: path.to_string(),
            value: stored,
        })
    }

    /// Applies a write produced by [`ProcessingModule::stage`].
    pub fn commit(&mut self, write: StagedWrite) -> ParamValue {
        debug!(module = %self.id, param = %write.path, value = %write.value, "parameter stored");
        let stored = write.value.clone();
        self.params.insert(write.name, write.value);
        self.revision += 1;
        stored
    }

    pub fn set_parameter(&mut self, path: &str, value: ParamValue) -> ChainResult<ParamValue> {
        match self.stage(path, value) {
            Ok(write) => Ok(self.commit(write)),
            Err(e) => {
                warn!("{}", e);
                Err(e)
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.revision += 1;
        }
    }
}
