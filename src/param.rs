//! Parameter domains and values.
//!
//! Every parameter a processing module stores is declared by a [`ParamSpec`]
//! carrying its domain (numeric range with a step grid, a closed set
//! of choices, a toggle, or a nested group of further specs), the default,
//! and the rule deciding when a UI may edit it. Validation lives here so the
//! module, the preset engine and the command layer all agree on it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::registry::ModuleId;

/// Values closer than this fraction of a step to the grid count as on-grid
/// and are stored exactly as given.
const STEP_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Toggle(bool),
    Number(f32),
    Choice(String),
    Group(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Choice(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_toggle(&self) -> Option<bool> {
        match self {
            ParamValue::Toggle(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Group(v) => Some(v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Toggle(_) => "toggle",
            ParamValue::Number(_) => "number",
            ParamValue::Choice(_) => "choice",
            ParamValue::Group(_) => "group",
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Toggle(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Choice(v.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Toggle(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Choice(v) => write!(f, "{}", v),
            ParamValue::Group(map) => {
                let parts = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDomain {
    Range {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
    Toggle {
        default: bool,
    },
    Group(&'static [ParamSpec]),
}

/// When a UI may offer a parameter for editing. The stored value is kept
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditRule {
    Always,
    ChoiceIsNot {
        param: &'static str,
        value: &'static str,
    },
    ToggleIs {
        param: &'static str,
        value: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub domain: ParamDomain,
    pub edit: EditRule,
}

impl ParamSpec {
    pub const fn range(
        name: &'static str,
        label: &'static str,
        unit: &'static str,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    ) -> Self {
        ParamSpec {
            name,
            label,
            unit,
            domain: ParamDomain::Range { min, max, step, default },
            edit: EditRule::Always,
        }
    }

    pub const fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        ParamSpec {
            name,
            label,
            unit: "",
            domain: ParamDomain::Choice { options, default },
            edit: EditRule::Always,
        }
    }

    pub const fn toggle(name: &'static str, label: &'static str, default: bool) -> Self {
        ParamSpec {
            name,
            label,
            unit: "",
            domain: ParamDomain::Toggle { default },
            edit: EditRule::Always,
        }
    }

    pub const fn group(name: &'static str, label: &'static str, children: &'static [ParamSpec]) -> Self {
        ParamSpec {
            name,
            label,
            unit: "",
            domain: ParamDomain::Group(children),
            edit: EditRule::Always,
        }
    }

    pub const fn editable_when(mut self, rule: EditRule) -> Self {
        self.edit = rule;
        self
    }

    pub fn default_value(&self) -> ParamValue {
        match self.domain {
            ParamDomain::Range { default, .. } => ParamValue::Number(default),
            ParamDomain::Choice { default, .. } => ParamValue::Choice(default.to_string()),
            ParamDomain::Toggle { default } => ParamValue::Toggle(default),
            ParamDomain::Group(children) => ParamValue::Group(
                children
                    .iter()
                    .map(|c| (c.name.to_string(), c.default_value()))
                    .collect(),
            ),
        }
    }

    pub fn child(&self, name: &str) -> Option<&'static ParamSpec> {
        match self.domain {
            ParamDomain::Group(children) => children.iter().find(|c| c.name == name),
            _ => None,
        }
    }

    /// Checks `value` against the domain and returns what would be stored.
    ///
    /// Numbers are clamped and snapped; choices outside the set, type
    /// mismatches and non-finite numbers are rejected. For groups the
    /// supplied leaves are merged over `current`.
    pub fn validate(
        &self,
        module: ModuleId,
        path: &str,
        current: Option<&ParamValue>,
        value: ParamValue,
    ) -> ChainResult<ParamValue> {
        match (self.domain, value) {
            (ParamDomain::Range { min, max, step, .. }, ParamValue::Number(v)) => {
                if !v.is_finite() {
                    return Err(ChainError::invalid(module, path, "value is not a finite number"));
                }
                Ok(ParamValue::Number(fit_to_grid(v, min, max, step)))
            }
            (ParamDomain::Choice { options, .. }, ParamValue::Choice(v)) => {
                if options.contains(&v.as_str()) {
                    Ok(ParamValue::Choice(v))
                } else {
                    Err(ChainError::invalid(
                        module,
                        path,
                        format!("'{}' is not one of {}", v, options.join(", ")),
                    ))
                }
            }
            // Numeric choice sets (bitrates) accept a bare number from JSON.
            (ParamDomain::Choice { options, .. }, ParamValue::Number(v)) => {
                let label = if v.fract() == 0.0 { format!("{}", v as i64) } else { format!("{}", v) };
                match options.iter().find(|o| **o == label) {
                    Some(o) => Ok(ParamValue::Choice(o.to_string())),
                    None => Err(ChainError::invalid(
                        module,
                        path,
                        format!("{} is not one of {}", v, options.join(", ")),
                    )),
                }
            }
            (ParamDomain::Toggle { .. }, ParamValue::Toggle(v)) => Ok(ParamValue::Toggle(v)),
            (ParamDomain::Group(children), ParamValue::Group(incoming)) => {
                let mut merged = match current {
                    Some(ParamValue::Group(map)) => map.clone(),
                    _ => match self.default_value() {
                        ParamValue::Group(map) => map,
                        _ => BTreeMap::new(),
                    },
                };
                for (leaf, v) in incoming {
                    let leaf_path = format!("{}.{}", path, leaf);
                    let spec = children
                        .iter()
                        .find(|c| c.name == leaf)
                        .ok_or_else(|| ChainError::invalid(module, &leaf_path, "unknown parameter"))?;
                    let stored = spec.validate(module, &leaf_path, merged.get(&leaf), v)?;
                    merged.insert(leaf, stored);
                }
                Ok(ParamValue::Group(merged))
            }
            (domain, value) => Err(ChainError::invalid(
                module,
                path,
                format!("expected {}, got {}", domain_kind(&domain), value.kind()),
            )),
        }
    }
}

fn domain_kind(domain: &ParamDomain) -> &'static str {
    match domain {
        ParamDomain::Range { .. } => "number",
        ParamDomain::Choice { .. } => "choice",
        ParamDomain::Toggle { .. } => "toggle",
        ParamDomain::Group(_) => "group",
    }
}

/// Clamps to `[min, max]` and snaps off-grid values to the nearest step.
pub fn fit_to_grid(value: f32, min: f32, max: f32, step: f32) -> f32 {
    let clamped = value.clamp(min, max);
    if step <= 0.0 {
        return clamped;
    }
    let steps = (clamped - min) / step;
    let nearest = steps.round();
    if (steps - nearest).abs() <= STEP_TOLERANCE {
        return clamped;
    }
    (min + nearest * step).clamp(min, max)
}
