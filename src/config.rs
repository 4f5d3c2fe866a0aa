use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::snapshot::Priority;

/// Default share of AI-co-authored records for a contributor to count
/// toward AI breadth.
pub const DEFAULT_AI_THRESHOLD: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorityWeights {
    pub critical: f64,
    pub major: f64,
    pub normal: f64,
    pub minor: f64,
    pub undefined: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            critical: 8.0,
            major: 5.0,
            normal: 3.0,
            minor: 1.0,
            undefined: 0.0,
        }
    }
}

impl PriorityWeights {
    pub fn get(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::Major => self.major,
            Priority::Normal => self.normal,
            Priority::Minor => self.minor,
            Priority::Undefined => self.undefined,
        }
    }
}

/// Weight table for the composite contributor score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    /// Per authored record that is not merged (open or closed).
    pub open: f64,
    pub merged: f64,
    pub comment: f64,
    pub approval: f64,
    pub line_added: f64,
    pub line_deleted: f64,
    pub priority: PriorityWeights,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            open: 1.0,
            merged: 10.0,
            comment: 1.0,
            approval: 2.0,
            line_added: 0.05,
            line_deleted: 0.02,
            priority: PriorityWeights::default(),
        }
    }
}

/// Fully resolved configuration used by every computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Config {
    pub weights: Weights,
    /// Fraction in `[0, 1]`.
    pub ai_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            ai_threshold: DEFAULT_AI_THRESHOLD,
        }
    }
}

impl Config {
    /// Apply layers over the built-in defaults, lowest precedence first.
    pub fn resolve(layers: &[&ConfigLayer]) -> Self {
        let mut config = Config::default();
        for layer in layers {
            layer.apply(&mut config);
        }
        config
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PriorityLayer {
    pub critical: Option<Value>,
    pub major: Option<Value>,
    pub normal: Option<Value>,
    pub minor: Option<Value>,
    pub undefined: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightsLayer {
    pub open: Option<Value>,
    pub merged: Option<Value>,
    pub comment: Option<Value>,
    pub approval: Option<Value>,
    pub line_added: Option<Value>,
    pub line_deleted: Option<Value>,
    pub priority: PriorityLayer,
}

/// A partial configuration as found in a JSON file or user settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub weights: WeightsLayer,
    pub ai_threshold: Option<Value>,
}

impl ConfigLayer {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a layer from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Set one value by dotted key, e.g. `merged`, `priority.critical` or
    /// `ai_threshold`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let slot = self
            .slot_mut(key)
            .ok_or_else(|| Error::Config(format!("unknown setting: {key}")))?;
        *slot = Some(value);
        Ok(())
    }

    /// Parse and apply a `key=value` assignment.
    pub fn set_assignment(&mut self, assignment: &str) -> Result<()> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected key=value, got: {assignment}")))?;
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        self.set(key.trim(), value)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<Value>> {
        let w = &mut self.weights;
        let slot = match key.trim_start_matches("weights.") {
            "open" => &mut w.open,
            "merged" => &mut w.merged,
            "comment" => &mut w.comment,
            "approval" => &mut w.approval,
            "line_added" => &mut w.line_added,
            "line_deleted" => &mut w.line_deleted,
            "priority.critical" => &mut w.priority.critical,
            "priority.major" => &mut w.priority.major,
            "priority.normal" => &mut w.priority.normal,
            "priority.minor" => &mut w.priority.minor,
            "priority.undefined" => &mut w.priority.undefined,
            "ai_threshold" => &mut self.ai_threshold,
            _ => return None,
        };
        Some(slot)
    }

    fn apply(&self, config: &mut Config) {
        let w = &self.weights;
        let cw = &mut config.weights;
        overlay(&mut cw.open, &w.open);
        overlay(&mut cw.merged, &w.merged);
        overlay(&mut cw.comment, &w.comment);
        overlay(&mut cw.approval, &w.approval);
        overlay(&mut cw.line_added, &w.line_added);
        overlay(&mut cw.line_deleted, &w.line_deleted);
        overlay(&mut cw.priority.critical, &w.priority.critical);
        overlay(&mut cw.priority.major, &w.priority.major);
        overlay(&mut cw.priority.normal, &w.priority.normal);
        overlay(&mut cw.priority.minor, &w.priority.minor);
        overlay(&mut cw.priority.undefined, &w.priority.undefined);
        overlay(&mut config.ai_threshold, &self.ai_threshold);
        config.ai_threshold = config.ai_threshold.clamp(0.0, 1.0);
    }
}

fn overlay(target: &mut f64, value: &Option<Value>) {
    match value {
        None | Some(Value::Null) => {}
        Some(v) => *target = coerce(v),
    }
}

/// Numbers pass through, numeric strings are parsed, anything else is 0.
fn coerce(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => n,
        _ => {
            log::debug!("Non-numeric setting value {value}, using 0");
            0.0
        }
    }
}
