//! Hoisting configuration.
//!
//! Controls which lowering rules run, what happens to a recognized call
//! whose operands do not fit its rule, and how the pipeline is assembled.
//!
//! # Presets
//!
//! | Preset | Rules | Use Case |
//! |--------|-------|----------|
//! | `default` | all 13 | maximum portability |
//! | `exact` | 9 | only lowerings that match the hardware bit for bit |

use crate::hoist::IntrinsicKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a recognized call whose operands do not fit its rule.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Stop with an error naming the call
    #[default]
    Abort,
    /// Leave the call in place, log a warning and keep scanning
    Skip,
}

/// Pipeline extension point. Passes run in stage order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    EarlyAsPossible,
    ModuleOptimizerEarly,
    ScalarOptimizerLate,
    OptimizerLast,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::EarlyAsPossible,
        Stage::ModuleOptimizerEarly,
        Stage::ScalarOptimizerLate,
        Stage::OptimizerLast,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::EarlyAsPossible => "early-as-possible",
            Stage::ModuleOptimizerEarly => "module-optimizer-early",
            Stage::ScalarOptimizerLate => "scalar-optimizer-late",
            Stage::OptimizerLast => "optimizer-last",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hoisting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct HoistConfig {
    /// Rules that are not applied; their calls are left untouched
    pub disabled: Vec<IntrinsicKind>,

    /// Handling of recognized calls with unexpected operands
    pub on_malformed: MalformedPolicy,

    /// Where the hoisting pass is registered
    pub stage: Stage,

    /// Remove declarations that no call references after lowering
    pub strip_dead_declarations: bool,

    /// Run the verifier at the end of the pipeline
    pub verify: bool,
}

impl Default for HoistConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            on_malformed: MalformedPolicy::Abort,
            stage: Stage::EarlyAsPossible,
            strip_dead_declarations: true,
            verify: true,
        }
    }
}

impl HoistConfig {
    /// Get a preset configuration by name.
    ///
    /// Available presets:
    /// - `"default"`: every rule enabled
    /// - `"exact"`: rules that diverge from the hardware on some inputs are disabled
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "exact" => Some(Self {
                disabled: IntrinsicKind::ALL
                    .into_iter()
                    .filter(|kind| kind.diverges_from_hardware())
                    .collect(),
                ..Self::default()
            }),
            _ => None,
        }
    }

    /// List available preset names.
    pub fn preset_names() -> &'static [&'static str] {
        &["default", "exact"]
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Is the rule for `kind` enabled?
    pub fn is_enabled(&self, kind: IntrinsicKind) -> bool {
        !self.disabled.contains(&kind)
    }

    /// Disable a rule. Disabling twice is a no-op.
    pub fn disable(&mut self, kind: IntrinsicKind) {
        if self.is_enabled(kind) {
            self.disabled.push(kind);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, kind) in self.disabled.iter().enumerate() {
            if self.disabled[..i].contains(kind) {
                return Err(ConfigError::DuplicateDisabled(*kind));
            }
        }
        Ok(())
    }

    /// Check for settings that are legal but probably unintended.
    pub fn check_warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for kind in IntrinsicKind::ALL {
            if kind.diverges_from_hardware() && self.is_enabled(kind) {
                warnings.push(ConfigWarning::InexactRule { kind });
            }
        }

        if IntrinsicKind::ALL.iter().all(|kind| !self.is_enabled(*kind)) {
            warnings.push(ConfigWarning::NothingEnabled);
        }

        if self.stage != Stage::EarlyAsPossible {
            warnings.push(ConfigWarning::LateStage { stage: self.stage });
        }

        warnings
    }
}

/// Warnings about configuration that may be unintended but is not invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A rule whose lowering differs from the hardware on some inputs is enabled
    InexactRule { kind: IntrinsicKind },
    /// Every rule is disabled
    NothingEnabled,
    /// Hoisting runs after optimizations that could have used the lowered form
    LateStage { stage: Stage },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InexactRule { kind } => {
                write!(f, "lowering of {} differs from the hardware on some inputs", kind.name())
            }
            Self::NothingEnabled => write!(f, "every lowering rule is disabled"),
            Self::LateStage { stage } => {
                write!(f, "hoisting registered at {}, earlier passes see the raw intrinsics", stage)
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("rule {0} is disabled more than once")]
    DuplicateDisabled(IntrinsicKind),

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Json(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HoistConfig::default();
        assert!(config.disabled.is_empty());
        assert_eq!(config.on_malformed, MalformedPolicy::Abort);
        assert_eq!(config.stage, Stage::EarlyAsPossible);
        assert!(config.strip_dead_declarations);
        assert!(config.verify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        for name in HoistConfig::preset_names() {
            assert!(HoistConfig::preset(name).is_some(), "missing preset {}", name);
        }
        assert_eq!(HoistConfig::preset("DEFAULT"), Some(HoistConfig::default()));
        assert!(HoistConfig::preset("fast").is_none());

        let exact = HoistConfig::preset("exact").unwrap();
        assert_eq!(exact.disabled.len(), 4);
        assert!(!exact.is_enabled(IntrinsicKind::PackUnsignedBytes));
        assert!(exact.is_enabled(IntrinsicKind::MinSignedWords));
        assert!(exact.check_warnings().is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = HoistConfig {
            disabled: vec![IntrinsicKind::Sqrt, IntrinsicKind::Sqrt],
            ..HoistConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateDisabled(IntrinsicKind::Sqrt))
        );

        let mut config = HoistConfig::default();
        config.disable(IntrinsicKind::Sqrt);
        config.disable(IntrinsicKind::Sqrt);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warnings() {
        let warnings = HoistConfig::default().check_warnings();
        assert_eq!(warnings.len(), 4);
        assert!(warnings
            .iter()
            .all(|w| matches!(w, ConfigWarning::InexactRule { .. })));

        let config = HoistConfig {
            disabled: IntrinsicKind::ALL.to_vec(),
            stage: Stage::OptimizerLast,
            ..HoistConfig::default()
        };
        let warnings = config.check_warnings();
        assert!(warnings.contains(&ConfigWarning::NothingEnabled));
        assert!(warnings.contains(&ConfigWarning::LateStage { stage: Stage::OptimizerLast }));
    }

    #[test]
    fn test_from_json() {
        let config = HoistConfig::from_json(
            r#"{ "disabled": ["sum-abs-diff"], "on-malformed": "skip", "stage": "optimizer-last" }"#,
        )
        .unwrap();
        assert_eq!(config.disabled, vec![IntrinsicKind::SumAbsDiff]);
        assert_eq!(config.on_malformed, MalformedPolicy::Skip);
        assert_eq!(config.stage, Stage::OptimizerLast);
        assert!(config.verify);

        assert!(matches!(
            HoistConfig::from_json(r#"{ "disabled": ["psadbw"] }"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            HoistConfig::from_json(r#"{ "disabled": ["sqrt", "sqrt"] }"#),
            Err(ConfigError::DuplicateDisabled(IntrinsicKind::Sqrt))
        ));
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::EarlyAsPossible < Stage::OptimizerLast);
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
    }
}
