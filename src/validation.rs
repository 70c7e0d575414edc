//! Config Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: any error blocks generation, warnings are logged.

use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::dna::combination_space;
use crate::error::{GenerationError, Result};
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

impl ConfigViolation {
    fn error(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            severity: ViolationSeverity::Error,
            message: message.into(),
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    fn expected(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    fn remedy(mut self, remediation: &str) -> Self {
        self.remediation.push(remediation.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<ConfigViolation>,
    pub collection: String,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// Log warnings, fail with `Configuration` if any error is present.
    pub fn into_result(self) -> Result<()> {
        for v in self.violations.iter().filter(|v| v.severity != ViolationSeverity::Error) {
            warn!("config {}: {}", v.rule, v.message);
        }
        if !self.has_errors() {
            return Ok(());
        }
        let messages: Vec<_> = self
            .violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect();
        Err(GenerationError::Configuration(messages.join("; ")))
    }
}

/// Validation rule trait - produces violations
pub trait ConfigRule {
    fn name(&self) -> &'static str;
    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation>;
}

// --- Concrete Rules ---

pub struct TierTableRule;

impl ConfigRule for TierTableRule {
    fn name(&self) -> &'static str { "tier_table" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        let table = &config.rarity_weights;
        if table.is_empty() {
            return vec![ConfigViolation::error(self.name(), "Rarity weight table is empty")
                .remedy("Add at least one tier with a positive weight")];
        }

        let mut violations = vec![];
        if table.iter().all(|t| t.weight == 0) {
            violations.push(
                ConfigViolation::error(self.name(), "All rarity weights are zero")
                    .remedy("Give at least one tier a positive weight"),
            );
        }

        let mut seen = HashSet::new();
        for t in table {
            if !seen.insert(&t.tier) {
                violations.push(ConfigViolation::error(
                    self.name(),
                    format!("Tier '{}' listed more than once", t.tier),
                ));
            }
        }
        violations
    }
}

pub struct LayerRule;

impl ConfigRule for LayerRule {
    fn name(&self) -> &'static str { "layers" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        if config.layers.is_empty() {
            return vec![ConfigViolation::error(self.name(), "No layers configured")];
        }

        let mut violations = vec![];
        let mut names = HashSet::new();
        for layer in &config.layers {
            if !names.insert(layer.name.as_str()) {
                violations.push(ConfigViolation::error(
                    self.name(),
                    format!("Layer name '{}' is not unique", layer.name),
                ));
            }
            if layer.options.is_empty() {
                violations.push(
                    ConfigViolation::error(self.name(), format!("Layer '{}' has no options", layer.name))
                        .remedy("Add at least one option or remove the layer"),
                );
            }
        }
        violations
    }
}

/// Every drawable tier must find an option in every layer.
pub struct TierCoverageRule;

impl ConfigRule for TierCoverageRule {
    fn name(&self) -> &'static str { "tier_coverage" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        let mut violations = vec![];
        for tier in config.rarity_weights.iter().filter(|t| t.weight > 0) {
            for layer in &config.layers {
                if layer.eligible_options(&tier.tier).is_empty() {
                    violations.push(
                        ConfigViolation::error(
                            self.name(),
                            format!("Layer '{}' has no option for tier '{}'", layer.name, tier.tier),
                        )
                        .remedy("Give an option a positive weight for this tier"),
                    );
                }
            }
        }
        violations
    }
}

pub struct EditionRangeRule;

impl ConfigRule for EditionRangeRule {
    fn name(&self) -> &'static str { "edition_range" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        if config.start_edition > config.end_edition {
            vec![ConfigViolation::error(self.name(), "Edition range is inverted")
                .expected("startEdition <= endEdition", format!("{}..{}", config.start_edition, config.end_edition))]
        } else {
            vec![]
        }
    }
}

pub struct CanvasRule;

impl ConfigRule for CanvasRule {
    fn name(&self) -> &'static str { "canvas" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        if config.width == 0 || config.height == 0 {
            vec![ConfigViolation::error(self.name(), "Canvas has zero area")
                .expected("non-zero width and height", format!("{}x{}", config.width, config.height))]
        } else {
            vec![]
        }
    }
}

pub struct EngineVersionRule;

impl ConfigRule for EngineVersionRule {
    fn name(&self) -> &'static str { "engine_version" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        let Some(min) = &config.engine_min_version else {
            return vec![];
        };
        let (Ok(engine), Ok(required)) = (
            semver::Version::parse(ENGINE_VERSION),
            semver::Version::parse(min),
        ) else {
            return vec![ConfigViolation::error(self.name(), "Invalid engine min version")
                .expected("semver, e.g. 1.0.0", min.clone())];
        };

        if engine < required {
            vec![ConfigViolation::error(self.name(), "Config requires a newer engine")
                .expected(format!(">= {}", required), ENGINE_VERSION)]
        } else {
            vec![]
        }
    }
}

/// Warns when the run asks for more editions than all tiers can hold together.
pub struct CapacityRule;

impl ConfigRule for CapacityRule {
    fn name(&self) -> &'static str { "capacity" }

    fn validate(&self, config: &GenerationConfig) -> Vec<ConfigViolation> {
        let capacity: u128 = config
            .rarity_weights
            .iter()
            .filter(|t| t.weight > 0)
            .map(|t| combination_space(&config.layers, &t.tier))
            .fold(0u128, u128::saturating_add);
        let requested = u128::from(config.edition_count());

        if requested > capacity {
            vec![ConfigViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: "Requested editions exceed the combination space".to_string(),
                expected: Some(format!("<= {} editions", capacity)),
                actual: Some(format!("{} editions", requested)),
                remediation: vec!["Add layer options or reduce the edition range".to_string()],
            }]
        } else {
            vec![]
        }
    }
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ConfigRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(TierTableRule),
                Box::new(LayerRule),
                Box::new(TierCoverageRule),
                Box::new(EditionRangeRule),
                Box::new(CanvasRule),
                Box::new(EngineVersionRule),
                Box::new(CapacityRule),
            ],
        }
    }

    pub fn validate(&self, config: &GenerationConfig) -> ValidationReport {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(config))
            .collect();
        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);

        ValidationReport {
            valid,
            violations,
            collection: config.name.clone(),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
