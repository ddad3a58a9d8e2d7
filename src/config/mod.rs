// src/config/mod.rs

use crate::domain::DomainTag;
use crate::error::ConfigError;
use crate::simulation::ViolationPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Everything a `RepairOrchestrator` needs to know, injected at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub domain: DomainTag,
    pub max_generation_attempts: usize,
    pub backoff_base_ms: u64,
    pub max_repair_attempts: usize,
    pub validator_path: Option<PathBuf>,
    pub validator_timeout_ms: u64,
    pub violation_policy: ViolationPolicy,
    pub auto_repair: bool,
    pub canonicalize: bool,
    /// Whether a layer that could not run counts toward overall validity.
    pub not_applicable_passes: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            domain: DomainTag::Blocksworld,
            max_generation_attempts: 3,
            backoff_base_ms: 1000,
            max_repair_attempts: 3,
            validator_path: None,
            validator_timeout_ms: 30_000,
            violation_policy: ViolationPolicy::ContinueAndApply,
            auto_repair: true,
            canonicalize: true,
            not_applicable_passes: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_generation_attempts(mut self, attempts: usize) -> Self {
        self.max_generation_attempts = attempts;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    pub fn with_repair_attempts(mut self, attempts: usize) -> Self {
        self.max_repair_attempts = attempts;
        self
    }

    pub fn with_validator(mut self, path: impl Into<PathBuf>) -> Self {
        self.validator_path = Some(path.into());
        self
    }

    pub fn with_validator_timeout(mut self, timeout: Duration) -> Self {
        self.validator_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_violation_policy(mut self, policy: ViolationPolicy) -> Self {
        self.violation_policy = policy;
        self
    }

    pub fn without_auto_repair(mut self) -> Self {
        self.auto_repair = false;
        self
    }

    pub fn without_canonicalization(mut self) -> Self {
        self.canonicalize = false;
        self
    }

    pub fn treat_not_applicable_as_failure(mut self) -> Self {
        self.not_applicable_passes = false;
        self
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn validator_timeout(&self) -> Duration {
        Duration::from_millis(self.validator_timeout_ms)
    }

    /// Delay before generation attempt `attempt + 1`: base × 2^(attempt + 1).
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt as u32 + 1);
        self.backoff_base().saturating_mul(factor)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Defaults overridden by `PLAN_DOMAIN`, `PLAN_MAX_GENERATION_ATTEMPTS`,
    /// `PLAN_MAX_REPAIR_ATTEMPTS`, `PLAN_BACKOFF_MS`, `VAL_PATH` and
    /// `VAL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(domain) = parsed::<DomainTag>(&lookup, "PLAN_DOMAIN")? {
            config.domain = domain;
        }
        if let Some(attempts) = parsed(&lookup, "PLAN_MAX_GENERATION_ATTEMPTS")? {
            config.max_generation_attempts = attempts;
        }
        if let Some(attempts) = parsed(&lookup, "PLAN_MAX_REPAIR_ATTEMPTS")? {
            config.max_repair_attempts = attempts;
        }
        if let Some(ms) = parsed(&lookup, "PLAN_BACKOFF_MS")? {
            config.backoff_base_ms = ms;
        }
        if let Some(path) = lookup("VAL_PATH").filter(|path| !path.trim().is_empty()) {
            config.validator_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = parsed::<u64>(&lookup, "VAL_TIMEOUT_SECS")? {
            config.validator_timeout_ms = secs.saturating_mul(1000);
        }

        Ok(config)
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidEnv {
                name,
                value,
                reason: err.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_generation_attempts, 3);
        assert_eq!(config.max_repair_attempts, 3);
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert_eq!(config.validator_timeout(), Duration::from_secs(30));
        assert!(config.auto_repair && config.canonicalize && config.not_applicable_passes);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = OrchestratorConfig::new().with_backoff_base(Duration::from_millis(10));
        assert_eq!(config.backoff_for(0), Duration::from_millis(20));
        assert_eq!(config.backoff_for(1), Duration::from_millis(40));
        assert_eq!(config.backoff_for(2), Duration::from_millis(80));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("PLAN_DOMAIN", "logistics"),
            ("PLAN_MAX_REPAIR_ATTEMPTS", "5"),
            ("VAL_PATH", "/opt/val/validate"),
            ("VAL_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.domain, DomainTag::Logistics);
        assert_eq!(config.max_repair_attempts, 5);
        assert_eq!(config.max_generation_attempts, 3);
        assert_eq!(config.validator_path, Some(PathBuf::from("/opt/val/validate")));
        assert_eq!(config.validator_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn bad_environment_values_are_named() {
        let error = OrchestratorConfig::from_lookup(lookup(&[("PLAN_BACKOFF_MS", "soon")]))
            .unwrap_err();
        assert!(error.to_string().contains("PLAN_BACKOFF_MS"));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            OrchestratorConfig::from_json(r#"{ "domain": "logistics", "auto_repair": false }"#)
                .unwrap();
        assert_eq!(config.domain, DomainTag::Logistics);
        assert!(!config.auto_repair);
        assert_eq!(config.max_repair_attempts, 3);
    }
}
