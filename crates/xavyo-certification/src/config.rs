//! Engine configuration management.

use std::env;
use std::str::FromStr;

use crate::error::{CertificationError, Result};

const REMEDIATION_CONCURRENCY_VAR: &str = "XAVYO_CERT_REMEDIATION_CONCURRENCY";
const MAX_CASES_VAR: &str = "XAVYO_CERT_MAX_CASES";
const EVENT_CHANNEL_CAPACITY_VAR: &str = "XAVYO_CERT_EVENT_CHANNEL_CAPACITY";

/// Certification engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of remediation actions running at once.
    pub remediation_concurrency: usize,
    /// Upper bound on the grant population of a single campaign.
    pub max_cases_per_campaign: usize,
    /// Buffer size of the broadcast notification channel.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remediation_concurrency: 8,
            max_cases_per_campaign: 100_000,
            event_channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `XAVYO_CERT_REMEDIATION_CONCURRENCY`: parallel remediation actions (default: 8)
    /// - `XAVYO_CERT_MAX_CASES`: cases per campaign (default: 100000)
    /// - `XAVYO_CERT_EVENT_CHANNEL_CAPACITY`: notification buffer (default: 1024)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            remediation_concurrency: positive(
                REMEDIATION_CONCURRENCY_VAR,
                lookup(REMEDIATION_CONCURRENCY_VAR),
                defaults.remediation_concurrency,
            )?,
            max_cases_per_campaign: positive(
                MAX_CASES_VAR,
                lookup(MAX_CASES_VAR),
                defaults.max_cases_per_campaign,
            )?,
            event_channel_capacity: positive(
                EVENT_CHANNEL_CAPACITY_VAR,
                lookup(EVENT_CHANNEL_CAPACITY_VAR),
                defaults.event_channel_capacity,
            )?,
        })
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

fn positive(var: &str, value: Option<String>, default: usize) -> Result<usize> {
    let Some(value) = value else {
        return Ok(default);
    };
    let parsed = usize::from_str(value.trim()).map_err(|e| CertificationError::ConfigInvalid {
        var: var.to_string(),
        reason: format!("{value:?} is not a number: {e}"),
    })?;
    if parsed == 0 {
        return Err(CertificationError::ConfigInvalid {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

/// Builder for `EngineConfig`.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    remediation_concurrency: Option<usize>,
    max_cases_per_campaign: Option<usize>,
    event_channel_capacity: Option<usize>,
}

impl EngineConfigBuilder {
    /// Set remediation concurrency.
    #[must_use]
    pub fn remediation_concurrency(mut self, value: usize) -> Self {
        self.remediation_concurrency = Some(value);
        self
    }

    /// Set the per-campaign case cap.
    #[must_use]
    pub fn max_cases_per_campaign(mut self, value: usize) -> Self {
        self.max_cases_per_campaign = Some(value);
        self
    }

    /// Set the notification channel capacity.
    #[must_use]
    pub fn event_channel_capacity(mut self, value: usize) -> Self {
        self.event_channel_capacity = Some(value);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            remediation_concurrency: self
                .remediation_concurrency
                .unwrap_or(defaults.remediation_concurrency),
            max_cases_per_campaign: self
                .max_cases_per_campaign
                .unwrap_or(defaults.max_cases_per_campaign),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
        };

        for (var, value) in [
            ("remediation_concurrency", config.remediation_concurrency),
            ("max_cases_per_campaign", config.max_cases_per_campaign),
            ("event_channel_capacity", config.event_channel_capacity),
        ] {
            if value == 0 {
                return Err(CertificationError::ConfigInvalid {
                    var: var.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (REMEDIATION_CONCURRENCY_VAR, "2"),
            (MAX_CASES_VAR, " 50 "),
        ]))
        .unwrap();
        assert_eq!(config.remediation_concurrency, 2);
        assert_eq!(config.max_cases_per_campaign, 50);
        assert_eq!(config.event_channel_capacity, 1024);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = EngineConfig::from_lookup(lookup(&[(MAX_CASES_VAR, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            CertificationError::ConfigInvalid { ref var, .. } if var == MAX_CASES_VAR
        ));

        let err =
            EngineConfig::from_lookup(lookup(&[(EVENT_CHANNEL_CAPACITY_VAR, "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .remediation_concurrency(1)
            .max_cases_per_campaign(10)
            .build()
            .unwrap();
        assert_eq!(config.remediation_concurrency, 1);
        assert_eq!(config.max_cases_per_campaign, 10);
        assert!(EngineConfig::builder()
            .event_channel_capacity(0)
            .build()
            .is_err());
    }
}
