//! Engine configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use mfgops_core::error::CoreError;

/// What to do when a recipient has no preference row for a (type, channel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingPreferencePolicy {
    /// Skip the pair.
    #[default]
    Deny,
    /// Seed the default preference matrix for the user, then re-check.
    SeedDefaults,
}

impl FromStr for MissingPreferencePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(Self::Deny),
            "seed_defaults" => Ok(Self::SeedDefaults),
            other => Err(CoreError::Validation(format!(
                "Unknown missing-preference policy '{other}'. Valid values: deny, seed_defaults"
            ))),
        }
    }
}

/// Tuning knobs for dispatch and maintenance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of (recipient, channel) pairs processed at once.
    pub dispatch_concurrency: usize,
    /// Upper bound on a single channel send.
    pub send_timeout: Duration,
    pub missing_preference_policy: MissingPreferencePolicy,
    /// HMAC key for unsubscribe tokens.
    pub unsubscribe_secret: Vec<u8>,
    /// Period of the dispatch-due / retry / expire loop.
    pub sweep_interval: Duration,
    /// Period of the retention loop.
    pub retention_interval: Duration,
    /// Age after which read in-app records are deleted.
    pub retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_concurrency: 16,
            send_timeout: Duration::from_secs(10),
            missing_preference_policy: MissingPreferencePolicy::Deny,
            unsubscribe_secret: b"dev-unsubscribe-secret".to_vec(),
            sweep_interval: Duration::from_secs(60),
            retention_interval: Duration::from_secs(86_400),
            retention_days: 30,
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                         | Default  |
    /// |----------------------------------|----------|
    /// | `DISPATCH_CONCURRENCY`           | `16`     |
    /// | `CHANNEL_SEND_TIMEOUT_SECS`      | `10`     |
    /// | `MISSING_PREFERENCE_POLICY`      | `deny`   |
    /// | `UNSUBSCRIBE_SECRET`             | dev key  |
    /// | `SWEEP_INTERVAL_SECS`            | `60`     |
    /// | `RETENTION_SWEEP_INTERVAL_SECS`  | `86400`  |
    /// | `NOTIFICATION_RETENTION_DAYS`    | `30`     |
    ///
    /// An unparseable `MISSING_PREFERENCE_POLICY` is a startup error.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let missing_preference_policy = match std::env::var("MISSING_PREFERENCE_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.missing_preference_policy,
        };

        let unsubscribe_secret = match std::env::var("UNSUBSCRIBE_SECRET") {
            Ok(v) if !v.is_empty() => v.into_bytes(),
            _ => {
                tracing::warn!("UNSUBSCRIBE_SECRET not set, using the development key");
                defaults.unsubscribe_secret
            }
        };

        Ok(Self {
            dispatch_concurrency: env_parse("DISPATCH_CONCURRENCY", defaults.dispatch_concurrency).max(1),
            send_timeout: Duration::from_secs(env_parse::<u64>("CHANNEL_SEND_TIMEOUT_SECS", 10)),
            missing_preference_policy,
            unsubscribe_secret,
            sweep_interval: Duration::from_secs(env_parse::<u64>("SWEEP_INTERVAL_SECS", 60).max(1)),
            retention_interval: Duration::from_secs(
                env_parse::<u64>("RETENTION_SWEEP_INTERVAL_SECS", 86_400).max(1),
            ),
            retention_days: env_parse("NOTIFICATION_RETENTION_DAYS", defaults.retention_days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("DENY".parse::<MissingPreferencePolicy>().unwrap(), MissingPreferencePolicy::Deny);
        assert_eq!(
            "seed_defaults".parse::<MissingPreferencePolicy>().unwrap(),
            MissingPreferencePolicy::SeedDefaults
        );
        assert!("allow".parse::<MissingPreferencePolicy>().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = EngineConfig::default();
        assert_eq!(c.dispatch_concurrency, 16);
        assert_eq!(c.send_timeout, Duration::from_secs(10));
        assert_eq!(c.retention_days, 30);
        assert_eq!(c.missing_preference_policy, MissingPreferencePolicy::Deny);
    }
}
