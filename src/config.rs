//! Tunables for the resolver, cache, audit trail and batch verification.

use std::env::VarError;
use std::time::Duration;

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::batch::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_TIMEOUT};
use crate::error::{Error, Result};
use crate::memory_cache::DEFAULT_CACHE_TTL;
use crate::resolver::DEFAULT_STORE_TIMEOUT;
use crate::sink::DEFAULT_AUDIT_QUEUE_CAPACITY;

const ENV_PREFIX: &str = "SESSION_ROLE_";

/// Runtime configuration.
///
/// Every field has a default; [`Config::from_env`] overrides individual
/// fields from `SESSION_ROLE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Maximum age of a cached role.
    #[cfg_attr(feature = "serde", serde(with = "secs", rename = "cache_ttl_secs"))]
    pub cache_ttl: Duration,
    /// Number of entries kept in the in-memory audit log.
    pub audit_capacity: usize,
    /// Deadline for a single store fetch.
    #[cfg_attr(feature = "serde", serde(with = "millis", rename = "store_timeout_ms"))]
    pub store_timeout: Duration,
    /// Deadline for each id of a batch verification.
    #[cfg_attr(feature = "serde", serde(with = "millis", rename = "batch_timeout_ms"))]
    pub batch_timeout: Duration,
    /// Maximum number of concurrent resolutions within one batch.
    pub batch_concurrency: usize,
    /// Number of audit events buffered ahead of the sink.
    pub audit_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            audit_queue_capacity: DEFAULT_AUDIT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// A variable holding non-unicode bytes is rejected rather than ignored.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env_value(key, std::env::var(key)))
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Keys are the `SESSION_ROLE_*` variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(|key| Ok(lookup(key)))
    }

    fn load<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let mut config = Self::default();
        let read = |name: &str| -> Result<Option<u64>> {
            let key = format!("{ENV_PREFIX}{name}");
            match lookup(&key)? {
                None => Ok(None),
                Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|err| {
                    Error::InvalidConfig(format!("{key}={raw:?}: {err}"))
                }),
            }
        };

        if let Some(secs) = read("CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = read("AUDIT_CAPACITY")? {
            config.audit_capacity = to_usize(capacity)?;
        }
        if let Some(ms) = read("STORE_TIMEOUT_MS")? {
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = read("BATCH_TIMEOUT_MS")? {
            config.batch_timeout = Duration::from_millis(ms);
        }
        if let Some(concurrency) = read("BATCH_CONCURRENCY")? {
            config.batch_concurrency = to_usize(concurrency)?;
        }
        if let Some(capacity) = read("AUDIT_QUEUE_CAPACITY")? {
            config.audit_queue_capacity = to_usize(capacity)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.audit_capacity == 0 {
            return Err(Error::InvalidConfig("audit_capacity must be > 0".to_string()));
        }
        if self.batch_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "batch_concurrency must be > 0".to_string(),
            ));
        }
        if self.audit_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "audit_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.store_timeout.is_zero() || self.batch_timeout.is_zero() {
            return Err(Error::InvalidConfig("timeouts must be > 0".to_string()));
        }
        Ok(())
    }
}

fn env_value(key: &str, value: std::result::Result<String, VarError>) -> Result<Option<String>> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(Error::InvalidConfig(format!(
            "{key}={raw:?} is not valid unicode"
        ))),
    }
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|err| Error::InvalidConfig(err.to_string()))
}

#[cfg(feature = "serde")]
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_should_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.audit_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_lookup_should_override_fields() {
        let config = Config::from_lookup(lookup(&[
            ("SESSION_ROLE_CACHE_TTL_SECS", "60"),
            ("SESSION_ROLE_AUDIT_CAPACITY", "50"),
            ("SESSION_ROLE_STORE_TIMEOUT_MS", " 250 "),
        ]))
        .unwrap();

        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.audit_capacity, 50);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.batch_concurrency, 32);
    }

    #[test]
    fn from_lookup_should_reject_garbage() {
        let err = Config::from_lookup(lookup(&[("SESSION_ROLE_CACHE_TTL_SECS", "five")]))
            .expect_err("must reject");
        assert!(err.to_string().contains("SESSION_ROLE_CACHE_TTL_SECS"));
    }

    #[test]
    fn from_lookup_should_reject_zero_capacity() {
        let result = Config::from_lookup(lookup(&[("SESSION_ROLE_AUDIT_CAPACITY", "0")]));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn env_value_should_reject_non_unicode() {
        let raw = std::ffi::OsString::from("5000");
        let result = env_value("SESSION_ROLE_STORE_TIMEOUT_MS", Err(VarError::NotUnicode(raw)));
        match result {
            Err(Error::InvalidConfig(message)) => {
                assert!(message.contains("SESSION_ROLE_STORE_TIMEOUT_MS"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn env_value_should_treat_missing_as_unset() {
        let missing = env_value("SESSION_ROLE_AUDIT_CAPACITY", Err(VarError::NotPresent));
        let present = env_value("SESSION_ROLE_AUDIT_CAPACITY", Ok("12".to_string()));

        assert!(matches!(missing, Ok(None)));
        assert_eq!(present.unwrap().as_deref(), Some("12"));
    }
}
