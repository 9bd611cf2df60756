//! Payments Configuration
//!
//! Explicit configuration handed to the orchestrator and the webhook
//! verifier at construction. Nothing in this crate reads the environment
//! except [`PaymentsConfig::from_env`].

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{PaymentError, Result};

/// Processors reject charges below this many minor units.
pub const DEFAULT_MIN_AMOUNT: i64 = 50;

/// Default window (seconds) for webhook signature timestamps
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Default bound (seconds) on a single outbound processor call
pub const DEFAULT_PROCESSOR_TIMEOUT_SECS: u64 = 30;

/// Configuration consumed by the payments core
#[derive(Debug)]
pub struct PaymentsConfig {
    /// Processor secret key for outbound calls
    pub secret_key: Option<SecretString>,

    /// Shared secret for inbound webhook verification
    pub webhook_secret: Option<SecretString>,

    /// Public key the client uses to initialise its own processor SDK
    pub publishable_key: Option<String>,

    /// Minimum chargeable amount in minor units
    pub min_amount: i64,

    /// Currency used when a request omits one
    pub default_currency: String,

    /// Allowed skew between a webhook timestamp and our clock
    pub webhook_tolerance: Duration,

    /// Upper bound on each outbound processor call
    pub processor_timeout: Duration,

    /// Re-query the processor on status lookups
    pub refresh_status: bool,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            publishable_key: None,
            min_amount: DEFAULT_MIN_AMOUNT,
            default_currency: "usd".into(),
            webhook_tolerance: Duration::from_secs(DEFAULT_WEBHOOK_TOLERANCE_SECS),
            processor_timeout: Duration::from_secs(DEFAULT_PROCESSOR_TIMEOUT_SECS),
            refresh_status: true,
        }
    }
}

impl PaymentsConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            secret_key: env_secret("STRIPE_SECRET_KEY"),
            webhook_secret: env_secret("STRIPE_WEBHOOK_SECRET"),
            publishable_key: env_string("STRIPE_PUBLISHABLE_KEY"),
            min_amount: env_parse("PAYMENTS_MIN_AMOUNT")?.unwrap_or(defaults.min_amount),
            default_currency: env_string("PAYMENTS_DEFAULT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.default_currency),
            webhook_tolerance: env_parse("WEBHOOK_TOLERANCE_SECS")?
                .map_or(defaults.webhook_tolerance, Duration::from_secs),
            processor_timeout: env_parse("PROCESSOR_TIMEOUT_SECS")?
                .map_or(defaults.processor_timeout, Duration::from_secs),
            refresh_status: env_parse("PAYMENTS_REFRESH_STATUS")?
                .unwrap_or(defaults.refresh_status),
        })
    }

    /// Builder-style helper for the webhook secret
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Builder-style helper for the processor secret key
    #[must_use]
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(SecretString::new(key.into()));
        self
    }

    /// Check key prefixes and numeric bounds
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = &self.secret_key {
            if !key.expose_secret().starts_with("sk_") && !key.expose_secret().starts_with("rk_") {
                return Err(PaymentError::Config("STRIPE_SECRET_KEY must start with sk_ or rk_".into()));
            }
        }
        if let Some(secret) = &self.webhook_secret {
            if !secret.expose_secret().starts_with("whsec_") {
                return Err(PaymentError::Config("STRIPE_WEBHOOK_SECRET must start with whsec_".into()));
            }
        }
        if let Some(key) = &self.publishable_key {
            if !key.starts_with("pk_") {
                return Err(PaymentError::Config("STRIPE_PUBLISHABLE_KEY must start with pk_".into()));
            }
        }
        if self.min_amount <= 0 {
            return Err(PaymentError::Config("PAYMENTS_MIN_AMOUNT must be positive".into()));
        }

        Ok(())
    }

    /// Whether the secret key targets the processor's test mode
    pub fn is_test_mode(&self) -> bool {
        self.secret_key
            .as_ref()
            .is_some_and(|k| k.expose_secret().starts_with("sk_test_"))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secret(name: &str) -> Option<SecretString> {
    env_string(name).map(SecretString::new)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    env_string(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| PaymentError::Config(format!("{name} has an invalid value")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PaymentsConfig::default();
        assert_eq!(config.min_amount, 50);
        assert_eq!(config.default_currency, "usd");
        assert_eq!(config.webhook_tolerance, Duration::from_secs(300));
        assert!(config.refresh_status);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_test_mode() {
        let config = PaymentsConfig::default().with_secret_key("sk_test_xxx");
        assert!(config.is_test_mode());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_wrong_prefixes() {
        let config = PaymentsConfig::default().with_secret_key("pk_test_xxx");
        assert!(config.validate().is_err());

        let config = PaymentsConfig::default().with_webhook_secret("secret_xxx");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_positive_minimum() {
        let config = PaymentsConfig {
            min_amount: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let config = PaymentsConfig::default()
            .with_secret_key("sk_test_supersecret")
            .with_webhook_secret("whsec_supersecret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
    }
}
