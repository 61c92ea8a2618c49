//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `BACKEND_URL` - Managed backend project URL (e.g. `https://xyz.supabase.co`)
//! - `BACKEND_ANON_KEY` - Public anon key sent with every backend request
//!
//! ## Optional
//! - `BACKEND_SERVICE_ROLE_KEY` - Service key for maintenance commands
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_TAX_RATE` - Tax as a fraction (default: 0.08)
//! - `STOREFRONT_FREE_SHIPPING_THRESHOLD` - Subtotal above which shipping is free (default: 100)
//! - `STOREFRONT_FLAT_SHIPPING_FEE` - Shipping below the threshold (default: 10)
//! - `STOREFRONT_CURRENCY` - ISO 4217 code (default: INR)
//! - `STOREFRONT_DEFAULT_COUNTRY` - Shipping country when none is entered (default: India)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag (default: development)
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use thiserror::Error;
use tower_sessions::cookie::Key;
use zeaver_core::{CurrencyCode, PricingPolicy};

/// Shortest accepted session secret, in characters.
const SESSION_SECRET_MIN_CHARS: usize = 32;

/// Random keys land well above this; typed phrases land below it.
const SECRET_MIN_BITS_PER_CHAR: f64 = 3.3;

/// Fragments that show up in copied `.env.example` values.
const PLACEHOLDER_FRAGMENTS: [&str; 9] = [
    "changeme",
    "change-me",
    "placeholder",
    "your-",
    "your_",
    "example",
    "secret",
    "todo",
    "xxx",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("{0} is not safe to use: {1}")]
    WeakSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Session database URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, used for OAuth redirects and the `Secure` cookie flag
    pub base_url: String,
    /// Master secret the session cookie signing key is derived from
    pub session_secret: SecretString,
    pub backend: BackendConfig,
    /// Tax and shipping rules
    pub pricing: PricingPolicy,
    /// Shipping country used when the checkout form leaves it blank
    pub default_country: String,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: String,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Managed backend (REST data API + auth API) configuration.
///
/// `Debug` redacts the service key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project URL without a trailing slash
    pub url: String,
    /// Public anon key. Safe to expose, but still sent as a header only.
    pub anon_key: String,
    /// Service-role key that bypasses row-level security
    pub service_role_key: Option<SecretString>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key)
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl BackendConfig {
    /// Load backend settings on their own, for tools that don't run the server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `BACKEND_URL` or `BACKEND_ANON_KEY` is missing,
    /// or if a service key is set but looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let url = require("BACKEND_URL")?.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidEnvVar(
                "BACKEND_URL".to_string(),
                "must start with http:// or https://".to_string(),
            ));
        }

        let service_role_key = optional("BACKEND_SERVICE_ROLE_KEY")
            .map(|key| {
                check_secret("BACKEND_SERVICE_ROLE_KEY", &key, 0)?;
                Ok::<_, ConfigError>(SecretString::from(key))
            })
            .transpose()?;

        Ok(Self {
            url,
            anon_key: require("BACKEND_ANON_KEY")?,
            service_role_key,
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables, reading `.env` first
    /// when present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or unparsable,
    /// or if a secret is short, low-entropy or a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let session_secret = require("STOREFRONT_SESSION_SECRET")?;
        check_secret("STOREFRONT_SESSION_SECRET", &session_secret, SESSION_SECRET_MIN_CHARS)?;

        Ok(Self {
            database_url: session_database_url()?,
            host: parsed_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parsed_or("STOREFRONT_PORT", 3000)?,
            base_url: require("STOREFRONT_BASE_URL")?,
            session_secret: SecretString::from(session_secret),
            backend: BackendConfig::from_env()?,
            pricing: pricing_from_env()?,
            default_country: optional("STOREFRONT_DEFAULT_COUNTRY").unwrap_or_else(|| "India".to_string()),
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            sentry_sample_rate: parsed_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parsed_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Cookie signing key, stretched from the session secret to the 64 bytes
    /// the cookie jar wants.
    #[must_use]
    pub fn session_key(&self) -> Key {
        let digest = Sha512::digest(self.session_secret.expose_secret().as_bytes());
        Key::from(digest.as_slice())
    }
}

/// Read tax and shipping rules, falling back to the store defaults.
fn pricing_from_env() -> Result<PricingPolicy, ConfigError> {
    let defaults = PricingPolicy::default();
    let policy = PricingPolicy {
        tax_rate: parsed_or("STOREFRONT_TAX_RATE", defaults.tax_rate)?,
        free_shipping_threshold: parsed_or(
            "STOREFRONT_FREE_SHIPPING_THRESHOLD",
            defaults.free_shipping_threshold,
        )?,
        flat_shipping_fee: parsed_or("STOREFRONT_FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
        currency: parsed_or::<CurrencyCode>("STOREFRONT_CURRENCY", defaults.currency)?,
    };
    validate_pricing(&policy)?;
    Ok(policy)
}

fn validate_pricing(policy: &PricingPolicy) -> Result<(), ConfigError> {
    let invalid = |key: &str, reason: &str| Err(ConfigError::InvalidEnvVar(key.to_string(), reason.to_string()));

    if policy.tax_rate < Decimal::ZERO || policy.tax_rate >= Decimal::ONE {
        return invalid("STOREFRONT_TAX_RATE", "must be a fraction between 0 and 1 (e.g. 0.08)");
    }
    if policy.free_shipping_threshold < Decimal::ZERO {
        return invalid("STOREFRONT_FREE_SHIPPING_THRESHOLD", "must not be negative");
    }
    if policy.flat_shipping_fee < Decimal::ZERO {
        return invalid("STOREFRONT_FLAT_SHIPPING_FEE", "must not be negative");
    }
    Ok(())
}

// =============================================================================
// Environment helpers
// =============================================================================

fn require(key: &str) -> Result<String, ConfigError> {
    optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Empty values count as unset.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Session database URL, resolved the same way the server resolves it.
///
/// `DATABASE_URL` is accepted as a fallback since hosted Postgres add-ons set it.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `STOREFRONT_DATABASE_URL`
/// nor `DATABASE_URL` is set.
pub fn session_database_url() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    optional("STOREFRONT_DATABASE_URL")
        .or_else(|| optional("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_DATABASE_URL".to_string()))
}

/// Shannon entropy of `value`, in bits per character.
fn bits_per_char(value: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for c in value.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject secrets that are short, look copied from an example file, or are
/// too repetitive to be random.
fn check_secret(key: &str, value: &str, min_chars: usize) -> Result<(), ConfigError> {
    let weak = |reason: String| Err(ConfigError::WeakSecret(key.to_string(), reason));

    let chars = value.chars().count();
    if chars < min_chars {
        return weak(format!("needs at least {min_chars} characters, got {chars}"));
    }

    let lower = value.to_lowercase();
    if let Some(fragment) = PLACEHOLDER_FRAGMENTS.iter().find(|f| lower.contains(*f)) {
        return weak(format!("looks like a placeholder (contains \"{fragment}\")"));
    }

    let bits = bits_per_char(value);
    if bits < SECRET_MIN_BITS_PER_CHAR {
        return weak(format!(
            "only {bits:.2} bits of entropy per character; generate one with `openssl rand -base64 48`"
        ));
    }
    Ok(())
}
