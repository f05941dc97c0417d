//! Shop configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `APP_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `FRONTEND_URL` - Public URL of the storefront (used in password reset links)
//!
//! ## Optional
//! - `SHOP_CURRENCY` - ISO 4217 charge currency (default: USD)
//! - `PAYMENT_TIMEOUT_SECS` - Upper bound on one charge call (default: 15)
//! - `STRIPE_SECRET_KEY` - Stripe secret key; checkout is disabled without it
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `SMTP_HOST` - SMTP relay; reset mails are only logged without it
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` / `SMTP_PASSWORD` - SMTP credentials (required with `SMTP_HOST`)
//! - `MAIL_FROM` - From address (default: `no-reply@sickfits.dev`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sick_fits_core::CurrencyCode;
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_MAIL_FROM: &str = "no-reply@sickfits.dev";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Full shop configuration, including connection details for every
/// collaborator.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Settings the shop operations read at runtime
    pub settings: ShopSettings,
    /// Stripe configuration (checkout is disabled when absent)
    pub stripe: Option<StripeConfig>,
    /// SMTP configuration (mail is logged instead of sent when absent)
    pub email: Option<EmailConfig>,
    /// Error tracking
    pub telemetry: TelemetryConfig,
}

/// Sentry settings, loadable on their own so a binary can start error
/// tracking before the rest of the configuration is validated.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl TelemetryConfig {
    /// Load from `SENTRY_DSN` and `SENTRY_ENVIRONMENT`.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        }
    }
}

/// Load only the database URL, for tooling that never runs shop operations.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `SHOP_DATABASE_URL` nor
/// `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("SHOP_DATABASE_URL")
}

/// Runtime settings consumed by the shop services.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct ShopSettings {
    /// Session token signing secret
    pub app_secret: SecretString,
    /// Public storefront URL
    pub frontend_url: Url,
    /// Currency every charge is made in
    pub currency: CurrencyCode,
    /// Upper bound on a single payment processor call
    pub payment_timeout: Duration,
}

impl std::fmt::Debug for ShopSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSettings")
            .field("app_secret", &"[REDACTED]")
            .field("frontend_url", &self.frontend_url.as_str())
            .field("currency", &self.currency)
            .field("payment_timeout", &self.payment_timeout)
            .finish()
    }
}

impl ShopSettings {
    /// Settings with the default currency (USD) and payment timeout.
    #[must_use]
    pub const fn new(app_secret: SecretString, frontend_url: Url) -> Self {
        Self {
            app_secret,
            frontend_url,
            currency: CurrencyCode::USD,
            payment_timeout: Duration::from_secs(DEFAULT_PAYMENT_TIMEOUT_SECS),
        }
    }

    /// Override the charge currency.
    #[must_use]
    pub const fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    /// Override the payment timeout.
    #[must_use]
    pub const fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret key (`sk_live_...` / `sk_test_...`)
    pub secret_key: SecretString,
    /// API base URL
    pub api_base: Url,
    /// HTTP request timeout for charge calls
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// SMTP configuration for transactional mail.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOP_DATABASE_URL")?;
        let settings = ShopSettings::from_env()?;
        let stripe = StripeConfig::from_env(settings.payment_timeout)?;
        let email = EmailConfig::from_env()?;

        Ok(Self {
            database_url,
            settings,
            stripe,
            email,
            telemetry: TelemetryConfig::from_env(),
        })
    }
}

impl ShopSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let app_secret = get_validated_secret("APP_SECRET")?;
        validate_session_secret(&app_secret, "APP_SECRET")?;

        let frontend_url = Url::parse(&get_required_env("FRONTEND_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("FRONTEND_URL".to_string(), e.to_string())
        })?;

        let currency = get_env_or_default("SHOP_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_CURRENCY".to_string(), e.to_string()))?;

        let timeout_secs = get_env_or_default(
            "PAYMENT_TIMEOUT_SECS",
            &DEFAULT_PAYMENT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("PAYMENT_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self::new(app_secret, frontend_url)
            .with_currency(currency)
            .with_payment_timeout(Duration::from_secs(timeout_secs)))
    }
}

impl StripeConfig {
    fn from_env(request_timeout: Duration) -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = get_optional_env("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };

        let api_base = Url::parse(&get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE))
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STRIPE_API_BASE".to_string(), e.to_string())
            })?;

        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            api_base,
            request_timeout,
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_env_or_default("MAIL_FROM", DEFAULT_MAIL_FROM),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-app-secret-here", "APP_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "APP_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "APP_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "APP_SECRET").is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ShopSettings::new(
            SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            Url::parse("http://localhost:7777").unwrap(),
        );
        assert_eq!(settings.currency, CurrencyCode::USD);
        assert_eq!(settings.payment_timeout, Duration::from_secs(15));

        let settings = settings
            .with_currency(CurrencyCode::EUR)
            .with_payment_timeout(Duration::from_millis(250));
        assert_eq!(settings.currency, CurrencyCode::EUR);
        assert_eq!(settings.payment_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_settings_debug_redacts_secret() {
        let settings = ShopSettings::new(
            SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            Url::parse("http://localhost:7777").unwrap(),
        );
        let debug = format!("{settings:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("aB3$xY9"));
    }
}
