use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_COMPANY_SEARCH_URL: &str = "https://recherche-entreprises.api.gouv.fr/search";
pub const DEFAULT_GEO_URL: &str = "https://geo.api.gouv.fr/communes";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub evidence: EvidenceConfig,
    pub billing: BillingConfig,
    pub claims: ClaimsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let evidence = EvidenceConfig {
            company_search_url: env::var("EVIDENCE_COMPANY_SEARCH_URL")
                .unwrap_or_else(|_| DEFAULT_COMPANY_SEARCH_URL.to_string()),
            geo_url: env::var("EVIDENCE_GEO_URL").unwrap_or_else(|_| DEFAULT_GEO_URL.to_string()),
            timeout: Duration::from_secs(positive_secs("EVIDENCE_TIMEOUT_SECS", 5)?),
        };

        let billing = BillingConfig {
            provider: env::var("BILLING_PROVIDER")
                .map(|value| value.trim().to_ascii_lowercase())
                .unwrap_or_else(|_| "fake".to_string()),
            stripe_secret_key: non_blank("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_blank("STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance: Duration::from_secs(positive_secs(
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                300,
            )?),
            return_url: env::var("BILLING_RETURN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/recruiter/billing".to_string()),
        };

        let claims = ClaimsConfig {
            manual_review: flag("POINTS_CLAIM_MANUAL_REVIEW")?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            evidence,
            billing,
            claims,
        })
    }
}

fn non_blank(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_secs(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = non_blank(name) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidDuration { name, value: raw }),
    }
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = non_blank(name) else {
        return Ok(false);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value: raw }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Endpoints and time budget for the public evidence APIs.
#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    pub company_search_url: String,
    pub geo_url: String,
    pub timeout: Duration,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            company_search_url: DEFAULT_COMPANY_SEARCH_URL.to_string(),
            geo_url: DEFAULT_GEO_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Payment provider selection and credentials.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub provider: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub webhook_tolerance: Duration,
    pub return_url: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsConfig {
    /// Selects the human-in-the-loop claim rule set.
    pub manual_review: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration { name: &'static str, value: String },
    InvalidFlag { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration { name, value } => {
                write!(f, "{name} must be a positive number of seconds, got '{value}'")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be a boolean flag, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDuration { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "EVIDENCE_COMPANY_SEARCH_URL",
            "EVIDENCE_GEO_URL",
            "EVIDENCE_TIMEOUT_SECS",
            "BILLING_PROVIDER",
            "STRIPE_SECRET_KEY",
            "STRIPE_WEBHOOK_SECRET",
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            "BILLING_RETURN_URL",
            "POINTS_CLAIM_MANUAL_REVIEW",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.evidence.company_search_url, DEFAULT_COMPANY_SEARCH_URL);
        assert_eq!(config.evidence.timeout, Duration::from_secs(5));
        assert_eq!(config.billing.provider, "fake");
        assert_eq!(config.billing.webhook_tolerance, Duration::from_secs(300));
        assert!(config.billing.stripe_secret_key.is_none());
        assert!(!config.claims.manual_review);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_zero_evidence_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("EVIDENCE_TIMEOUT_SECS", "0");
        let err = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidDuration {
                name: "EVIDENCE_TIMEOUT_SECS",
                ..
            }
        ));
        reset_env();
    }

    #[test]
    fn reads_billing_and_claim_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BILLING_PROVIDER", " Stripe ");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
        env::set_var("STRIPE_WEBHOOK_SECRET", "   ");
        env::set_var("POINTS_CLAIM_MANUAL_REVIEW", "yes");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.billing.provider, "stripe");
        assert_eq!(config.billing.stripe_secret_key.as_deref(), Some("sk_test_123"));
        assert!(config.billing.stripe_webhook_secret.is_none());
        assert!(config.claims.manual_review);
        reset_env();
    }

    #[test]
    fn rejects_unknown_flag_value() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POINTS_CLAIM_MANUAL_REVIEW", "maybe");
        let err = AppConfig::load().expect_err("flag rejected");
        assert!(err.to_string().contains("POINTS_CLAIM_MANUAL_REVIEW"));
        reset_env();
    }
}
