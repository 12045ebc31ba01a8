use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::tracking::costs::FixedCostProfile;

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
    pub gateway: GatewayConfig,
    pub tracking: TrackingConfig,
    pub costs: FixedCostProfile,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            gateway: GatewayConfig::from_env()?,
            tracking: TrackingConfig::from_env()?,
            costs: fixed_costs_from_env()?,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Remote persistence endpoints and the local durable cache location.
///
/// When `base_url` is absent the service runs against in-memory stores,
/// which is the demo/test posture.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub cache_path: Option<PathBuf>,
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("GATEWAY_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        let bearer_token = env::var("GATEWAY_BEARER_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let timeout_secs = env::var("GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let cache_path = env::var("TRIP_CACHE_PATH").ok().map(PathBuf::from);

        Ok(Self {
            base_url,
            bearer_token,
            request_timeout: Duration::from_secs(timeout_secs),
            cache_path,
        })
    }
}

/// Live-tracking cadence controls.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub tick_interval: Duration,
}

impl TrackingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tick_secs = env::var("TRIP_TICK_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTickInterval)?;
        if tick_secs == 0 {
            return Err(ConfigError::InvalidTickInterval);
        }

        Ok(Self {
            tick_interval: Duration::from_secs(tick_secs),
        })
    }
}

fn cost_var(name: &str, default: &str) -> Result<f64, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidCost {
            name: name.to_string(),
        })
}

fn fixed_costs_from_env() -> Result<FixedCostProfile, ConfigError> {
    let account_payment_monthly = match env::var("COST_ACCOUNT_MONTHLY") {
        Ok(raw) => Some(raw.parse::<f64>().map_err(|_| ConfigError::InvalidCost {
            name: "COST_ACCOUNT_MONTHLY".to_string(),
        })?),
        Err(_) => None,
    };

    Ok(FixedCostProfile {
        maintenance_cost_per_interval: cost_var("COST_MAINTENANCE_PER_INTERVAL", "500")?,
        maintenance_interval_km: cost_var("COST_MAINTENANCE_INTERVAL_KM", "5000")?,
        insurance_monthly: cost_var("COST_INSURANCE_MONTHLY", "60")?,
        cellular_rent_monthly: cost_var("COST_CELLULAR_MONTHLY", "30")?,
        account_payment_monthly,
        fuel_consumption_per_100km: cost_var("COST_FUEL_CONSUMPTION_PER_100KM", "8")?,
        fuel_price_per_liter: cost_var("COST_FUEL_PRICE_PER_LITER", "0.85")?,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidTickInterval,
    InvalidCost { name: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "GATEWAY_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidTickInterval => {
                write!(f, "TRIP_TICK_SECS must be a positive whole number of seconds")
            }
            ConfigError::InvalidCost { name } => {
                write!(f, "{name} must parse to a number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
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
            "GATEWAY_BASE_URL",
            "GATEWAY_BEARER_TOKEN",
            "GATEWAY_TIMEOUT_SECS",
            "TRIP_CACHE_PATH",
            "TRIP_TICK_SECS",
            "COST_MAINTENANCE_PER_INTERVAL",
            "COST_MAINTENANCE_INTERVAL_KM",
            "COST_INSURANCE_MONTHLY",
            "COST_CELLULAR_MONTHLY",
            "COST_ACCOUNT_MONTHLY",
            "COST_FUEL_CONSUMPTION_PER_100KM",
            "COST_FUEL_PRICE_PER_LITER",
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
        assert!(config.gateway.base_url.is_none());
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(10));
        assert_eq!(config.tracking.tick_interval, Duration::from_secs(1));
        assert!(config.costs.account_payment_monthly.is_none());
        assert_eq!(config.costs.maintenance_interval_km, 5000.0);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn gateway_url_is_normalized_and_tick_must_be_positive() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("GATEWAY_BASE_URL", "https://ledger.example.com/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.gateway.base_url.as_deref(),
            Some("https://ledger.example.com")
        );

        env::set_var("TRIP_TICK_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidTickInterval)
        ));
    }

    #[test]
    fn rejects_malformed_cost_override() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COST_INSURANCE_MONTHLY", "sixty");
        match AppConfig::load() {
            Err(ConfigError::InvalidCost { name }) => {
                assert_eq!(name, "COST_INSURANCE_MONTHLY");
            }
            other => panic!("expected invalid cost error, got {other:?}"),
        }
    }
}
