//! Configuration for the Haven API service

use std::time::Duration;

use clap::{Parser, ValueEnum};
use haven_core::GeoPolicy;

/// Which document store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// JetStream key-value bucket
    Kv,
    /// Process-local store; contents are lost on restart
    Memory,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "haven-api")]
#[command(about = "House, resident and check-in API for a sober-living residence")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env, default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// Document store backend
    #[arg(long, env = "HAVEN_STORE", value_enum, default_value = "kv")]
    pub store: StoreBackend,

    /// NATS server URL
    #[arg(long, env, default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Path to NATS credentials file
    #[arg(long, env)]
    pub nats_creds_path: Option<String>,

    /// JetStream KV bucket holding all documents
    #[arg(long, env = "HAVEN_KV_BUCKET", default_value = "haven")]
    pub kv_bucket: String,

    /// Upper bound on every store call
    #[arg(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub store_timeout: Duration,

    /// Secret used to sign session tokens
    #[arg(long, env, hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of a session token
    #[arg(long, env, default_value = "12h", value_parser = humantime::parse_duration)]
    pub session_ttl: Duration,

    /// Manager password used until one is set through the API
    #[arg(long, env, default_value = "admin", hide_env_values = true)]
    pub admin_password: String,

    /// Text-generation endpoint for shift reports and intake summaries
    #[arg(long, env)]
    pub report_endpoint: Option<String>,

    /// API key for the text-generation endpoint
    #[arg(long, env, hide_env_values = true)]
    pub report_api_key: Option<String>,

    /// Model requested from the text-generation endpoint
    #[arg(long, env, default_value = "gemini-2.5-flash")]
    pub report_model: String,

    /// Timeout for text-generation calls
    #[arg(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub report_timeout: Duration,

    /// Deadline for the high-accuracy location attempt
    #[arg(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub geo_high_timeout: Duration,

    /// Deadline for the low-accuracy location attempt
    #[arg(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub geo_low_timeout: Duration,

    /// Largest accepted accuracy radius for mobile devices, in meters
    #[arg(long, env, default_value_t = 200.0)]
    pub mobile_accuracy_ceiling_m: f64,

    /// Largest accepted accuracy radius for desktop devices, in meters
    #[arg(long, env, default_value_t = 10_000.0)]
    pub desktop_accuracy_ceiling_m: f64,

    /// Browser origin allowed to call the API cross-origin
    #[arg(long, env)]
    pub cors_origin: Option<String>,

    /// Output logs in JSON format
    #[arg(long, env)]
    pub log_json: bool,
}

impl Config {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_config() -> Self {
        Config::parse()
    }

    pub fn geo_policy(&self) -> GeoPolicy {
        GeoPolicy {
            high_accuracy_timeout: self.geo_high_timeout,
            low_accuracy_timeout: self.geo_low_timeout,
            mobile_ceiling_m: self.mobile_accuracy_ceiling_m,
            desktop_ceiling_m: self.desktop_accuracy_ceiling_m,
        }
    }

    /// Check if a text-generation endpoint is configured
    pub fn has_report_endpoint(&self) -> bool {
        self.report_endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["haven-api", "--jwt-secret", "test-secret"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_durations_parse_humantime() {
        let config = parse(&["--store-timeout", "2s", "--geo-high-timeout", "500ms"]);
        assert_eq!(config.store_timeout, Duration::from_secs(2));
        assert_eq!(config.geo_policy().high_accuracy_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_geo_policy_uses_ceilings() {
        let config = parse(&["--mobile-accuracy-ceiling-m", "150"]);
        let policy = config.geo_policy();
        assert_eq!(policy.mobile_ceiling_m, 150.0);
        assert_eq!(policy.desktop_ceiling_m, 10_000.0);
    }

    #[test]
    fn test_store_backend_values() {
        assert_eq!(parse(&["--store", "memory"]).store, StoreBackend::Memory);
        assert!(Config::try_parse_from(["haven-api", "--jwt-secret", "s", "--store", "redis"]).is_err());
    }

    #[test]
    fn test_has_report_endpoint() {
        assert!(!parse(&[]).has_report_endpoint());
        assert!(parse(&["--report-endpoint", "http://localhost:9000/generate"]).has_report_endpoint());
    }
}
