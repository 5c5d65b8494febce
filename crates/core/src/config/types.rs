use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::authorize::AuthPolicy;
use crate::service::RemoteServiceConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Back-office gateway connection (required).
    pub backoffice: RemoteServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth_policy: AuthPolicy,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration. History and audit tables share one file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pledgedesk.db")
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session counts as abandoned.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// How many completed transactions the in-memory recent ring keeps.
    #[serde(default = "default_recent_history_cap")]
    pub recent_history_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            recent_history_cap: default_recent_history_cap(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    900
}

fn default_recent_history_cap() -> usize {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub backoffice: SanitizedBackOfficeConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth_policy: AuthPolicy,
    pub session: SessionConfig,
}

/// Sanitized gateway config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackOfficeConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            backoffice: SanitizedBackOfficeConfig {
                base_url: config.backoffice.base_url.clone(),
                api_key_configured: config
                    .backoffice
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.backoffice.timeout_secs,
            },
            server: config.server.clone(),
            database: config.database.clone(),
            auth_policy: config.auth_policy.clone(),
            session: config.session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[backoffice]
base_url = "http://head-office:9200"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.backoffice.base_url, "http://head-office:9200");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.session.idle_timeout_secs, 900);
        assert_eq!(config.session.recent_history_cap, 10);
        assert_eq!(config.auth_policy.dual_staff_ticket_count, 5);
    }

    #[test]
    fn test_deserialize_missing_backoffice_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[backoffice]
base_url = "http://head-office:9200"
api_key = "terminal-7-key"
timeout_secs = 10

[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/branch.db"

[auth_policy]
dual_staff_ticket_count = 3
dual_staff_amount = "5000"
manager_approval_amount = "25000"

[session]
idle_timeout_secs = 600
recent_history_cap = 20
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/branch.db");
        assert_eq!(config.auth_policy.dual_staff_ticket_count, 3);
        assert_eq!(config.auth_policy.dual_staff_amount, dec!(5000));
        assert_eq!(config.auth_policy.manager_approval_amount, dec!(25000));
        assert_eq!(config.session.idle_timeout_secs, 600);
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[backoffice]
base_url = "http://head-office:9200"
api_key = "secret-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.backoffice.api_key_configured);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
    }

    #[test]
    fn test_sanitized_config_no_api_key() {
        let toml = r#"
[backoffice]
base_url = "http://head-office:9200"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.backoffice.api_key_configured);
    }
}
