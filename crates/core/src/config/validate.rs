use rust_decimal::Decimal;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Backoffice section exists (enforced by serde)
/// - Server port is not 0
/// - Gateway base URL is an http(s) URL
/// - Authorization thresholds are positive and ordered
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Gateway validation
    if !config.backoffice.base_url.starts_with("http://")
        && !config.backoffice.base_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(format!(
            "backoffice.base_url must be an http(s) URL, got {:?}",
            config.backoffice.base_url
        )));
    }

    // Authorization thresholds
    let policy = &config.auth_policy;
    if policy.dual_staff_ticket_count == 0 {
        return Err(ConfigError::ValidationError(
            "auth_policy.dual_staff_ticket_count cannot be 0".to_string(),
        ));
    }
    if policy.dual_staff_amount <= Decimal::ZERO || policy.manager_approval_amount <= Decimal::ZERO
    {
        return Err(ConfigError::ValidationError(
            "auth_policy amount thresholds must be positive".to_string(),
        ));
    }
    if policy.manager_approval_amount < policy.dual_staff_amount {
        return Err(ConfigError::ValidationError(
            "auth_policy.manager_approval_amount cannot be below dual_staff_amount".to_string(),
        ));
    }

    if config.session.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "session.idle_timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
