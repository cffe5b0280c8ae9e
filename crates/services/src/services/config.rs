//! Process configuration sourced from the environment.

use std::env;

/// Outbound mail credentials. Absent when the provider is not configured;
/// only the notification calls fail in that case.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub domain: String,
    pub sender_name: String,
}

impl MailConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("MAILGUN_API_KEY").ok()?;
        let domain = env::var("MAILGUN_DOMAIN").ok()?;
        Some(Self {
            api_key,
            domain,
            sender_name: env::var("MAIL_SENDER_NAME").unwrap_or_else(|_| "Daytally".to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub mail: Option<MailConfig>,
}

impl Config {
    /// Reads configuration from the environment, falling back to local defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DAYTALLY_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://daytally.db".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3001),
            mail: MailConfig::from_env(),
        }
    }
}
