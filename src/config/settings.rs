use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub email_status: EmailStatusConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared key required on the internal producer API (open when unset)
    pub key: Option<String>,
}

/// Durable push connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Heartbeat sweep interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Seconds without activity before a connection is evicted by the sweep
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold: u64,
    /// Idle timeout handed to newly registered connections, in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Upper bound for a single frame write, in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Frames buffered per connection before writes start to wait
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Ephemeral email status channel settings
#[derive(Debug, Clone, Deserialize)]
pub struct EmailStatusConfig {
    #[serde(default = "default_email_status_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_stale_threshold() -> u64 {
    300 // 5 minutes
}

fn default_connection_timeout_ms() -> u64 {
    1_800_000 // 30 minutes
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_buffer_size() -> usize {
    32
}

fn default_email_status_timeout() -> u64 {
    60
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("push.heartbeat_interval", default_heartbeat_interval())?
            .set_default("push.stale_threshold", default_stale_threshold())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, JWT__SECRET, PUSH__HEARTBEAT_INTERVAL, API__KEY, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.push.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl PushConfig {
    /// Reject values the sweeper and connections cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval == 0 {
            return Err(ConfigError::Message(
                "push.heartbeat_interval must be at least 1 second".to_string(),
            ));
        }
        if self.stale_threshold == 0 {
            return Err(ConfigError::Message(
                "push.stale_threshold must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl EmailStatusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            stale_threshold: default_stale_threshold(),
            connection_timeout_ms: default_connection_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for EmailStatusConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_email_status_timeout(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);

        let push = PushConfig::default();
        assert_eq!(push.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(push.stale_threshold(), Duration::from_secs(300));
        assert_eq!(push.send_timeout(), Duration::from_secs(5));

        assert_eq!(EmailStatusConfig::default().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_push_section_uses_defaults() {
        let push: PushConfig = serde_json::from_str(r#"{"stale_threshold": 90}"#).unwrap();
        assert_eq!(push.stale_threshold, 90);
        assert_eq!(push.heartbeat_interval, 30);
        assert_eq!(push.buffer_size, 32);
    }

    #[test]
    fn test_zero_heartbeat_interval_rejected() {
        let push = PushConfig {
            heartbeat_interval: 0,
            ..Default::default()
        };
        let err = push.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval"));

        assert!(PushConfig::default().validate().is_ok());
    }
}
