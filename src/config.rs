//! Client configuration.
//!
//! Credentials usually arrive as a device connection string:
//!
//! ```text
//! HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5
//! ```
//!
//! The remaining settings have defaults and can be overridden in code or
//! loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{DmError, Result};
use crate::protocol::MAX_FRAME_BUFFER;
use crate::session::RetryPolicy;

const HOST_NAME_KEY: &str = "HostName";
const DEVICE_ID_KEY: &str = "DeviceId";
const DEVICE_KEY_KEY: &str = "SharedAccessKey";

/// DM client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// DM server host name, also the SAS resource URI.
    pub host_name: String,

    /// Device id, sent as the LWM2M endpoint name.
    pub device_id: String,

    /// Base64 device key used to sign SAS tokens.
    pub device_key: String,

    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Receive buffer size, length prefix included.
    #[serde(default = "default_max_frame_buffer")]
    pub max_frame_buffer: usize,

    /// Pause between `do_work` passes in `run`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long the engine waits on a confirmable notification.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Registration lifetime advertised to the server.
    #[serde(default = "default_lifetime")]
    pub lifetime_secs: u64,
}

fn default_token_lifetime() -> u64 {
    3600
}

fn default_max_frame_buffer() -> usize {
    MAX_FRAME_BUFFER
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_notify_timeout() -> u64 {
    crate::engine::DEFAULT_NOTIFY_TIMEOUT_SECS
}

fn default_lifetime() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            device_id: String::new(),
            device_key: String::new(),
            token_lifetime_secs: default_token_lifetime(),
            retry: RetryPolicy::default(),
            max_frame_buffer: default_max_frame_buffer(),
            poll_interval_ms: default_poll_interval(),
            notify_timeout_secs: default_notify_timeout(),
            lifetime_secs: default_lifetime(),
        }
    }
}

impl ClientConfig {
    /// Parse `HostName=..;DeviceId=..;SharedAccessKey=..`.
    ///
    /// All three keys are required. Unknown keys and segments without `=`
    /// are rejected. Empty segments (e.g. a trailing `;`) are ignored.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut host_name = None;
        let mut device_id = None;
        let mut device_key = None;

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                DmError::InvalidConfig(format!("segment '{}' has no '='", segment))
            })?;

            match key {
                HOST_NAME_KEY => host_name = Some(value.to_string()),
                DEVICE_ID_KEY => device_id = Some(value.to_string()),
                DEVICE_KEY_KEY => device_key = Some(value.to_string()),
                other => {
                    return Err(DmError::InvalidConfig(format!(
                        "unknown connection string key '{}'",
                        other
                    )))
                }
            }
        }

        config.host_name = required(host_name, HOST_NAME_KEY)?;
        config.device_id = required(device_id, DEVICE_ID_KEY)?;
        config.device_key = required(device_key, DEVICE_KEY_KEY)?;
        Ok(config)
    }

    /// Load a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(DmError::InvalidConfig)?;
        Ok(config)
    }

    pub fn token_lifetime(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.token_lifetime_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notify_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.notify_timeout_secs)
    }

    /// Validates configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host_name.is_empty() {
            return Err("host_name is required".to_string());
        }
        if self.device_id.is_empty() {
            return Err("device_id is required".to_string());
        }
        if self.device_key.is_empty() {
            return Err("device_key is required".to_string());
        }
        if self.token_lifetime_secs == 0 {
            return Err("token_lifetime_secs must be > 0".to_string());
        }
        if self.lifetime_secs == 0 {
            return Err("lifetime_secs must be > 0".to_string());
        }
        if self.max_frame_buffer <= crate::protocol::LENGTH_FIELD_SIZE {
            return Err("max_frame_buffer must exceed the length prefix".to_string());
        }
        self.retry.validate()
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DmError::InvalidConfig(format!("missing {}", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION_STRING: &str =
        "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=a2V5";

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.token_lifetime_secs, 3600);
        assert_eq!(config.max_frame_buffer, 1024);
        assert_eq!(config.retry.max_delay_secs, 36000);
        assert_eq!(config.notify_timeout(), std::time::Duration::from_secs(60));
        assert_eq!(config.lifetime_secs, 300);
        // Credentials are not defaulted.
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_string() {
        let config = ClientConfig::from_connection_string(CONNECTION_STRING).unwrap();
        assert_eq!(config.host_name, "myhub.azure-devices.net");
        assert_eq!(config.device_id, "dev1");
        assert_eq!(config.device_key, "a2V5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_string_key_with_padding() {
        let config = ClientConfig::from_connection_string(
            "HostName=h.example;DeviceId=d;SharedAccessKey=YWJjZA==;",
        )
        .unwrap();
        assert_eq!(config.device_key, "YWJjZA==");
    }

    #[test]
    fn test_connection_string_errors() {
        let missing = ClientConfig::from_connection_string("HostName=h;DeviceId=d");
        assert!(matches!(missing, Err(DmError::InvalidConfig(_))));

        let unknown = ClientConfig::from_connection_string(&format!("{};Extra=1", CONNECTION_STRING));
        assert!(matches!(unknown, Err(DmError::InvalidConfig(_))));

        let no_equals = ClientConfig::from_connection_string("HostName");
        assert!(matches!(no_equals, Err(DmError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ClientConfig::from_json(
            r#"{"host_name":"h.example","device_id":"d","device_key":"a2V5","retry":{"max_delay_secs":10}}"#,
        )
        .unwrap();

        assert_eq!(config.retry.initial_delay_secs, 1);
        assert_eq!(config.retry.max_delay_secs, 10);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_from_json_validates() {
        let result = ClientConfig::from_json(r#"{"host_name":"","device_id":"d","device_key":"k"}"#);
        assert!(matches!(result, Err(DmError::InvalidConfig(_))));

        let result = ClientConfig::from_json(
            r#"{"host_name":"h","device_id":"d","device_key":"k","lifetime_secs":0}"#,
        );
        assert!(matches!(result, Err(DmError::InvalidConfig(_))));

        let result = ClientConfig::from_json("not json");
        assert!(matches!(result, Err(DmError::Json(_))));
    }
}
