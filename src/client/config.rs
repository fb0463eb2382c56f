//! Storage client configuration

use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Credentials, endpoint and transport tuning for a storage client
///
/// The transport settings are handed to the adapter untouched; this crate
/// enforces no timeouts, retries or concurrency limits of its own.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    pub access_key_id: String,

    pub access_key_secret: String,

    /// STS security token (may be empty for long-lived keys)
    #[serde(default)]
    pub security_token: String,

    pub endpoint: String,

    /// Connection timeout in milliseconds (default: 15000)
    #[serde(default = "default_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Socket read/write timeout in milliseconds (default: 15000)
    #[serde(default = "default_timeout_ms")]
    pub socket_timeout_ms: u64,

    /// Maximum concurrent requests the adapter should run (default: 5)
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Retries the adapter may attempt after a failed request (default: 2)
    #[serde(default = "default_max_error_retry")]
    pub max_error_retry: u32,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_concurrent_requests() -> u32 {
    5
}

fn default_max_error_retry() -> u32 {
    2
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("security_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("socket_timeout_ms", &self.socket_timeout_ms)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("max_error_retry", &self.max_error_retry)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        security_token: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: security_token.into(),
            endpoint: endpoint.into(),
            connection_timeout_ms: default_timeout_ms(),
            socket_timeout_ms: default_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_error_retry: default_max_error_retry(),
        }
    }

    pub fn connection_timeout_ms(mut self, timeout: u64) -> Self {
        self.connection_timeout_ms = timeout;
        self
    }

    pub fn socket_timeout_ms(mut self, timeout: u64) -> Self {
        self.socket_timeout_ms = timeout;
        self
    }

    pub fn max_concurrent_requests(mut self, max: u32) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn max_error_retry(mut self, retries: u32) -> Self {
        self.max_error_retry = retries;
        self
    }

    /// Parsed endpoint URL
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            UploadError::init_error(format!("invalid endpoint '{}': {}", self.endpoint, e))
        })
    }

    /// Check credentials and endpoint shape before handing them to an adapter
    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(UploadError::init_error("access key id cannot be empty"));
        }

        if self.access_key_secret.trim().is_empty() {
            return Err(UploadError::init_error("access key secret cannot be empty"));
        }

        let url = self.endpoint_url()?;
        match url.scheme() {
            "http" | "https" | "file" => {}
            other => {
                return Err(UploadError::init_error(format!(
                    "unsupported endpoint scheme: {}",
                    other
                )))
            }
        }

        if self.max_concurrent_requests == 0 {
            return Err(UploadError::config_error(
                "max concurrent requests must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(UploadError::from)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(UploadError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("ak", "sk", "sts", "https://oss-cn-hangzhou.aliyuncs.com")
    }

    #[test]
    fn test_default_tuning() {
        let config = config();
        assert_eq!(config.connection_timeout_ms, 15_000);
        assert_eq!(config.socket_timeout_ms, 15_000);
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.max_error_retry, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = config()
            .connection_timeout_ms(1_000)
            .socket_timeout_ms(2_000)
            .max_concurrent_requests(8)
            .max_error_retry(0);

        assert_eq!(config.connection_timeout_ms, 1_000);
        assert_eq!(config.socket_timeout_ms, 2_000);
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.max_error_retry, 0);
    }

    #[test]
    fn test_validation() {
        let err = ClientConfig::new("", "sk", "", "https://example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, UploadError::InitError { .. }));

        let err = ClientConfig::new("ak", " ", "", "https://example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, UploadError::InitError { .. }));

        let err = ClientConfig::new("ak", "sk", "", "not a url")
            .validate()
            .unwrap_err();
        assert!(matches!(err, UploadError::InitError { .. }));

        let err = ClientConfig::new("ak", "sk", "", "ftp://example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, UploadError::InitError { .. }));

        assert!(config().max_concurrent_requests(0).validate().is_err());
    }

    #[test]
    fn test_config_json() {
        let config = config();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"access-key-id\":\"ak\""));
        assert!(json.contains("\"max-error-retry\":2"));

        let parsed = ClientConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);

        let minimal = ClientConfig::from_json(
            r#"{"access-key-id":"ak","access-key-secret":"sk","endpoint":"https://e.com"}"#,
        )
        .unwrap();
        assert_eq!(minimal.socket_timeout_ms, 15_000);
        assert_eq!(minimal.security_token, "");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(rendered.contains("\"ak\""));
        assert!(!rendered.contains("\"sk\""));
        assert!(!rendered.contains("\"sts\""));
    }
}
