//! Provider configuration resolved from explicit values and environment variables

use std::time::Duration;
use thiserror::Error;

/// Default budget for waits that only read state
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Default budget for retrying mutating calls
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const SECRET_ID_ENV: &str = "TENCENTCLOUD_SECRET_ID";
pub const SECRET_KEY_ENV: &str = "TENCENTCLOUD_SECRET_KEY";
pub const SECURITY_TOKEN_ENV: &str = "TENCENTCLOUD_SECURITY_TOKEN";
pub const REGION_ENV: &str = "TENCENTCLOUD_REGION";
pub const DOMAIN_ENV: &str = "TENCENTCLOUD_DOMAIN";
pub const PROTOCOL_ENV: &str = "TENCENTCLOUD_PROTOCOL";
pub const ENDPOINT_ENV: &str = "TENCENTCLOUD_ENDPOINT";

const DEFAULT_REGION: &str = "ap-guangzhou";
const DEFAULT_DOMAIN: &str = "tencentcloudapi.com";
const DEFAULT_PROTOCOL: &str = "https";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required (set in provider config or {env} env var)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub secret_id: String,
    pub secret_key: String,
    pub security_token: Option<String>,
    pub region: String,
    pub domain: String,
    pub protocol: String,
    /// Replaces `{protocol}://{service}.{domain}` for every service
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("domain", &self.domain)
            .field("protocol", &self.protocol)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Resolve everything from `TENCENTCLOUD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Base URL for a service such as `redis` or `rum`
    pub fn service_endpoint(&self, service: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("{}://{}.{}", self.protocol, service, self.domain),
        }
    }
}

/// Explicit values win over environment variables
#[derive(Debug, Default, Clone)]
pub struct ProviderConfigBuilder {
    secret_id: Option<String>,
    secret_key: Option<String>,
    security_token: Option<String>,
    region: Option<String>,
    domain: Option<String>,
    protocol: Option<String>,
    endpoint: Option<String>,
}

impl ProviderConfigBuilder {
    pub fn secret_id(mut self, value: impl Into<String>) -> Self {
        self.secret_id = Some(value.into());
        self
    }

    pub fn secret_key(mut self, value: impl Into<String>) -> Self {
        self.secret_key = Some(value.into());
        self
    }

    pub fn security_token(mut self, value: impl Into<String>) -> Self {
        self.security_token = Some(value.into());
        self
    }

    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    pub fn domain(mut self, value: impl Into<String>) -> Self {
        self.domain = Some(value.into());
        self
    }

    pub fn protocol(mut self, value: impl Into<String>) -> Self {
        self.protocol = Some(value.into());
        self
    }

    pub fn endpoint(mut self, value: impl Into<String>) -> Self {
        self.endpoint = Some(value.into());
        self
    }

    pub fn build(self) -> Result<ProviderConfig, ConfigError> {
        let secret_id = self
            .secret_id
            .or_else(|| env_value(SECRET_ID_ENV))
            .ok_or(ConfigError::Missing {
                field: "secret_id",
                env: SECRET_ID_ENV,
            })?;

        let secret_key = self
            .secret_key
            .or_else(|| env_value(SECRET_KEY_ENV))
            .ok_or(ConfigError::Missing {
                field: "secret_key",
                env: SECRET_KEY_ENV,
            })?;

        let protocol = self
            .protocol
            .or_else(|| env_value(PROTOCOL_ENV))
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string())
            .to_ascii_lowercase();
        if protocol != "https" && protocol != "http" {
            return Err(ConfigError::Invalid {
                field: "protocol",
                reason: format!("expected http or https, got {}", protocol),
            });
        }

        let endpoint = self.endpoint.or_else(|| env_value(ENDPOINT_ENV));
        if let Some(endpoint) = &endpoint {
            url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
                field: "endpoint",
                reason: e.to_string(),
            })?;
        }

        Ok(ProviderConfig {
            secret_id,
            secret_key,
            security_token: self
                .security_token
                .or_else(|| env_value(SECURITY_TOKEN_ENV)),
            region: self
                .region
                .or_else(|| env_value(REGION_ENV))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            domain: self
                .domain
                .or_else(|| env_value(DOMAIN_ENV))
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            protocol,
            endpoint,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_ENV: [&str; 7] = [
        SECRET_ID_ENV,
        SECRET_KEY_ENV,
        SECURITY_TOKEN_ENV,
        REGION_ENV,
        DOMAIN_ENV,
        PROTOCOL_ENV,
        ENDPOINT_ENV,
    ];

    fn clear_env() {
        for name in ALL_ENV {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn config_resolves_from_env_vars() {
        clear_env();
        std::env::set_var(SECRET_ID_ENV, "AKIDexample");
        std::env::set_var(SECRET_KEY_ENV, "secret");
        std::env::set_var(REGION_ENV, "ap-shanghai");

        let config = ProviderConfig::from_env().unwrap();
        assert_eq!(config.secret_id, "AKIDexample");
        assert_eq!(config.secret_key, "secret");
        assert_eq!(config.region, "ap-shanghai");
        assert_eq!(config.domain, "tencentcloudapi.com");
        assert_eq!(config.protocol, "https");
        assert!(config.security_token.is_none());
        assert_eq!(
            config.service_endpoint("redis"),
            "https://redis.tencentcloudapi.com"
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn config_requires_secret_id() {
        clear_env();
        std::env::set_var(SECRET_KEY_ENV, "secret");

        let err = ProviderConfig::from_env().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                field: "secret_id",
                env: SECRET_ID_ENV
            }
        );
        assert!(err.to_string().contains("secret_id is required"));

        clear_env();
    }

    #[test]
    #[serial]
    fn config_requires_secret_key() {
        clear_env();
        std::env::set_var(SECRET_ID_ENV, "AKIDexample");
        std::env::set_var(SECRET_KEY_ENV, "   ");

        let err = ProviderConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TENCENTCLOUD_SECRET_KEY"));

        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_values_override_env() {
        clear_env();
        std::env::set_var(SECRET_ID_ENV, "from-env");
        std::env::set_var(REGION_ENV, "ap-beijing");

        let config = ProviderConfig::builder()
            .secret_id("explicit")
            .secret_key("key")
            .region("ap-singapore")
            .endpoint("http://127.0.0.1:8080/")
            .build()
            .unwrap();

        assert_eq!(config.secret_id, "explicit");
        assert_eq!(config.region, "ap-singapore");
        assert_eq!(config.service_endpoint("rum"), "http://127.0.0.1:8080");

        clear_env();
    }

    #[test]
    #[serial]
    fn config_rejects_unknown_protocol() {
        clear_env();

        let err = ProviderConfig::builder()
            .secret_id("id")
            .secret_key("key")
            .protocol("ftp")
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { field: "protocol", .. }));
    }

    #[test]
    #[serial]
    fn debug_output_redacts_secrets() {
        clear_env();
        let config = ProviderConfig::builder()
            .secret_id("id")
            .secret_key("very-secret")
            .security_token("token-value")
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token-value"));
    }
}
