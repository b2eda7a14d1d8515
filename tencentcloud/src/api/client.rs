use opwait::{RateLimiter, Unlimited};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::common::{parse_envelope, Service};
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats, RequestOutcome};
use super::sign::{self, Credential};
use crate::config::ProviderConfig;

/// Tencent Cloud API v3 client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ProviderConfig,
    credential: Credential,
    limiter: Arc<dyn RateLimiter>,
    pool_manager: ConnectionPoolManager,
}

impl Client {
    /// Create a client without request throttling
    pub fn new(config: ProviderConfig) -> Result<Self, ApiError> {
        Self::with_config(config, Arc::new(Unlimited), ConnectionPoolConfig::default())
    }

    /// Create a client that acquires `limiter` for every action it sends
    pub fn with_config(
        config: ProviderConfig,
        limiter: Arc<dyn RateLimiter>,
        pool_config: ConnectionPoolConfig,
    ) -> Result<Self, ApiError> {
        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client()?;

        let credential = Credential {
            secret_id: config.secret_id.clone(),
            secret_key: config.secret_key.clone(),
            token: config.security_token.clone(),
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                config,
                credential,
                limiter,
                pool_manager,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.config.region
    }

    /// Get connection pool statistics
    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// CRS (Redis) API operations
    pub fn redis(&self) -> super::crs::RedisApi<'_> {
        super::crs::RedisApi::new(self)
    }

    /// RUM API operations
    pub fn rum(&self) -> super::rum::RumApi<'_> {
        super::rum::RumApi::new(self)
    }

    /// Send one signed action and unwrap its `Response` envelope
    pub async fn call<B, T>(&self, service: Service, action: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let endpoint = self.inner.config.service_endpoint(service.name);
        let host = host_of(&endpoint)?;
        let payload = serde_json::to_string(body)
            .map_err(|e| ApiError::ParseError(format!("Failed to encode request: {}", e)))?;

        let timestamp = chrono::Utc::now().timestamp();
        let authorization = sign::authorization(
            &self.inner.credential,
            service.name,
            &host,
            timestamp,
            &payload,
        )?;

        self.inner.limiter.acquire(action).await;
        tracing::debug!("api[{}] request to {}, body [{}]", action, endpoint, payload);

        let mut request = self
            .inner
            .http_client
            .post(format!("{}/", endpoint))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, sign::CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", service.version)
            .header("X-TC-Region", self.region())
            .header("X-TC-Timestamp", timestamp.to_string());
        if let Some(token) = &self.inner.credential.token {
            request = request.header("X-TC-Token", token);
        }

        let response = match request.body(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                self.inner.pool_manager.record_request(RequestOutcome::Failed).await;
                return Err(self.map_transport_error(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let outcome = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                RequestOutcome::Throttled
            } else {
                RequestOutcome::Failed
            };
            self.inner.pool_manager.record_request(outcome).await;
            return Err(self.handle_error_response(response).await);
        }

        let text = response.text().await?;
        tracing::debug!("api[{}] response body [{}]", action, text);

        let result = parse_envelope(&text);
        let outcome = match &result {
            Ok(_) => RequestOutcome::Success,
            Err(e) if e.has_code("RequestLimitExceeded") => RequestOutcome::Throttled,
            Err(_) => RequestOutcome::Failed,
        };
        self.inner.pool_manager.record_request(outcome).await;

        if let Err(e) = &result {
            tracing::error!("api[{}] fail, reason[{}]", action, e);
        }
        result
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.pool_manager.request_timeout().as_secs())
        } else if e.is_connect() {
            ApiError::ServiceUnavailable
        } else {
            ApiError::Request(e)
        }
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return ApiError::AuthError;
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited;
        }
        if status.is_server_error() {
            return ApiError::ServiceUnavailable;
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        ApiError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

fn host_of(endpoint: &str) -> Result<String, ApiError> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| ApiError::Signing(format!("invalid endpoint {}: {}", endpoint, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| ApiError::Signing(format!("endpoint {} has no host", endpoint)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
