//! Common types for the Tencent Cloud API v3 envelope

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::ApiError;

/// A product endpoint and the API version it is called with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub name: &'static str,
    pub version: &'static str,
}

impl Service {
    pub const REDIS: Service = Service {
        name: "redis",
        version: "2018-04-12",
    };

    pub const RUM: Service = Service {
        name: "rum",
        version: "2021-06-22",
    };
}

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "Response")]
    pub response: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

/// Unwrap `{"Response": {...}}`, turning an embedded `Error` into [`ApiError::Sdk`]
pub fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| ApiError::ParseError(format!("invalid response envelope: {}", e)))?;

    let body: ErrorBody = serde_json::from_value(envelope.response.clone())
        .map_err(|e| ApiError::ParseError(format!("invalid response body: {}", e)))?;

    if let Some(error) = body.error {
        return Err(ApiError::Sdk {
            code: error.code,
            message: error.message,
            request_id: body.request_id,
        });
    }

    serde_json::from_value(envelope.response).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
        ApiError::ParseError(format!("Failed to parse response: {}", e))
    })
}
