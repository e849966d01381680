//! Caller identity resolution
//!
//! Requests may carry an `Authorization: Bearer <jwt>` header issued by the
//! project management API. The monitoring paths only need the caller id (and
//! the role for admin endpoints), and must keep working when the token is
//! missing or broken, so resolution is best-effort.

use crate::error::MonitorError;
use crate::types::{Caller, CallerId};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Claims read from access tokens. Unknown claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject; the API issues the user id as a string, older tokens as a number
    pub sub: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    /// Parse the subject into a numeric caller id
    pub fn caller_id(&self) -> Result<CallerId, MonitorError> {
        let parsed = match &self.sub {
            serde_json::Value::String(raw) => raw.trim().parse().ok(),
            serde_json::Value::Number(number) => number.as_i64(),
            _ => None,
        };

        parsed.ok_or_else(|| MonitorError::InvalidToken {
            reason: format!("subject {} is not a user id", self.sub),
        })
    }
}

/// Trait for turning a bearer token into a caller
#[async_trait]
pub trait CallerResolver: Send + Sync {
    /// Validate a raw token and return the caller it identifies
    async fn resolve(&self, token: &str) -> Result<Caller, MonitorError>;
}

/// HS256 JWT resolver sharing the API's signing secret
pub struct JwtCallerResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCallerResolver {
    /// Create a resolver for tokens signed with `secret`
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Access tokens from the API never expire, so `exp` is optional
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl CallerResolver for JwtCallerResolver {
    async fn resolve(&self, token: &str) -> Result<Caller, MonitorError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| MonitorError::InvalidToken {
                reason: e.to_string(),
            },
        )?;

        let id = token_data.claims.caller_id()?;
        Ok(Caller {
            id,
            role: token_data.claims.role,
        })
    }
}

/// Resolver backed by a fixed token table, for tests and local runs
#[derive(Debug, Default)]
pub struct StaticCallerResolver {
    callers: HashMap<String, Caller>,
}

impl StaticCallerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a caller
    pub fn with_token(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.callers.insert(token.into(), caller);
        self
    }
}

#[async_trait]
impl CallerResolver for StaticCallerResolver {
    async fn resolve(&self, token: &str) -> Result<Caller, MonitorError> {
        self.callers
            .get(token)
            .cloned()
            .ok_or_else(|| MonitorError::InvalidToken {
                reason: "unknown token".to_string(),
            })
    }
}

/// Extract the token from an `Authorization: Bearer ...` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller behind a request, treating every failure as anonymous
pub async fn resolve_optional_caller(
    resolver: &dyn CallerResolver,
    headers: &HeaderMap,
) -> Option<Caller> {
    let token = extract_bearer_token(headers)?;

    match resolver.resolve(token).await {
        Ok(caller) => Some(caller),
        Err(e) => {
            debug!("Ignoring unusable bearer token: {}", e);
            None
        }
    }
}
