//! Bearer-token authentication
//!
//! Tokens resolve to a user id through the identity collaborator.
//! Rejection is an authorization failure (403), distinct from generic
//! server errors.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use weeklog_core::{Error, Result, TokenVerifier};

use crate::http::ApiError;
use crate::state::AppState;

/// The authenticated user id, inserted into request extensions by the
/// auth middleware
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware applied to every /api route
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = extract_bearer(header) else {
        return ApiError(Error::Authorization("Missing bearer token".to_string()))
            .into_response();
    };

    match state.verifier.verify(token).await {
        Ok(user_id) => {
            req.extensions_mut().insert(AuthedUser(user_id));
            next.run(req).await
        },
        Err(e) => ApiError(e).into_response(),
    }
}

/// Verifier backed by an external identity service. The service is
/// expected to answer GET /user with the token forwarded and a JSON
/// body carrying the user id.
pub struct HttpTokenVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenVerifier {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    user_id: String,
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/user", self.endpoint.trim_end_matches('/')))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Authorization(format!("Identity service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Authorization("Invalid token".to_string()));
        }

        let identity: IdentityResponse = response
            .json()
            .await
            .map_err(|e| Error::Authorization(format!("Malformed identity response: {}", e)))?;

        Ok(identity.user_id)
    }
}

/// Development verifier: any non-empty token is its own user id. Only
/// wired when no identity endpoint is configured.
pub struct DevTokenVerifier;

#[async_trait]
impl TokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String> {
        if token.is_empty() {
            return Err(Error::Authorization("Empty token".to_string()));
        }
        Ok(token.to_string())
    }
}
