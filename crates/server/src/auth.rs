use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use itinera_core::config::{AuthConfig, AuthMode, StaticToken};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("auth provider unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("auth is misconfigured: {0}")]
    Misconfigured(String),
}

/// Exchanges an `Authorization` header for the caller's identity.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, authorization: &str) -> Result<UserIdentity, AuthError>;
}

pub fn verifier_from_config(config: &AuthConfig) -> Result<Arc<dyn AuthVerifier>, AuthError> {
    match config.mode {
        AuthMode::Supabase => Ok(Arc::new(SupabaseAuthVerifier::from_config(config)?)),
        AuthMode::Static => Ok(Arc::new(StaticTokenVerifier::new(config.static_tokens.clone()))),
    }
}

fn bearer_token(authorization: &str) -> Result<&str, AuthError> {
    let trimmed = authorization.trim();
    let (scheme, token) = trimmed.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Validates the caller's access token against the Supabase auth API.
pub struct SupabaseAuthVerifier {
    http: Client,
    base_url: String,
    anon_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
}

impl SupabaseAuthVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let base_url = config
            .supabase_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AuthError::Misconfigured("auth.supabase_url is not set".to_string()))?;
        let anon_key = config.supabase_anon_key.clone().ok_or_else(|| {
            AuthError::Misconfigured("auth.supabase_anon_key is not set".to_string())
        })?;
        let http = Client::builder().timeout(AUTH_TIMEOUT).build()?;

        Ok(Self { http, base_url, anon_key })
    }
}

#[async_trait]
impl AuthVerifier for SupabaseAuthVerifier {
    async fn verify(&self, authorization: &str) -> Result<UserIdentity, AuthError> {
        let token = bearer_token(authorization)?;

        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token)
            .header("apikey", self.anon_key.expose_secret())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let user: SupabaseUser = response.json().await?;
                Ok(UserIdentity { user_id: user.id })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::Rejected("session is invalid or expired".to_string()))
            }
            status => Err(AuthError::Rejected(format!("auth provider answered {status}"))),
        }
    }
}

/// Fixed token table for local and test deployments.
pub struct StaticTokenVerifier {
    tokens: Vec<StaticToken>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: Vec<StaticToken>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, authorization: &str) -> Result<UserIdentity, AuthError> {
        let token = bearer_token(authorization)?;
        self.tokens
            .iter()
            .find(|candidate| candidate.token.expose_secret() == token)
            .map(|candidate| UserIdentity { user_id: candidate.user_id.clone() })
            .ok_or_else(|| AuthError::Rejected("unknown token".to_string()))
    }
}
