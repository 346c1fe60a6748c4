//! Identity provider strategies.
//!
//! Each provider turns an authenticated login into a populated [`User`]. The
//! token exchange is a separate seam so tests and alternative acquisition
//! strategies (fresh exchange, refresh) can supply the client and token.

pub mod github;

pub use github::GitHubProvider;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AuthzConfig, AuthzSnapshot, ProviderKind};
use crate::models::{CustomClaims, ProviderToken, ProviderTokens, User};
use crate::services::error::AuthzError;
use crate::services::MembershipProber;

/// Per-request state handed to a provider.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Configuration captured when the request arrived.
    pub snapshot: Arc<AuthzSnapshot>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, snapshot: Arc<AuthzSnapshot>) -> Self {
        Self {
            request_id: request_id.into(),
            snapshot,
        }
    }
}

/// Supplies an authenticated client and bearer token for one request.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn prepare_tokens_and_client(
        &self,
        ctx: &RequestContext,
        tokens: &ProviderTokens,
        force_refresh: bool,
    ) -> Result<(Client, ProviderToken), AuthzError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Populate `user` in place. A returned error means the authorization
    /// decision is indeterminate; fields already written are kept.
    async fn get_user_info(
        &self,
        ctx: &RequestContext,
        user: &mut User,
        claims: &mut CustomClaims,
        tokens: &ProviderTokens,
    ) -> Result<(), AuthzError>;
}

/// Uses the access token obtained by the OAuth callback as-is.
///
/// The client never follows redirects: the org probe inspects them itself.
#[derive(Debug, Clone)]
pub struct StaticTokenExchange {
    client: Client,
}

impl StaticTokenExchange {
    pub fn new(timeout: Duration) -> Result<Self, AuthzError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("authz-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthzError::TokenExchange(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TokenExchange for StaticTokenExchange {
    async fn prepare_tokens_and_client(
        &self,
        _ctx: &RequestContext,
        tokens: &ProviderTokens,
        force_refresh: bool,
    ) -> Result<(Client, ProviderToken), AuthzError> {
        if force_refresh {
            return Err(AuthzError::TokenExchange(
                "token refresh is not supported for static tokens".to_string(),
            ));
        }

        let access_token = tokens
            .access_token
            .as_ref()
            .map(|t| t.expose_secret().trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthzError::TokenExchange("no provider access token".to_string()))?;

        let mut token = ProviderToken::new(access_token);
        token.refresh_token = tokens.refresh_token.clone();

        Ok((self.client.clone(), token))
    }
}

/// Build the provider selected by configuration.
pub fn build_provider(config: &AuthzConfig) -> Result<Arc<dyn IdentityProvider>, AuthzError> {
    match config.provider.kind {
        ProviderKind::GitHub => {
            let exchange = StaticTokenExchange::new(config.probe.timeout)?;
            let prober = MembershipProber::new(config.provider.api_base_url.clone(), &config.probe);
            Ok(Arc::new(GitHubProvider::new(exchange, prober, &config.probe)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new("req-1", Arc::new(AuthzSnapshot::default()))
    }

    #[tokio::test]
    async fn test_static_exchange_uses_callback_token() {
        let exchange = StaticTokenExchange::new(Duration::from_secs(1)).unwrap();
        let (_, token) = exchange
            .prepare_tokens_and_client(&ctx(), &ProviderTokens::with_access_token("123"), false)
            .await
            .unwrap();
        assert_eq!(token.access_token(), "123");
    }

    #[tokio::test]
    async fn test_static_exchange_requires_token() {
        let exchange = StaticTokenExchange::new(Duration::from_secs(1)).unwrap();

        let missing = exchange
            .prepare_tokens_and_client(&ctx(), &ProviderTokens::default(), false)
            .await;
        assert!(matches!(missing, Err(AuthzError::TokenExchange(_))));

        let blank = exchange
            .prepare_tokens_and_client(&ctx(), &ProviderTokens::with_access_token("  "), false)
            .await;
        assert!(matches!(blank, Err(AuthzError::TokenExchange(_))));
    }

    #[tokio::test]
    async fn test_static_exchange_cannot_refresh() {
        let exchange = StaticTokenExchange::new(Duration::from_secs(1)).unwrap();
        let result = exchange
            .prepare_tokens_and_client(&ctx(), &ProviderTokens::with_access_token("123"), true)
            .await;
        assert!(matches!(result, Err(AuthzError::TokenExchange(_))));
    }
}
