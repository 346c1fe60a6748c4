//! Shared fixtures for authz-service integration tests.
//!
//! A `wiremock` server stands in for the GitHub API; every request it
//! receives is recorded so tests can assert which endpoints were called.

#![allow(dead_code)]

use async_trait::async_trait;
use authz_service::config::{AuthzSnapshot, ProbeConfig, WhitelistConfig};
use authz_service::models::{ProviderToken, ProviderTokens, User};
use authz_service::providers::{GitHubProvider, RequestContext, TokenExchange};
use authz_service::services::{AuthzError, MembershipProber};
use reqwest::{redirect, Client, Url};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const TOKEN: &str = "123";

/// Token exchange that always hands out the same client and token.
pub struct FixedTokenExchange {
    pub client: Client,
    pub token: ProviderToken,
}

#[async_trait]
impl TokenExchange for FixedTokenExchange {
    async fn prepare_tokens_and_client(
        &self,
        _ctx: &RequestContext,
        _tokens: &ProviderTokens,
        _force_refresh: bool,
    ) -> Result<(Client, ProviderToken), AuthzError> {
        Ok((self.client.clone(), self.token.clone()))
    }
}

pub fn test_client() -> Client {
    Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

pub fn probe_config() -> ProbeConfig {
    ProbeConfig {
        timeout: Duration::from_secs(2),
        max_retries: 0,
        concurrency: 4,
    }
}

pub fn token() -> ProviderToken {
    ProviderToken::new(TOKEN)
}

pub fn test_user() -> User {
    User {
        username: "testuser".to_string(),
        email: "test@example.com".to_string(),
        ..Default::default()
    }
}

pub fn prober(server: &MockServer) -> MembershipProber {
    MembershipProber::new(Url::parse(&server.uri()).unwrap(), &probe_config())
}

pub fn provider(server: &MockServer) -> GitHubProvider<FixedTokenExchange> {
    GitHubProvider::new(
        FixedTokenExchange {
            client: test_client(),
            token: token(),
        },
        prober(server),
        &probe_config(),
    )
}

pub fn team_whitelist(teams: &[&str]) -> WhitelistConfig {
    WhitelistConfig::from_parts(false, Vec::<String>::new(), ["domain1"], teams).unwrap()
}

pub fn context(server: &MockServer, whitelist: WhitelistConfig) -> RequestContext {
    RequestContext::new(
        "test-request",
        Arc::new(AuthzSnapshot {
            whitelist,
            user_info_url: format!("{}/user?access_token=", server.uri()),
        }),
    )
}

pub fn provider_tokens() -> ProviderTokens {
    ProviderTokens::with_access_token(TOKEN)
}

/// Every URL the fake provider received, in arrival order.
pub async fn requested_urls(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.to_string())
        .collect()
}

/// Path and query of every request the fake provider received. The mock
/// server records URLs against its own placeholder host, so only the part
/// after the authority is comparable.
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect()
}

pub async fn assert_url_called(server: &MockServer, path_and_query: &str) {
    let paths = requested_paths(server).await;
    assert!(
        paths.iter().any(|called| called == path_and_query),
        "Expected {} to have been called, but got only {:?}",
        path_and_query,
        paths
    );
}

pub async fn assert_path_not_called(server: &MockServer, fragment: &str) {
    let urls = requested_urls(server).await;
    assert!(
        urls.iter().all(|url| !url.contains(fragment)),
        "Expected nothing matching {} to be called, but got {:?}",
        fragment,
        urls
    );
}
