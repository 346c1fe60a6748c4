//! GitHub identity provider.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode, Url};

use super::{IdentityProvider, RequestContext, TokenExchange};
use crate::config::{ProbeConfig, TeamEntry};
use crate::models::{CustomClaims, Membership, MembershipResult, ProviderToken, ProviderTokens, User};
use crate::services::error::AuthzError;
use crate::services::upstream::{redact, Upstream};
use crate::services::{GitHubProfile, MembershipProber};

pub struct GitHubProvider<T> {
    exchange: T,
    prober: MembershipProber,
    upstream: Upstream,
    concurrency: usize,
}

impl<T: TokenExchange> GitHubProvider<T> {
    pub fn new(exchange: T, prober: MembershipProber, probe: &ProbeConfig) -> Self {
        Self {
            exchange,
            prober,
            upstream: Upstream::new(probe),
            concurrency: probe.concurrency.max(1),
        }
    }

    /// GET the profile; the configured user-info URL ends where the token
    /// goes.
    #[tracing::instrument(skip_all)]
    async fn fetch_profile(
        &self,
        client: &Client,
        user_info_url: &str,
        token: &ProviderToken,
    ) -> Result<GitHubProfile, AuthzError> {
        let url = Url::parse(&format!("{}{}", user_info_url, token.access_token()))
            .map_err(|e| AuthzError::InvalidUrl(format!("user info url: {}", e)))?;

        let response = self.upstream.get(client, &url, "user_profile").await?;
        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| AuthzError::Transport {
                    url: redact(&url),
                    source: e.without_url(),
                })?;
                GitHubProfile::from_slice(&body)
            }
            StatusCode::UNAUTHORIZED => Err(AuthzError::TokenExchange(
                "provider rejected the access token".to_string(),
            )),
            status => Err(AuthzError::UnexpectedStatus {
                url: redact(&url),
                status,
            }),
        }
    }

    async fn probe_entry(
        &self,
        client: &Client,
        user: &User,
        entry: &TeamEntry,
        token: &ProviderToken,
    ) -> MembershipResult {
        match entry.team() {
            Some(team) => {
                self.prober
                    .check_team_membership(client, user, entry.org(), team, token)
                    .await
            }
            None => {
                self.prober
                    .check_org_membership(client, user, entry.org(), token)
                    .await
            }
        }
    }
}

#[async_trait]
impl<T: TokenExchange> IdentityProvider for GitHubProvider<T> {
    fn name(&self) -> &'static str {
        "github"
    }

    #[tracing::instrument(skip_all, fields(provider = "github", request_id = %ctx.request_id))]
    async fn get_user_info(
        &self,
        ctx: &RequestContext,
        user: &mut User,
        _claims: &mut CustomClaims,
        tokens: &ProviderTokens,
    ) -> Result<(), AuthzError> {
        let (mut client, mut token) = self
            .exchange
            .prepare_tokens_and_client(ctx, tokens, false)
            .await?;
        if token.is_expired(Utc::now()) {
            tracing::debug!("Provider token expired, forcing refresh");
            (client, token) = self
                .exchange
                .prepare_tokens_and_client(ctx, tokens, true)
                .await?;
        }

        let profile = self
            .fetch_profile(&client, &ctx.snapshot.user_info_url, &token)
            .await?;
        profile.apply_to(user);
        tracing::debug!(user = %user.username, "GitHub profile mapped");

        // Probes run concurrently but are consumed in whitelist order, so
        // memberships are appended deterministically. Returning early drops
        // the stream and cancels whatever is still in flight.
        let identity = user.clone();
        let (client, identity, token) = (&client, &identity, &token);
        let pending: Vec<_> = ctx
            .snapshot
            .whitelist
            .team_whitelist
            .iter()
            .map(|entry| async move {
                (entry, self.probe_entry(client, identity, entry, token).await)
            })
            .collect();
        let mut probes = stream::iter(pending).buffered(self.concurrency);

        while let Some((entry, result)) = probes.next().await {
            match result {
                Ok(Membership::Member) => {
                    tracing::debug!(entry = %entry, "User is a member");
                    user.team_memberships.push(entry.as_str().to_string());
                }
                Ok(Membership::NotMember) => {}
                Err(e) => return Err(AuthzError::indeterminate(entry.as_str(), e)),
            }
        }

        Ok(())
    }
}
