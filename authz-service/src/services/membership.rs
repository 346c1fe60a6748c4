//! Membership probes against the GitHub REST API.
//!
//! GitHub answers "is this user in the org" in three different ways
//! depending on what the token may see:
//! - `204` when the caller can see the membership,
//! - `404` when the user is not a member,
//! - `302` to the org's public-members listing when the caller lacks
//!   visibility; that listing is unauthenticated and answers `204`/`404`.
//!
//! Team membership is a JSON document whose `state` must be `active`.

use reqwest::{header::LOCATION, Client, Response, StatusCode, Url};
use serde::Deserialize;
use service_core::http::RetryConfig;

use crate::config::ProbeConfig;
use crate::models::{Membership, MembershipResult, ProviderToken, User};
use crate::services::error::AuthzError;
use crate::services::metrics::record_probe;
use crate::services::upstream::{redact, Upstream};

#[derive(Debug, Deserialize)]
struct TeamMembershipState {
    state: Option<String>,
}

/// Issues membership queries for a single provider API root.
#[derive(Debug, Clone)]
pub struct MembershipProber {
    api_base_url: Url,
    upstream: Upstream,
}

impl MembershipProber {
    pub fn new(api_base_url: Url, probe: &ProbeConfig) -> Self {
        Self {
            api_base_url,
            upstream: Upstream::new(probe),
        }
    }

    /// Replace the retry policy (tests use `RetryConfig::no_retry`).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.upstream = self.upstream.with_retry(retry);
        self
    }

    /// Is `user` a member of `org`?
    ///
    /// A redirect means the token cannot see the membership; the probe then
    /// asks the public-members endpoint without the token.
    #[tracing::instrument(skip_all, fields(user = %user.username, org = %org))]
    pub async fn check_org_membership(
        &self,
        client: &Client,
        user: &User,
        org: &str,
        token: &ProviderToken,
    ) -> MembershipResult {
        let result = self.probe_org(client, user, org, token).await;
        log_result("org", &result);
        result
    }

    /// Is `user` an active member of `org/team`?
    #[tracing::instrument(skip_all, fields(user = %user.username, org = %org, team = %team))]
    pub async fn check_team_membership(
        &self,
        client: &Client,
        user: &User,
        org: &str,
        team: &str,
        token: &ProviderToken,
    ) -> MembershipResult {
        let result = self.probe_team(client, user, org, team, token).await;
        log_result("team", &result);
        result
    }

    async fn probe_org(
        &self,
        client: &Client,
        user: &User,
        org: &str,
        token: &ProviderToken,
    ) -> MembershipResult {
        let url = with_token(
            self.endpoint(&["orgs", org, "members", &user.username]),
            token,
        );
        let response = self.upstream.get(client, &url, "org_membership").await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Membership::NotMember),
            status if status.is_success() => Ok(Membership::Member),
            status if status.is_redirection() => {
                let public_url = self.public_members_url(&url, &response, user, org);
                tracing::debug!(
                    url = %redact(&public_url),
                    "Org membership not visible to token, checking public members"
                );
                self.check_public_membership(client, &public_url).await
            }
            status => Err(AuthzError::UnexpectedStatus {
                url: redact(&url),
                status,
            }),
        }
    }

    async fn probe_team(
        &self,
        client: &Client,
        user: &User,
        org: &str,
        team: &str,
        token: &ProviderToken,
    ) -> MembershipResult {
        let url = with_token(
            self.endpoint(&["orgs", org, "teams", team, "memberships", &user.username]),
            token,
        );
        let response = self.upstream.get(client, &url, "team_membership").await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Membership::NotMember),
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| AuthzError::Transport {
                    url: redact(&url),
                    source: e.without_url(),
                })?;
                let membership: TeamMembershipState =
                    serde_json::from_slice(&body).map_err(|e| AuthzError::InvalidResponse {
                        url: redact(&url),
                        message: e.to_string(),
                    })?;
                let state = membership.state.ok_or_else(|| AuthzError::InvalidResponse {
                    url: redact(&url),
                    message: "team membership has no state".to_string(),
                })?;
                tracing::debug!(state = %state, "Team membership state");
                Ok(Membership::from(state == "active"))
            }
            status => Err(AuthzError::UnexpectedStatus {
                url: redact(&url),
                status,
            }),
        }
    }

    /// Second hop of the org probe. No token is sent.
    async fn check_public_membership(&self, client: &Client, url: &Url) -> MembershipResult {
        let response = self.upstream.get(client, url, "org_public_membership").await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Membership::NotMember),
            status if status.is_success() => Ok(Membership::Member),
            status => Err(AuthzError::UnexpectedStatus {
                url: redact(url),
                status,
            }),
        }
    }

    /// The redirect target, or the canonical public-members URL when the
    /// provider omitted a usable `Location`.
    fn public_members_url(
        &self,
        request_url: &Url,
        response: &Response,
        user: &User,
        org: &str,
    ) -> Url {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| request_url.join(location).ok())
            .unwrap_or_else(|| self.endpoint(&["orgs", org, "public_members", &user.username]))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn with_token(mut url: Url, token: &ProviderToken) -> Url {
    url.query_pairs_mut()
        .append_pair("access_token", token.access_token());
    url
}

fn log_result(kind: &'static str, result: &MembershipResult) {
    match result {
        Ok(membership) => {
            tracing::debug!(membership = membership.as_str(), "Membership resolved");
            record_probe(kind, membership.as_str());
        }
        Err(e) => {
            tracing::warn!(error = %e, "Membership probe failed");
            record_probe(kind, "error");
        }
    }
}
