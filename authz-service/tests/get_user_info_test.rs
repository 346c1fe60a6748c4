mod common;

use authz_service::models::{CustomClaims, User};
use authz_service::providers::IdentityProvider;
use authz_service::services::{authorize_login, AuthzError, Decision};
use common::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_profile(server: &MockServer, login: &str) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("access_token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": login,
            "email": "mail@example.com",
            "name": "My Name",
            "id": 42,
            "created_at": "2011-01-25T18:44:36Z",
            "updated_at": 1700000000
        })))
        .mount(server)
        .await;
}

async fn mock_org(server: &MockServer, org: &str, user: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{}/members/{}", org, user)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn mock_team(server: &MockServer, org: &str, team: &str, user: &str, state: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/{}/teams/{}/memberships/{}", org, team, user)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": state })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_user_info() {
    let server = MockServer::start().await;
    mock_profile(&server, "myusername").await;
    mock_org(&server, "myOtherOrg", "myusername", 204).await;
    mock_team(&server, "myorg", "myteam", "myusername", "active").await;

    let ctx = context(&server, team_whitelist(&["myOtherOrg", "myorg/myteam"]));
    let mut user = User::default();
    let mut claims = CustomClaims::default();

    provider(&server)
        .get_user_info(&ctx, &mut user, &mut claims, &provider_tokens())
        .await
        .unwrap();

    assert_eq!(user.username, "myusername");
    assert_eq!(user.email, "mail@example.com");
    assert_eq!(user.name, "My Name");
    assert_eq!(user.id, 42);
    assert_eq!(user.created_on, 1295981076);
    assert_eq!(user.last_update, 1700000000);
    assert_eq!(user.team_memberships, vec!["myOtherOrg", "myorg/myteam"]);
    assert_url_called(
        &server,
        "/orgs/myorg/teams/myteam/memberships/myusername?access_token=123",
    )
    .await;
    assert_url_called(&server, "/orgs/myOtherOrg/members/myusername?access_token=123").await;
}

#[tokio::test]
async fn test_active_team_member_is_authorized() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    mock_team(&server, "org1", "team1", "testuser", "active").await;

    let ctx = context(&server, team_whitelist(&["org1/team1"]));
    let outcome = authorize_login(&provider(&server), &ctx, &provider_tokens())
        .await
        .unwrap();

    assert!(outcome.is_allowed());
    assert_eq!(outcome.decision, Decision::TeamMember("org1/team1".to_string()));
    assert_eq!(outcome.user.team_memberships, vec!["org1/team1"]);
}

#[tokio::test]
async fn test_org_non_member_is_denied_without_public_lookup() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    mock_org(&server, "myorg", "testuser", 404).await;

    let ctx = context(&server, team_whitelist(&["myorg"]));
    let outcome = authorize_login(&provider(&server), &ctx, &provider_tokens())
        .await
        .unwrap();

    assert!(!outcome.is_allowed());
    assert_eq!(outcome.decision, Decision::Denied);
    assert!(outcome.user.team_memberships.is_empty());
    assert_url_called(&server, "/orgs/myorg/members/testuser?access_token=123").await;
    assert_path_not_called(&server, "public_members").await;
}

#[tokio::test]
async fn test_public_org_member_is_authorized() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    let location = format!("{}/orgs/myorg/public_members/testuser", server.uri());
    Mock::given(method("GET"))
        .and(path("/orgs/myorg/members/testuser"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", location.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/myorg/public_members/testuser"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let ctx = context(&server, team_whitelist(&["myorg"]));
    let outcome = authorize_login(&provider(&server), &ctx, &provider_tokens())
        .await
        .unwrap();

    assert!(outcome.is_allowed());
    assert_eq!(outcome.user.team_memberships, vec!["myorg"]);
    assert_url_called(&server, "/orgs/myorg/members/testuser?access_token=123").await;
    assert_url_called(&server, "/orgs/myorg/public_members/testuser").await;
}

#[tokio::test]
async fn test_memberships_keep_configured_order() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    // The first entry answers last.
    Mock::given(method("GET"))
        .and(path("/orgs/org1/members/testuser"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;
    mock_team(&server, "org2", "team2", "testuser", "active").await;
    mock_org(&server, "org3", "testuser", 404).await;
    mock_org(&server, "org4", "testuser", 204).await;

    let ctx = context(
        &server,
        team_whitelist(&["org1", "org2/team2", "org3", "org4", "org1"]),
    );
    let mut user = User::default();

    provider(&server)
        .get_user_info(&ctx, &mut user, &mut CustomClaims::default(), &provider_tokens())
        .await
        .unwrap();

    assert_eq!(user.team_memberships, vec!["org1", "org2/team2", "org4"]);
}

#[tokio::test]
async fn test_probe_failure_is_indeterminate_and_keeps_partial_result() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    mock_org(&server, "org1", "testuser", 204).await;
    mock_org(&server, "org2", "testuser", 500).await;

    let ctx = context(&server, team_whitelist(&["org1", "org2"]));
    let mut user = User::default();

    let err = provider(&server)
        .get_user_info(&ctx, &mut user, &mut CustomClaims::default(), &provider_tokens())
        .await
        .unwrap_err();

    match &err {
        AuthzError::MembershipIndeterminate { entry, source } => {
            assert_eq!(entry, "org2");
            assert!(matches!(**source, AuthzError::UnexpectedStatus { .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.to_string().contains(TOKEN));
    assert_eq!(user.username, "testuser");
    assert_eq!(user.team_memberships, vec!["org1"]);
}

#[tokio::test]
async fn test_probe_failure_is_not_a_denial() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    mock_org(&server, "org1", "testuser", 502).await;

    let ctx = context(&server, team_whitelist(&["org1"]));
    let result = authorize_login(&provider(&server), &ctx, &provider_tokens()).await;

    assert!(matches!(
        result,
        Err(AuthzError::MembershipIndeterminate { .. })
    ));
}

#[tokio::test]
async fn test_profile_without_login_is_mapping_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "email": "a@b.c" })))
        .mount(&server)
        .await;

    let ctx = context(&server, team_whitelist(&["org1"]));
    let mut user = User::default();

    let err = provider(&server)
        .get_user_info(&ctx, &mut user, &mut CustomClaims::default(), &provider_tokens())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthzError::Mapping(_)));
    assert_path_not_called(&server, "/orgs/").await;
}

#[tokio::test]
async fn test_rejected_token_is_token_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ctx = context(&server, team_whitelist(&["org1"]));
    let result = authorize_login(&provider(&server), &ctx, &provider_tokens()).await;

    assert!(matches!(result, Err(AuthzError::TokenExchange(_))));
}

#[tokio::test]
async fn test_domain_whitelist_needs_no_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "testuser",
            "email": "someone@sub.domain1"
        })))
        .mount(&server)
        .await;

    let ctx = context(&server, team_whitelist(&[]));
    let outcome = authorize_login(&provider(&server), &ctx, &provider_tokens())
        .await
        .unwrap();

    assert_eq!(outcome.decision, Decision::DomainWhitelisted("domain1".to_string()));
    assert_eq!(requested_urls(&server).await.len(), 1);
}

/// Hands out an expired token unless asked to refresh.
struct ExpiringTokenExchange;

#[async_trait::async_trait]
impl authz_service::providers::TokenExchange for ExpiringTokenExchange {
    async fn prepare_tokens_and_client(
        &self,
        _ctx: &authz_service::providers::RequestContext,
        _tokens: &authz_service::models::ProviderTokens,
        force_refresh: bool,
    ) -> Result<(reqwest::Client, authz_service::models::ProviderToken), AuthzError> {
        if force_refresh {
            return Ok((test_client(), token()));
        }
        let mut stale = authz_service::models::ProviderToken::new("stale");
        stale.expiry = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
        Ok((test_client(), stale))
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_probing() {
    let server = MockServer::start().await;
    mock_profile(&server, "testuser").await;
    mock_org(&server, "org1", "testuser", 204).await;

    let provider = authz_service::providers::GitHubProvider::new(
        ExpiringTokenExchange,
        prober(&server),
        &probe_config(),
    );
    let ctx = context(&server, team_whitelist(&["org1"]));
    let mut user = User::default();

    provider
        .get_user_info(&ctx, &mut user, &mut CustomClaims::default(), &provider_tokens())
        .await
        .unwrap();

    assert_eq!(user.team_memberships, vec!["org1"]);
    assert_path_not_called(&server, "access_token=stale").await;
}
