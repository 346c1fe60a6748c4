use crate::models::{CustomClaims, ProviderTokens, User};
use crate::providers::{IdentityProvider, RequestContext};
use crate::services::error::AuthzError;
use crate::services::metrics::record_decision;
use crate::services::whitelist::{evaluate, Decision, MembershipFacts};

/// Result of a complete login authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    pub user: User,
    pub decision: Decision,
}

impl AuthorizationOutcome {
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }
}

/// Resolve the user through `provider` and evaluate the whitelist captured
/// in `ctx`. An error means the decision is indeterminate, not denied.
#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id))]
pub async fn authorize_login<P>(
    provider: &P,
    ctx: &RequestContext,
    tokens: &ProviderTokens,
) -> Result<AuthorizationOutcome, AuthzError>
where
    P: IdentityProvider + ?Sized,
{
    let mut user = User::default();
    let mut claims = CustomClaims::default();

    if let Err(e) = provider
        .get_user_info(ctx, &mut user, &mut claims, tokens)
        .await
    {
        tracing::error!(error = %e, kind = e.kind(), "Authorization is indeterminate");
        record_decision("error");
        return Err(e);
    }

    let facts = MembershipFacts::from_members(&user.team_memberships);
    let decision = evaluate(&user, &ctx.snapshot.whitelist, &facts);

    if decision.is_allowed() {
        tracing::info!(user = %user.username, reason = decision.as_str(), "User authorized");
    } else {
        tracing::info!(user = %user.username, "User not in any whitelist");
    }
    record_decision(decision.as_str());

    Ok(AuthorizationOutcome { user, decision })
}
