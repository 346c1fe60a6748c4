//! Whitelist evaluation. Pure: every remote fact is resolved beforehand.

use std::collections::HashMap;

use crate::config::WhitelistConfig;
use crate::models::{Membership, User};

/// Probe outcomes keyed by team whitelist entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipFacts {
    resolved: HashMap<String, Membership>,
}

impl MembershipFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts where every listed entry resolved to `Member`.
    pub fn from_members<I>(entries: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut facts = Self::new();
        for entry in entries {
            facts.insert(entry.as_ref(), Membership::Member);
        }
        facts
    }

    pub fn insert(&mut self, entry: &str, membership: Membership) {
        self.resolved.insert(entry.to_string(), membership);
    }

    /// Unknown entries count as not-member.
    pub fn is_member(&self, entry: &str) -> bool {
        self.resolved
            .get(entry)
            .is_some_and(|membership| membership.is_member())
    }
}

/// Why a user was (or was not) let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    AllowAllUsers,
    UserWhitelisted,
    DomainWhitelisted(String),
    TeamMember(String),
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::AllowAllUsers => "allow_all",
            Decision::UserWhitelisted => "user",
            Decision::DomainWhitelisted(_) => "domain",
            Decision::TeamMember(_) => "team",
            Decision::Denied => "denied",
        }
    }
}

/// Evaluate the whitelist dimensions in order: allow-all, user, email
/// domain, team membership. The first that admits the user wins.
pub fn evaluate(user: &User, whitelist: &WhitelistConfig, facts: &MembershipFacts) -> Decision {
    if whitelist.allow_all_users {
        return Decision::AllowAllUsers;
    }

    if !user.username.is_empty() && whitelist.user_whitelist.contains(&user.username) {
        return Decision::UserWhitelisted;
    }

    if let Some(domain) = user
        .email_domain()
        .and_then(|domain| matching_domain(domain, whitelist))
    {
        return Decision::DomainWhitelisted(domain.to_string());
    }

    whitelist
        .team_whitelist
        .iter()
        .find(|entry| facts.is_member(entry.as_str()))
        .map(|entry| Decision::TeamMember(entry.as_str().to_string()))
        .unwrap_or(Decision::Denied)
}

pub fn authorize(user: &User, whitelist: &WhitelistConfig, facts: &MembershipFacts) -> bool {
    evaluate(user, whitelist, facts).is_allowed()
}

/// The whitelisted domain equal to `domain` or one of its parents.
fn matching_domain<'a>(domain: &str, whitelist: &'a WhitelistConfig) -> Option<&'a str> {
    let domain = domain.to_ascii_lowercase();
    whitelist
        .domain_whitelist
        .iter()
        .find(|allowed| {
            domain == **allowed
                || domain
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
        .map(String::as_str)
}
