//! Operator whitelist: who may pass through the proxy.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A `TEAM_WHITELIST` entry, either `org` or `org/team`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct TeamEntry {
    raw: String,
    org: String,
    team: Option<String>,
}

impl TeamEntry {
    /// Parse a configured entry. Surrounding whitespace is ignored; an
    /// empty org, an empty `org/` suffix, or a second `/` is rejected.
    pub fn parse(value: &str) -> Result<Self, String> {
        let raw = value.trim();
        let (org, team) = match raw.split_once('/') {
            Some((org, team)) => (org, Some(team)),
            None => (raw, None),
        };

        if org.is_empty() {
            return Err(format!("Invalid team whitelist entry '{}': empty org", value));
        }
        if let Some(team) = team {
            if team.is_empty() || team.contains('/') {
                return Err(format!(
                    "Invalid team whitelist entry '{}': expected 'org' or 'org/team'",
                    value
                ));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            org: org.to_string(),
            team: team.map(str::to_string),
        })
    }

    /// The entry exactly as configured; recorded verbatim on the user.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }
}

impl fmt::Display for TeamEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<TeamEntry> for String {
    fn from(entry: TeamEntry) -> Self {
        entry.raw
    }
}

/// Whitelist dimensions, combined with OR semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistConfig {
    pub allow_all_users: bool,
    pub user_whitelist: HashSet<String>,
    /// Lowercased email domains.
    pub domain_whitelist: HashSet<String>,
    /// Configured order, duplicates removed.
    pub team_whitelist: Vec<TeamEntry>,
}

impl WhitelistConfig {
    /// Build a whitelist from raw configured values, trimming entries,
    /// dropping empties and de-duplicating the team list.
    pub fn from_parts<U, D, T>(
        allow_all_users: bool,
        users: U,
        domains: D,
        teams: T,
    ) -> Result<Self, String>
    where
        U: IntoIterator,
        U::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let user_whitelist = users
            .into_iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();

        let domain_whitelist = domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        let mut team_whitelist: Vec<TeamEntry> = Vec::new();
        for raw in teams {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            let entry = TeamEntry::parse(raw)?;
            if !team_whitelist.contains(&entry) {
                team_whitelist.push(entry);
            }
        }

        Ok(Self {
            allow_all_users,
            user_whitelist,
            domain_whitelist,
            team_whitelist,
        })
    }

    /// True when no dimension can ever admit anyone.
    pub fn is_empty(&self) -> bool {
        !self.allow_all_users
            && self.user_whitelist.is_empty()
            && self.domain_whitelist.is_empty()
            && self.team_whitelist.is_empty()
    }
}
