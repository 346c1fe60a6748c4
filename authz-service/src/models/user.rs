//! Normalized user record, independent of the originating provider.

use serde::{Deserialize, Serialize};

/// User identity resolved for one login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider login, unique per provider.
    pub username: String,
    pub email: String,
    /// Display name.
    pub name: String,
    /// Numeric provider id.
    pub id: i64,
    /// Unix seconds.
    pub created_on: i64,
    /// Unix seconds.
    pub last_update: i64,
    /// Team whitelist entries the user was found to belong to, in
    /// configured order.
    pub team_memberships: Vec<String>,
}

impl User {
    /// Domain part of the email, after the last `@`.
    pub fn email_domain(&self) -> Option<&str> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }
}
