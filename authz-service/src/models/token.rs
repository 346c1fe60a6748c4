use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde_json::{Map, Value};

/// Tokens handed over by the OAuth callback after the code exchange.
#[derive(Debug, Clone, Default)]
pub struct ProviderTokens {
    pub access_token: Option<Secret<String>>,
    pub refresh_token: Option<Secret<String>>,
    pub id_token: Option<Secret<String>>,
}

impl ProviderTokens {
    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(Secret::new(access_token.into())),
            ..Default::default()
        }
    }
}

/// Bearer token ready for provider API calls. Borrowed read-only by the
/// profile fetch and membership probes.
#[derive(Debug, Clone)]
pub struct ProviderToken {
    access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub expiry: Option<DateTime<Utc>>,
}

impl ProviderToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: None,
            expiry: None,
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Provider claims collected during login.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomClaims {
    pub claims: Map<String, Value>,
}
