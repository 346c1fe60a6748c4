//! Services layer for authz-service.
//!
//! Membership probing, profile mapping, whitelist evaluation and the
//! decision flow that ties them to an identity provider.

pub mod authorization;
pub mod error;
pub mod membership;
pub mod metrics;
pub mod profile;
pub mod upstream;
pub mod whitelist;

pub use authorization::{authorize_login, AuthorizationOutcome};
pub use error::AuthzError;
pub use membership::MembershipProber;
pub use profile::GitHubProfile;
pub use whitelist::{authorize, evaluate, Decision, MembershipFacts};
