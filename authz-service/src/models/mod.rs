pub mod membership;
pub mod token;
pub mod user;

pub use membership::{Membership, MembershipResult};
pub use token::{CustomClaims, ProviderToken, ProviderTokens};
pub use user::User;
