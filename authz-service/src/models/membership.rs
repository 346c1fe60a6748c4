use crate::services::error::AuthzError;

/// Resolved answer of a single membership probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
}

impl Membership {
    pub fn is_member(self) -> bool {
        matches!(self, Membership::Member)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Membership::Member => "member",
            Membership::NotMember => "not_member",
        }
    }
}

impl From<bool> for Membership {
    fn from(is_member: bool) -> Self {
        if is_member {
            Membership::Member
        } else {
            Membership::NotMember
        }
    }
}

/// Member, not-member, or an indeterminate provider failure.
pub type MembershipResult = Result<Membership, AuthzError>;
