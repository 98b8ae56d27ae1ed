use crate::error::{AppError, AppResult};
use crate::models::Owner;

/// The signed-in user, handed explicitly to every operation that writes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    owner: Option<Owner>,
}

impl Session {
    pub fn signed_in(owner: Owner) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn anonymous() -> Self {
        Self { owner: None }
    }

    /// Builds a session from a raw user id; blank ids count as signed out.
    pub fn from_user(user: Option<&str>) -> Self {
        match user.and_then(|u| Owner::new(u).ok()) {
            Some(owner) => Self::signed_in(owner),
            None => Self::anonymous(),
        }
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn require_owner(&self) -> AppResult<&Owner> {
        self.owner().ok_or(AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_user_is_anonymous() {
        assert!(Session::from_user(Some("   ")).owner().is_none());
        assert!(Session::from_user(None).owner().is_none());
        assert!(matches!(
            Session::anonymous().require_owner(),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_user_id_is_trimmed() {
        let session = Session::from_user(Some("  u-42 "));
        assert_eq!(session.require_owner().unwrap().as_str(), "u-42");
    }
}
