use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Owner, Profile};
use crate::session::Session;

/// Creates the owner's profile row, or fills in the supplied fields on an existing one.
pub fn register_profile(
    db: &Database,
    owner: &Owner,
    full_name: Option<&str>,
    email: Option<&str>,
    user_type: Option<&str>,
) -> AppResult<Profile> {
    db.upsert_profile(owner, clean(full_name), clean(email), clean(user_type))?;
    tracing::info!(owner = %owner, "profile registered");
    get_profile(db, owner)
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn get_profile(db: &Database, owner: &Owner) -> AppResult<Profile> {
    db.select_profile(owner)?
        .ok_or_else(|| AppError::not_found(format!("profile {}", owner)))
}

/// Flags the signed-in user's profile as premium. No payment step is involved.
pub fn upgrade_to_premium(db: &Database, session: &Session) -> AppResult<Profile> {
    let owner = session.require_owner()?;
    if db.set_premium(owner, true)? == 0 {
        return Err(AppError::not_found(format!("profile {}", owner)));
    }
    tracing::info!(owner = %owner, "upgraded to premium");
    get_profile(db, owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    #[test]
    fn test_register_then_upgrade() {
        let db = db();
        let owner = Owner::new("investor-7").unwrap();
        let profile =
            register_profile(&db, &owner, Some("Sam Investor"), Some("sam@example.com"), Some("investor"))
                .unwrap();
        assert!(!profile.premium);

        let upgraded = upgrade_to_premium(&db, &Session::signed_in(owner)).unwrap();
        assert!(upgraded.premium);
        assert_eq!(upgraded.full_name.as_deref(), Some("Sam Investor"));
    }

    #[test]
    fn test_reregister_keeps_existing_fields() {
        let db = db();
        let owner = Owner::new("mentor-2").unwrap();
        register_profile(&db, &owner, Some("Lee"), Some("lee@example.com"), None).unwrap();
        let profile = register_profile(&db, &owner, None, Some(" "), Some("mentor")).unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Lee"));
        assert_eq!(profile.email.as_deref(), Some("lee@example.com"));
        assert_eq!(profile.user_type.as_deref(), Some("mentor"));
    }

    #[test]
    fn test_upgrade_without_profile_or_session() {
        let db = db();
        assert!(matches!(
            upgrade_to_premium(&db, &Session::anonymous()),
            Err(AppError::Unauthenticated)
        ));
        let session = Session::signed_in(Owner::new("nobody").unwrap());
        assert!(matches!(
            upgrade_to_premium(&db, &session),
            Err(AppError::NotFound(_))
        ));
    }
}
