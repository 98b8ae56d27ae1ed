//! Per-user matching preferences: load once, edit locally, save wholesale.

use chrono::Utc;
use std::fmt;

use crate::db::Database;
use crate::error::{AppError, AppResult, Loaded};
use crate::models::{Owner, PreferenceList, PreferenceRecord};
use crate::session::Session;

pub fn load_preferences(db: &Database, owner: &Owner) -> AppResult<Option<PreferenceRecord>> {
    let record = db.select_preferences(owner)?;
    tracing::debug!(owner = %owner, found = record.is_some(), "loaded preferences");
    Ok(record)
}

/// The settings form's starting state: the stored record, or defaults for a
/// new user or when the store cannot be reached.
pub fn edit_buffer(db: &Database, owner: &Owner) -> Loaded<PreferenceRecord> {
    match load_preferences(db, owner) {
        Ok(Some(record)) => Loaded::ok(record),
        Ok(None) => Loaded::ok(PreferenceRecord::new(owner.clone())),
        Err(e) => Loaded::degraded(PreferenceRecord::new(owner.clone()), e),
    }
}

/// Upserts the whole buffer under the session owner and returns what was stored.
///
/// The buffer is only borrowed, so on any error the caller still holds every edit.
pub fn save_preferences(
    db: &Database,
    session: &Session,
    buffer: &PreferenceRecord,
) -> AppResult<PreferenceRecord> {
    let owner = session.require_owner()?;
    if &buffer.owner != owner {
        return Err(AppError::not_found(format!(
            "preferences for {} are not editable by {}",
            buffer.owner, owner
        )));
    }

    let violations = range_violations(buffer);
    if !violations.is_empty() {
        let detail: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        return Err(AppError::validation(format!(
            "malformed range: {}",
            detail.join("; ")
        )));
    }

    let mut record = buffer.clone();
    record.updated_at = Some(Utc::now());
    db.upsert_preferences(&record)?;
    tracing::info!(owner = %owner, "preferences saved");
    Ok(record)
}

/// Appends `value` (trimmed) to one of the list fields unless already present.
/// Returns whether the list changed.
pub fn add_to_set(record: &mut PreferenceRecord, field: PreferenceList, value: &str) -> AppResult<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!(
            "cannot add an empty value to {}",
            field.as_str()
        )));
    }
    let list = record.list_mut(field);
    if list.iter().any(|v| v == value) {
        return Ok(false);
    }
    list.push(value.to_string());
    Ok(true)
}

pub fn remove_from_set(
    record: &mut PreferenceRecord,
    field: PreferenceList,
    value: &str,
) -> AppResult<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!(
            "cannot remove an empty value from {}",
            field.as_str()
        )));
    }
    let list = record.list_mut(field);
    let before = list.len();
    list.retain(|v| v != value);
    Ok(list.len() != before)
}

/// A min/max pair that cannot be stored as a range.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeViolation {
    Inverted { field: &'static str, min: f64, max: f64 },
    // NaN and infinities do not survive the store
    NotFinite { field: &'static str, bound: &'static str, value: f64 },
}

impl RangeViolation {
    pub fn field(&self) -> &'static str {
        match self {
            RangeViolation::Inverted { field, .. } | RangeViolation::NotFinite { field, .. } => field,
        }
    }
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeViolation::Inverted { field, min, max } => {
                write!(f, "{} min {} exceeds max {}", field, min, max)
            }
            RangeViolation::NotFinite { field, bound, value } => {
                write!(f, "{} {} is not a finite number ({})", field, bound, value)
            }
        }
    }
}

pub fn range_violations(record: &PreferenceRecord) -> Vec<RangeViolation> {
    let ranges = [
        ("salary", Some(record.salary_min as f64), Some(record.salary_max as f64)),
        ("equity", record.equity_min, record.equity_max),
        (
            "investment",
            record.investment_min.map(|v| v as f64),
            record.investment_max.map(|v| v as f64),
        ),
    ];

    let mut violations = Vec::new();
    for (field, min, max) in ranges {
        let mut finite = true;
        for (bound, value) in [("min", min), ("max", max)] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                violations.push(RangeViolation::NotFinite { field, bound, value });
                finite = false;
            }
        }
        match (min, max) {
            (Some(min), Some(max)) if finite && min > max => {
                violations.push(RangeViolation::Inverted { field, min, max })
            }
            _ => {}
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RemotePreference, DEFAULT_SALARY_MAX};

    fn setup() -> (Database, Session, Owner) {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let owner = Owner::new("user-u").unwrap();
        (db, Session::signed_in(owner.clone()), owner)
    }

    #[test]
    fn test_new_user_has_no_record_and_gets_defaults() {
        let (db, _, owner) = setup();
        assert!(load_preferences(&db, &owner).unwrap().is_none());

        let buffer = edit_buffer(&db, &owner);
        assert!(buffer.notice.is_none());
        assert_eq!(buffer.value.salary_max, DEFAULT_SALARY_MAX);
        assert_eq!(buffer.value.salary_max, 200_000);
        assert_eq!(buffer.value.salary_min, 0);
        assert!(buffer.value.notify_email);
        assert_eq!(buffer.value.remote_preference, RemotePreference::Any);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (db, session, owner) = setup();
        let mut buffer = PreferenceRecord::new(owner.clone());
        buffer.salary_min = 120_000;
        buffer.salary_max = 180_000;
        buffer.equity_min = Some(0.5);
        buffer.equity_max = Some(2.0);
        buffer.investment_min = Some(50_000);
        buffer.investment_max = Some(500_000);
        buffer.remote_preference = RemotePreference::Hybrid;
        buffer.notify_email = false;
        add_to_set(&mut buffer, PreferenceList::Locations, "Berlin").unwrap();
        add_to_set(&mut buffer, PreferenceList::Locations, "Lisbon").unwrap();
        add_to_set(&mut buffer, PreferenceList::Sectors, "Fintech").unwrap();
        add_to_set(&mut buffer, PreferenceList::JobTypes, "Full-time").unwrap();
        add_to_set(&mut buffer, PreferenceList::Stages, "Seed").unwrap();

        let saved = save_preferences(&db, &session, &buffer).unwrap();
        let loaded = load_preferences(&db, &owner).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.locations, vec!["Berlin", "Lisbon"]);
    }

    #[test]
    fn test_second_save_replaces_whole_record() {
        let (db, session, owner) = setup();
        let mut buffer = PreferenceRecord::new(owner.clone());
        add_to_set(&mut buffer, PreferenceList::Sectors, "Health").unwrap();
        save_preferences(&db, &session, &buffer).unwrap();

        remove_from_set(&mut buffer, PreferenceList::Sectors, "Health").unwrap();
        buffer.salary_max = 250_000;
        save_preferences(&db, &session, &buffer).unwrap();

        let loaded = load_preferences(&db, &owner).unwrap().unwrap();
        assert!(loaded.sectors.is_empty());
        assert_eq!(loaded.salary_max, 250_000);
    }

    #[test]
    fn test_add_to_set_trims_and_deduplicates() {
        let (_, _, owner) = setup();
        let mut record = PreferenceRecord::new(owner);
        assert!(add_to_set(&mut record, PreferenceList::Locations, "  New York ").unwrap());
        assert!(!add_to_set(&mut record, PreferenceList::Locations, "New York").unwrap());
        assert_eq!(record.locations, vec!["New York"]);

        assert!(matches!(
            add_to_set(&mut record, PreferenceList::Locations, "   "),
            Err(AppError::Validation(_))
        ));
        assert_eq!(record.locations.len(), 1);
    }

    #[test]
    fn test_remove_from_set() {
        let (_, _, owner) = setup();
        let mut record = PreferenceRecord::new(owner);
        add_to_set(&mut record, PreferenceList::Sectors, "AI").unwrap();
        add_to_set(&mut record, PreferenceList::Sectors, "Climate").unwrap();
        assert!(remove_from_set(&mut record, PreferenceList::Sectors, " AI ").unwrap());
        assert!(!remove_from_set(&mut record, PreferenceList::Sectors, "AI").unwrap());
        assert_eq!(record.sectors, vec!["Climate"]);

        assert!(matches!(
            remove_from_set(&mut record, PreferenceList::Sectors, "  "),
            Err(AppError::Validation(_))
        ));
        assert_eq!(record.sectors, vec!["Climate"]);
    }

    #[test]
    fn test_inverted_range_is_reported_and_blocks_save() {
        let (db, session, owner) = setup();
        let mut buffer = PreferenceRecord::new(owner.clone());
        buffer.salary_min = 300_000;
        buffer.equity_min = Some(5.0);
        buffer.equity_max = Some(1.0);
        buffer.investment_min = Some(10);

        let violations = range_violations(&buffer);
        let fields: Vec<_> = violations.iter().map(|v| v.field()).collect();
        assert_eq!(fields, vec!["salary", "equity"]);

        assert!(matches!(
            save_preferences(&db, &session, &buffer),
            Err(AppError::Validation(_))
        ));
        assert!(load_preferences(&db, &owner).unwrap().is_none());
    }

    #[test]
    fn test_non_finite_equity_blocks_save() {
        let (db, session, owner) = setup();
        let mut buffer = PreferenceRecord::new(owner.clone());
        buffer.equity_min = Some(f64::NAN);
        buffer.equity_max = Some(1.0);

        let violations = range_violations(&buffer);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            RangeViolation::NotFinite { field: "equity", bound: "min", .. }
        ));

        match save_preferences(&db, &session, &buffer) {
            Err(AppError::Validation(msg)) => assert!(msg.starts_with("malformed range")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(load_preferences(&db, &owner).unwrap().is_none());

        buffer.equity_min = Some(0.5);
        buffer.equity_max = Some(f64::INFINITY);
        assert_eq!(range_violations(&buffer)[0].field(), "equity");
        assert!(save_preferences(&db, &session, &buffer).is_err());
    }

    #[test]
    fn test_failed_save_keeps_buffer() {
        // No schema: the upsert fails at the store.
        let db = Database::open_in_memory().unwrap();
        let owner = Owner::new("user-u").unwrap();
        let session = Session::signed_in(owner.clone());
        let mut buffer = PreferenceRecord::new(owner);
        add_to_set(&mut buffer, PreferenceList::Locations, "Austin").unwrap();
        let snapshot = buffer.clone();

        let result = save_preferences(&db, &session, &buffer);
        assert!(matches!(result, Err(AppError::RemoteUnavailable(_))));
        assert_eq!(buffer, snapshot);
    }

    #[test]
    fn test_edit_buffer_degrades_to_defaults_on_store_failure() {
        let db = Database::open_in_memory().unwrap();
        let owner = Owner::new("user-u").unwrap();
        let loaded = edit_buffer(&db, &owner);
        assert_eq!(loaded.value, PreferenceRecord::new(owner));
        assert!(matches!(loaded.notice, Some(AppError::RemoteUnavailable(_))));
    }

    #[test]
    fn test_save_requires_matching_session() {
        let (db, _, owner) = setup();
        let buffer = PreferenceRecord::new(owner);
        assert!(matches!(
            save_preferences(&db, &Session::anonymous(), &buffer),
            Err(AppError::Unauthenticated)
        ));
        let other = Session::signed_in(Owner::new("other").unwrap());
        assert!(matches!(
            save_preferences(&db, &other, &buffer),
            Err(AppError::NotFound(_))
        ));
    }
}
