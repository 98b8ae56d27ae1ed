//! Job application tracking: the per-user list, the add/edit actions and the
//! four-column status board.

use chrono::Utc;
use serde::Serialize;

use crate::db::Database;
use crate::error::{AppError, AppResult, Loaded};
use crate::models::{ApplicationPatch, ApplicationStatus, JobApplication, NewApplication, Owner};
use crate::session::Session;

/// Applications partitioned by status, one bucket per column, always all four.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBoard {
    pub applied: Vec<JobApplication>,
    pub interviewing: Vec<JobApplication>,
    pub offer: Vec<JobApplication>,
    pub rejected: Vec<JobApplication>,
}

impl StatusBoard {
    pub fn bucket(&self, status: ApplicationStatus) -> &[JobApplication] {
        match status {
            ApplicationStatus::Applied => &self.applied,
            ApplicationStatus::Interviewing => &self.interviewing,
            ApplicationStatus::Offer => &self.offer,
            ApplicationStatus::Rejected => &self.rejected,
        }
    }

    fn bucket_mut(&mut self, status: ApplicationStatus) -> &mut Vec<JobApplication> {
        match status {
            ApplicationStatus::Applied => &mut self.applied,
            ApplicationStatus::Interviewing => &mut self.interviewing,
            ApplicationStatus::Offer => &mut self.offer,
            ApplicationStatus::Rejected => &mut self.rejected,
        }
    }

    /// Columns in board order, empty ones included.
    pub fn columns(&self) -> [(ApplicationStatus, &[JobApplication]); 4] {
        ApplicationStatus::ALL.map(|status| (status, self.bucket(status)))
    }

    pub fn total(&self) -> usize {
        self.columns().iter().map(|(_, apps)| apps.len()).sum()
    }
}

pub fn group_by_status(applications: &[JobApplication]) -> StatusBoard {
    let mut board = StatusBoard::default();
    for app in applications {
        board.bucket_mut(app.status).push(app.clone());
    }
    board
}

pub fn list_applications(db: &Database, owner: &Owner) -> AppResult<Vec<JobApplication>> {
    let apps = db.select_job_apps(owner)?;
    tracing::debug!(owner = %owner, count = apps.len(), "loaded applications");
    Ok(apps)
}

/// List loader for display: a failed fetch yields no rows and a notice.
pub fn load_applications(db: &Database, owner: &Owner) -> Loaded<Vec<JobApplication>> {
    match list_applications(db, owner) {
        Ok(apps) => Loaded::ok(apps),
        Err(e) => Loaded::degraded(Vec::new(), e),
    }
}

/// Board loader for display: a failed fetch yields an empty board and a notice.
pub fn load_board(db: &Database, owner: &Owner) -> Loaded<StatusBoard> {
    let loaded = load_applications(db, owner);
    Loaded {
        value: group_by_status(&loaded.value),
        notice: loaded.notice,
    }
}

pub fn get_application(db: &Database, owner: &Owner, id: &str) -> AppResult<JobApplication> {
    db.select_job_app(owner, id)?
        .ok_or_else(|| AppError::not_found(format!("application {}", id)))
}

pub fn add_application(
    db: &Database,
    session: &Session,
    new: NewApplication,
) -> AppResult<JobApplication> {
    let title = new.title.trim();
    let company = new.company.trim();
    if title.is_empty() {
        return Err(AppError::validation("job title is required"));
    }
    if company.is_empty() {
        return Err(AppError::validation("company is required"));
    }
    let owner = session.require_owner()?;

    let new = NewApplication {
        title: title.to_string(),
        company: company.to_string(),
        ..new
    };
    let id = db.insert_job_app(owner, &new)?;
    tracing::info!(owner = %owner, id = %id, status = %new.status, "application added");

    // Re-read rather than trusting the local copy.
    get_application(db, owner, &id)
}

pub fn update_application(
    db: &Database,
    owner: &Owner,
    id: &str,
    patch: ApplicationPatch,
) -> AppResult<JobApplication> {
    let mut app = get_application(db, owner, id)?;
    apply_patch(&mut app, patch)?;
    app.updated_at = Utc::now();

    if db.update_job_app(&app)? == 0 {
        return Err(AppError::not_found(format!("application {}", id)));
    }
    tracing::info!(owner = %owner, id = %id, status = %app.status, "application updated");
    Ok(app)
}

fn apply_patch(app: &mut JobApplication, patch: ApplicationPatch) -> AppResult<()> {
    if let Some(title) = patch.title {
        app.title = required_text(&title, "job title")?;
    }
    if let Some(company) = patch.company {
        app.company = required_text(&company, "company")?;
    }
    if let Some(status) = patch.status {
        app.status = status;
    }
    if let Some(date) = patch.date_applied {
        app.date_applied = date;
    }
    if let Some(score) = patch.chance_score {
        if score > 100 {
            return Err(AppError::validation(format!(
                "chance score must be between 0 and 100, got {}",
                score
            )));
        }
        app.chance_score = Some(score);
    }
    if let Some(v) = patch.resume_version {
        app.resume_version = optional_text(&v);
    }
    if let Some(v) = patch.notes {
        app.notes = optional_text(&v);
    }
    if let Some(v) = patch.jd_url {
        app.jd_url = optional_text(&v);
    }
    Ok(())
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} cannot be empty", field)));
    }
    Ok(value.to_string())
}

fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
