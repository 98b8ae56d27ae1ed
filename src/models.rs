use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Identifier of the user a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: &str) -> AppResult<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for Owner {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for Owner {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|s| Owner(s.to_string()))
    }
}

// --- Job applications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interviewing,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    /// Board column order.
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "applied" => Ok(ApplicationStatus::Applied),
            "interviewing" => Ok(ApplicationStatus::Interviewing),
            "offer" => Ok(ApplicationStatus::Offer),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(AppError::validation(format!(
                "unknown status '{}' (expected applied, interviewing, offer or rejected)",
                other
            ))),
        }
    }
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(e.to_string().into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    pub owner: Owner,
    pub title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub date_applied: NaiveDate,
    pub resume_version: Option<String>,
    pub notes: Option<String>,
    pub jd_url: Option<String>,
    pub chance_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for the "add application" action.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub date_applied: Option<NaiveDate>,
}

impl NewApplication {
    pub fn new(title: &str, company: &str) -> Self {
        Self {
            title: title.to_string(),
            company: company.to_string(),
            ..Default::default()
        }
    }
}

/// Fields to overwrite on an existing application. `None` leaves a field alone.
///
/// For the optional text fields a blank string clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct ApplicationPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub date_applied: Option<NaiveDate>,
    pub resume_version: Option<String>,
    pub notes: Option<String>,
    pub jd_url: Option<String>,
    pub chance_score: Option<u8>,
}

impl ApplicationPatch {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.company.is_none()
            && self.status.is_none()
            && self.date_applied.is_none()
            && self.resume_version.is_none()
            && self.notes.is_none()
            && self.jd_url.is_none()
            && self.chance_score.is_none()
    }
}

// --- Preferences ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePreference {
    Remote,
    Hybrid,
    Onsite,
    #[default]
    Any,
}

impl RemotePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemotePreference::Remote => "remote",
            RemotePreference::Hybrid => "hybrid",
            RemotePreference::Onsite => "onsite",
            RemotePreference::Any => "any",
        }
    }
}

impl fmt::Display for RemotePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemotePreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remote" => Ok(RemotePreference::Remote),
            "hybrid" => Ok(RemotePreference::Hybrid),
            "onsite" => Ok(RemotePreference::Onsite),
            "any" => Ok(RemotePreference::Any),
            other => Err(AppError::validation(format!(
                "unknown remote preference '{}' (expected remote, hybrid, onsite or any)",
                other
            ))),
        }
    }
}

impl ToSql for RemotePreference {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RemotePreference {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(e.to_string().into()))
    }
}

pub const DEFAULT_SALARY_MIN: i64 = 0;
pub const DEFAULT_SALARY_MAX: i64 = 200_000;

/// One user's matching preferences. At most one per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub owner: Owner,
    pub salary_min: i64,
    pub salary_max: i64,
    pub equity_min: Option<f64>,
    pub equity_max: Option<f64>,
    pub investment_min: Option<i64>,
    pub investment_max: Option<i64>,
    pub locations: Vec<String>,
    pub sectors: Vec<String>,
    pub job_types: Vec<String>,
    pub stages: Vec<String>,
    pub remote_preference: RemotePreference,
    pub notify_email: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PreferenceRecord {
    /// The blank form a user sees before they have saved anything.
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            salary_min: DEFAULT_SALARY_MIN,
            salary_max: DEFAULT_SALARY_MAX,
            equity_min: None,
            equity_max: None,
            investment_min: None,
            investment_max: None,
            locations: Vec::new(),
            sectors: Vec::new(),
            job_types: Vec::new(),
            stages: Vec::new(),
            remote_preference: RemotePreference::default(),
            notify_email: true,
            updated_at: None,
        }
    }

    pub fn list(&self, field: PreferenceList) -> &Vec<String> {
        match field {
            PreferenceList::Locations => &self.locations,
            PreferenceList::Sectors => &self.sectors,
            PreferenceList::JobTypes => &self.job_types,
            PreferenceList::Stages => &self.stages,
        }
    }

    pub fn list_mut(&mut self, field: PreferenceList) -> &mut Vec<String> {
        match field {
            PreferenceList::Locations => &mut self.locations,
            PreferenceList::Sectors => &mut self.sectors,
            PreferenceList::JobTypes => &mut self.job_types,
            PreferenceList::Stages => &mut self.stages,
        }
    }
}

/// The list-valued fields of a [`PreferenceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceList {
    Locations,
    Sectors,
    JobTypes,
    Stages,
}

impl PreferenceList {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceList::Locations => "locations",
            PreferenceList::Sectors => "sectors",
            PreferenceList::JobTypes => "job_types",
            PreferenceList::Stages => "stages",
        }
    }
}

impl FromStr for PreferenceList {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "location" | "locations" => Ok(PreferenceList::Locations),
            "sector" | "sectors" => Ok(PreferenceList::Sectors),
            "job_type" | "job_types" => Ok(PreferenceList::JobTypes),
            "stage" | "stages" => Ok(PreferenceList::Stages),
            other => Err(AppError::validation(format!(
                "unknown list '{}' (expected locations, sectors, job_types or stages)",
                other
            ))),
        }
    }
}

// --- Accounts and community ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Owner,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub user_type: Option<String>,
    pub premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub owner: Owner,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub status: String,
    pub author: String, // joined from profiles
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub owner: Owner,
    pub body: String,
    pub upvotes: i64,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionThread {
    pub question: Question,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub owner: Owner,
    pub title: String,
    pub excerpt: Option<String>,
    pub post_type: String,
    pub tags: Vec<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
