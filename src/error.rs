use thiserror::Error;

/// Every failure the tracker, preference and community operations can report.
///
/// None of these are fatal: callers show the message and keep their
/// last-known-good state.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    RemoteUnavailable(#[from] rusqlite::Error),

    #[error("Not signed in (set VCONNECT_USER or pass --user)")]
    Unauthenticated,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// A value for a render path together with the failure that produced it, if any.
///
/// Loaders hand back an empty (or default) value instead of an error so the
/// caller can always draw something and show the notice alongside.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub notice: Option<AppError>,
}

impl<T> Loaded<T> {
    pub fn ok(value: T) -> Self {
        Self { value, notice: None }
    }

    pub fn degraded(value: T, notice: AppError) -> Self {
        tracing::warn!(error = %notice, "falling back to local state");
        Self {
            value,
            notice: Some(notice),
        }
    }
}
