use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Answer, ApplicationStatus, ForumPost, JobApplication, NewApplication, Owner, PreferenceRecord,
    Profile, Question, RemotePreference, ANONYMOUS_AUTHOR,
};

/// Local stand-in for the hosted record store: one SQLite file, one table per
/// record kind, every user-owned row keyed by `user_id`.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                full_name TEXT,
                email TEXT,
                user_type TEXT,
                premium INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_apps (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interviewing', 'offer', 'rejected')),
                date_applied TEXT NOT NULL,
                resume_version TEXT,
                notes TEXT,
                jd_url TEXT,
                chance_score INTEGER CHECK (chance_score IS NULL OR chance_score BETWEEN 0 AND 100),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_preferences (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                salary_min INTEGER,
                salary_max INTEGER,
                equity_min REAL,
                equity_max REAL,
                investment_min INTEGER,
                investment_max INTEGER,
                locations TEXT,
                sectors TEXT,
                job_types TEXT,
                stages TEXT,
                remote_preference TEXT CHECK (remote_preference IN ('remote', 'hybrid', 'onsite', 'any')),
                notify_email INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                tags TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL REFERENCES questions(id),
                user_id TEXT NOT NULL,
                body TEXT NOT NULL,
                upvotes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS forum_posts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                excerpt TEXT,
                post_type TEXT NOT NULL DEFAULT 'discussion',
                tags TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_apps_user ON job_apps(user_id);
            CREATE INDEX IF NOT EXISTS idx_job_apps_status ON job_apps(status);
            CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='job_apps'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'vconnect init' first."
            ));
        }
        Ok(())
    }

    // --- job_apps ---

    pub fn insert_job_app(&self, owner: &Owner, app: &NewApplication) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let date_applied = app.date_applied.unwrap_or_else(|| now.date_naive());
        self.conn.execute(
            "INSERT INTO job_apps (id, user_id, title, company, status, date_applied, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![id, owner, app.title, app.company, app.status, date_applied, now],
        )?;
        Ok(id)
    }

    pub fn select_job_apps(&self, owner: &Owner) -> AppResult<Vec<JobApplication>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, company, status, date_applied, resume_version,
                    notes, jd_url, chance_score, created_at, updated_at
             FROM job_apps
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([owner], Self::row_to_job_app)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn select_job_app(&self, owner: &Owner, id: &str) -> AppResult<Option<JobApplication>> {
        let app = self
            .conn
            .query_row(
                "SELECT id, user_id, title, company, status, date_applied, resume_version,
                        notes, jd_url, chance_score, created_at, updated_at
                 FROM job_apps
                 WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
                Self::row_to_job_app,
            )
            .optional()?;
        Ok(app)
    }

    /// Writes every mutable column of `app` back, scoped to its owner.
    /// Returns the number of rows touched (0 when the id is not the owner's).
    pub fn update_job_app(&self, app: &JobApplication) -> AppResult<usize> {
        let changed = self.conn.execute(
            "UPDATE job_apps
             SET title = ?3, company = ?4, status = ?5, date_applied = ?6,
                 resume_version = ?7, notes = ?8, jd_url = ?9, chance_score = ?10,
                 updated_at = ?11
             WHERE id = ?1 AND user_id = ?2",
            params![
                app.id,
                app.owner,
                app.title,
                app.company,
                app.status,
                app.date_applied,
                app.resume_version,
                app.notes,
                app.jd_url,
                app.chance_score,
                app.updated_at,
            ],
        )?;
        Ok(changed)
    }

    fn row_to_job_app(row: &Row) -> rusqlite::Result<JobApplication> {
        Ok(JobApplication {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            company: row.get(3)?,
            status: row
                .get::<_, Option<ApplicationStatus>>(4)?
                .unwrap_or_default(),
            date_applied: row.get(5)?,
            resume_version: row.get(6)?,
            notes: row.get(7)?,
            jd_url: row.get(8)?,
            chance_score: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    // --- user_preferences ---

    pub fn select_preferences(&self, owner: &Owner) -> AppResult<Option<PreferenceRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT user_id, salary_min, salary_max, equity_min, equity_max,
                        investment_min, investment_max, locations, sectors, job_types,
                        stages, remote_preference, notify_email, updated_at
                 FROM user_preferences
                 WHERE user_id = ?1",
                [owner],
                Self::row_to_preferences,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert-or-replace keyed by `user_id`. Every column is written.
    pub fn upsert_preferences(&self, record: &PreferenceRecord) -> AppResult<()> {
        let now = record.updated_at.unwrap_or_else(Utc::now);
        self.conn.execute(
            r#"
            INSERT INTO user_preferences (
                id, user_id, salary_min, salary_max, equity_min, equity_max,
                investment_min, investment_max, locations, sectors, job_types,
                stages, remote_preference, notify_email, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?15
            )
            ON CONFLICT(user_id) DO UPDATE SET
                salary_min = excluded.salary_min,
                salary_max = excluded.salary_max,
                equity_min = excluded.equity_min,
                equity_max = excluded.equity_max,
                investment_min = excluded.investment_min,
                investment_max = excluded.investment_max,
                locations = excluded.locations,
                sectors = excluded.sectors,
                job_types = excluded.job_types,
                stages = excluded.stages,
                remote_preference = excluded.remote_preference,
                notify_email = excluded.notify_email,
                updated_at = excluded.updated_at
            "#,
            params![
                Uuid::new_v4().to_string(),
                record.owner,
                record.salary_min,
                record.salary_max,
                record.equity_min,
                record.equity_max,
                record.investment_min,
                record.investment_max,
                json_list(&record.locations),
                json_list(&record.sectors),
                json_list(&record.job_types),
                json_list(&record.stages),
                record.remote_preference,
                record.notify_email,
                now,
            ],
        )?;
        Ok(())
    }

    fn row_to_preferences(row: &Row) -> rusqlite::Result<PreferenceRecord> {
        let owner: Owner = row.get(0)?;
        let defaults = PreferenceRecord::new(owner.clone());
        Ok(PreferenceRecord {
            owner,
            salary_min: row.get::<_, Option<i64>>(1)?.unwrap_or(defaults.salary_min),
            salary_max: row.get::<_, Option<i64>>(2)?.unwrap_or(defaults.salary_max),
            equity_min: row.get(3)?,
            equity_max: row.get(4)?,
            investment_min: row.get(5)?,
            investment_max: row.get(6)?,
            locations: list_column(row, 7)?,
            sectors: list_column(row, 8)?,
            job_types: list_column(row, 9)?,
            stages: list_column(row, 10)?,
            remote_preference: row
                .get::<_, Option<RemotePreference>>(11)?
                .unwrap_or_default(),
            notify_email: row.get::<_, Option<bool>>(12)?.unwrap_or(true),
            updated_at: row.get(13)?,
        })
    }

    // --- profiles ---

    pub fn upsert_profile(
        &self,
        owner: &Owner,
        full_name: Option<&str>,
        email: Option<&str>,
        user_type: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO profiles (id, full_name, email, user_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                full_name = COALESCE(excluded.full_name, profiles.full_name),
                email = COALESCE(excluded.email, profiles.email),
                user_type = COALESCE(excluded.user_type, profiles.user_type),
                updated_at = excluded.updated_at",
            params![owner, full_name, email, user_type, now],
        )?;
        Ok(())
    }

    pub fn select_profile(&self, owner: &Owner) -> AppResult<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, full_name, email, user_type, premium, created_at, updated_at
                 FROM profiles WHERE id = ?1",
                [owner],
                |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                        email: row.get(2)?,
                        user_type: row.get(3)?,
                        premium: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn set_premium(&self, owner: &Owner, premium: bool) -> AppResult<usize> {
        let changed = self.conn.execute(
            "UPDATE profiles SET premium = ?1, updated_at = ?2 WHERE id = ?3",
            params![premium, Utc::now(), owner],
        )?;
        Ok(changed)
    }

    // --- questions / answers / forum_posts ---

    pub fn insert_question(
        &self,
        owner: &Owner,
        title: &str,
        body: &str,
        tags: &[String],
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO questions (id, user_id, title, body, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, owner, title, body, json_list(tags), now],
        )?;
        Ok(id)
    }

    pub fn select_questions(&self) -> AppResult<Vec<Question>> {
        let mut stmt = self.conn.prepare(
            "SELECT q.id, q.user_id, q.title, q.body, q.tags, q.status, q.created_at, p.full_name
             FROM questions q
             LEFT JOIN profiles p ON p.id = q.user_id
             ORDER BY q.created_at DESC, q.rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Question {
                id: row.get(0)?,
                owner: row.get(1)?,
                title: row.get(2)?,
                body: row.get(3)?,
                tags: list_column(row, 4)?,
                status: row.get(5)?,
                created_at: row.get(6)?,
                author: author_column(row, 7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn question_exists(&self, id: &str) -> AppResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM questions WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn insert_answer(&self, owner: &Owner, question_id: &str, body: &str) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO answers (id, question_id, user_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, question_id, owner, body, Utc::now()],
        )?;
        Ok(id)
    }

    pub fn select_answers(&self, question_id: &str) -> AppResult<Vec<Answer>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.question_id, a.user_id, a.body, a.upvotes, a.created_at, p.full_name
             FROM answers a
             LEFT JOIN profiles p ON p.id = a.user_id
             WHERE a.question_id = ?1
             ORDER BY a.created_at DESC, a.rowid DESC",
        )?;
        let rows = stmt.query_map([question_id], |row| {
            Ok(Answer {
                id: row.get(0)?,
                question_id: row.get(1)?,
                owner: row.get(2)?,
                body: row.get(3)?,
                upvotes: row.get(4)?,
                created_at: row.get(5)?,
                author: author_column(row, 6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_forum_post(
        &self,
        owner: &Owner,
        title: &str,
        excerpt: Option<&str>,
        post_type: &str,
        tags: &[String],
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO forum_posts (id, user_id, title, excerpt, post_type, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, owner, title, excerpt, post_type, json_list(tags), Utc::now()],
        )?;
        Ok(id)
    }

    pub fn select_forum_posts(&self, post_type: Option<&str>) -> AppResult<Vec<ForumPost>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.user_id, f.title, f.excerpt, f.post_type, f.tags, f.created_at, p.full_name
             FROM forum_posts f
             LEFT JOIN profiles p ON p.id = f.user_id
             WHERE ?1 IS NULL OR f.post_type = ?1
             ORDER BY f.created_at DESC, f.rowid DESC",
        )?;
        let rows = stmt.query_map([post_type], |row| {
            Ok(ForumPost {
                id: row.get(0)?,
                owner: row.get(1)?,
                title: row.get(2)?,
                excerpt: row.get(3)?,
                post_type: row.get(4)?,
                tags: list_column(row, 5)?,
                created_at: row.get::<_, DateTime<Utc>>(6)?,
                author: author_column(row, 7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

// --- Column helpers ---

fn json_list(values: &[String]) -> String {
    // Serializing a slice of strings cannot fail.
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn list_column(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(Vec::new()),
    }
}

fn author_column(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()))
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
    fn test_init_is_idempotent() {
        let db = db();
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_ensure_initialized_fails_on_empty_database() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ensure_initialized().is_err());
    }

    #[test]
    fn test_job_app_rows_are_scoped_to_owner() {
        let db = db();
        let alice = Owner::new("alice").unwrap();
        let bob = Owner::new("bob").unwrap();
        let id = db
            .insert_job_app(&alice, &NewApplication::new("Engineer", "Acme"))
            .unwrap();

        assert!(db.select_job_app(&alice, &id).unwrap().is_some());
        assert!(db.select_job_app(&bob, &id).unwrap().is_none());
        assert!(db.select_job_apps(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_preferences_upsert_keeps_one_row_per_owner() {
        let db = db();
        let owner = Owner::new("alice").unwrap();
        let mut record = PreferenceRecord::new(owner.clone());
        db.upsert_preferences(&record).unwrap();
        record.salary_min = 90_000;
        db.upsert_preferences(&record).unwrap();

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM user_preferences", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.select_preferences(&owner).unwrap().unwrap().salary_min, 90_000);
    }

    #[test]
    fn test_null_preference_columns_fall_back_to_form_defaults() {
        let db = db();
        db.conn
            .execute(
                "INSERT INTO user_preferences (id, user_id, created_at, updated_at)
                 VALUES ('p1', 'carol', '2025-01-01 00:00:00+00:00', '2025-01-01 00:00:00+00:00')",
                [],
            )
            .unwrap();
        let record = db
            .select_preferences(&Owner::new("carol").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(record.salary_max, 200_000);
        assert!(record.notify_email);
        assert!(record.locations.is_empty());
    }

    #[test]
    fn test_author_falls_back_to_anonymous() {
        let db = db();
        let owner = Owner::new("ghost").unwrap();
        db.insert_question(&owner, "Title", "Body", &[]).unwrap();
        let questions = db.select_questions().unwrap();
        assert_eq!(questions[0].author, ANONYMOUS_AUTHOR);
    }
}
