use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{ForumPost, QuestionThread};
use crate::session::Session;

pub const DEFAULT_POST_TYPE: &str = "discussion";

/// Splits a comma-separated tag string, dropping blanks and repeats.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn require(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub fn post_question(
    db: &Database,
    session: &Session,
    title: &str,
    body: &str,
    tags: &str,
) -> AppResult<String> {
    let title = require(title, "question title")?;
    let body = require(body, "question body")?;
    let owner = session.require_owner()?;
    let id = db.insert_question(owner, &title, &body, &parse_tags(tags))?;
    tracing::info!(owner = %owner, id = %id, "question posted");
    Ok(id)
}

/// Every question, newest first, each with its answers newest first.
pub fn list_questions(db: &Database) -> AppResult<Vec<QuestionThread>> {
    db.select_questions()?
        .into_iter()
        .map(|question| {
            let answers = db.select_answers(&question.id)?;
            Ok(QuestionThread { question, answers })
        })
        .collect()
}

pub fn post_answer(
    db: &Database,
    session: &Session,
    question_id: &str,
    body: &str,
) -> AppResult<String> {
    let owner = session.require_owner()?;
    let body = require(body, "answer")?;
    if !db.question_exists(question_id)? {
        return Err(AppError::not_found(format!("question {}", question_id)));
    }
    let id = db.insert_answer(owner, question_id, &body)?;
    tracing::info!(owner = %owner, question = %question_id, "answer posted");
    Ok(id)
}

pub fn post_forum_entry(
    db: &Database,
    session: &Session,
    title: &str,
    excerpt: Option<&str>,
    post_type: Option<&str>,
    tags: &str,
) -> AppResult<String> {
    let title = require(title, "post title")?;
    let owner = session.require_owner()?;
    let excerpt = excerpt.map(str::trim).filter(|e| !e.is_empty());
    let post_type = post_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_POST_TYPE);
    let id = db.insert_forum_post(owner, &title, excerpt, post_type, &parse_tags(tags))?;
    tracing::info!(owner = %owner, id = %id, post_type, "forum post created");
    Ok(id)
}

pub fn list_forum_posts(db: &Database, post_type: Option<&str>) -> AppResult<Vec<ForumPost>> {
    db.select_forum_posts(post_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Owner, ANONYMOUS_AUTHOR};

    fn setup() -> (Database, Session) {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let owner = Owner::new("founder-1").unwrap();
        db.upsert_profile(&owner, Some("Dana Founder"), None, Some("startup"))
            .unwrap();
        (db, Session::signed_in(owner))
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("Series A, SaaS ,,SaaS"), vec!["Series A", "SaaS"]);
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_question_thread_with_answers_and_authors() {
        let (db, session) = setup();
        let qid = post_question(
            &db,
            &session,
            "How do I price a seed round?",
            "Looking for benchmarks.",
            "Fundraising, Pitch",
        )
        .unwrap();

        let stranger = Session::signed_in(Owner::new("no-profile").unwrap());
        post_answer(&db, &stranger, &qid, "Talk to three angels first.").unwrap();
        post_answer(&db, &session, &qid, "Use recent comparables.").unwrap();

        let threads = list_questions(&db).unwrap();
        assert_eq!(threads.len(), 1);
        let thread = &threads[0];
        assert_eq!(thread.question.author, "Dana Founder");
        assert_eq!(thread.question.tags, vec!["Fundraising", "Pitch"]);
        assert_eq!(thread.answers.len(), 2);
        assert_eq!(thread.answers[0].body, "Use recent comparables.");
        assert_eq!(thread.answers[1].author, ANONYMOUS_AUTHOR);
    }

    #[test]
    fn test_answer_validation() {
        let (db, session) = setup();
        let qid = post_question(&db, &session, "Q", "B", "").unwrap();
        assert!(matches!(
            post_answer(&db, &session, &qid, "   "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            post_answer(&db, &session, "missing", "hello"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            post_answer(&db, &Session::anonymous(), &qid, "hello"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_forum_posts_filter_by_type() {
        let (db, session) = setup();
        post_forum_entry(&db, &session, "Hiring a CTO", None, Some("job"), "hiring").unwrap();
        post_forum_entry(&db, &session, "Demo day recap", Some("  "), None, "").unwrap();

        let all = list_forum_posts(&db, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Demo day recap");
        assert_eq!(all[0].post_type, DEFAULT_POST_TYPE);
        assert!(all[0].excerpt.is_none());

        let jobs = list_forum_posts(&db, Some("job")).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].tags, vec!["hiring"]);
    }
}
