mod account;
mod community;
mod config;
mod db;
mod error;
mod models;
mod preferences;
mod session;
mod skills;
mod tracker;
mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Database;
use models::{
    ApplicationPatch, ApplicationStatus, JobApplication, NewApplication, PreferenceList,
    PreferenceRecord,
};
use session::Session;
use skills::SkillSet;

#[derive(Parser)]
#[command(name = "vconnect")]
#[command(about = "Track job applications, matching preferences and skill gaps")]
struct Cli {
    /// Database file (defaults to the user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Signed-in user id (or set VCONNECT_USER)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Job applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Matching preferences
    Prefs {
        #[command(subcommand)]
        command: PrefCommands,
    },

    /// Compare your skills against a target role
    Skills {
        /// Role you are targeting (label only)
        #[arg(short, long, default_value = "Senior Full-Stack Developer")]
        role: String,

        /// A skill you have; repeat for several
        #[arg(short, long = "skill", default_values = ["JavaScript", "React", "CSS"])]
        skills: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Community questions and answers
    Qa {
        #[command(subcommand)]
        command: QaCommands,
    },

    /// Community forum
    Forum {
        #[command(subcommand)]
        command: ForumCommands,
    },

    /// Profile and plan
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// List applications, newest first
    List {
        /// Filter by status (applied, interviewing, offer, rejected)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print the four-column status board
    Board {
        #[arg(long)]
        json: bool,
    },

    /// Browse the board interactively
    Browse,

    /// Add an application
    Add {
        /// Job title
        title: String,

        /// Company name
        company: String,

        #[arg(short, long, default_value = "applied")]
        status: String,

        /// Date applied (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show application details
    Show {
        /// Application ID
        id: String,
    },

    /// Edit an application; only the given fields change
    Update {
        /// Application ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        company: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        /// Date applied (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Resume version used ("" clears)
        #[arg(long)]
        resume: Option<String>,

        /// Free-form notes ("" clears)
        #[arg(long)]
        notes: Option<String>,

        /// Job description URL ("" clears)
        #[arg(long)]
        jd_url: Option<String>,

        /// Estimated chance, 0-100
        #[arg(long)]
        chance: Option<u8>,
    },
}

#[derive(Subcommand)]
enum PrefCommands {
    /// Show saved preferences (or the defaults)
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Change scalar preferences and save
    Set {
        #[arg(long)]
        salary_min: Option<i64>,
        #[arg(long)]
        salary_max: Option<i64>,
        #[arg(long)]
        equity_min: Option<f64>,
        #[arg(long)]
        equity_max: Option<f64>,
        #[arg(long)]
        investment_min: Option<i64>,
        #[arg(long)]
        investment_max: Option<i64>,
        /// remote, hybrid, onsite or any
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        notify_email: Option<bool>,
    },

    /// Add a value to a list (locations, sectors, job_types, stages) and save
    Add { list: String, value: String },

    /// Remove a value from a list and save
    Remove { list: String, value: String },
}

#[derive(Subcommand)]
enum QaCommands {
    /// Ask a question
    Ask {
        title: String,
        body: String,
        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,
    },

    /// Answer a question
    Answer { question_id: String, body: String },

    /// List questions with their answers
    List,
}

#[derive(Subcommand)]
enum ForumCommands {
    /// Create a post
    Post {
        title: String,
        #[arg(short, long)]
        excerpt: Option<String>,
        #[arg(long = "type")]
        post_type: Option<String>,
        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,
    },

    /// List posts, newest first
    List {
        #[arg(long = "type")]
        post_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Create or update your profile
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// investor, startup, job_seeker, employer or mentor
        #[arg(long = "type")]
        user_type: Option<String>,
    },

    /// Show your profile
    Show,

    /// Upgrade to premium
    Premium,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.db.clone(), cli.user.clone())?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let session = Session::from_user(config.user.as_deref());

    // Scoring is local, and init creates the schema itself.
    if !matches!(cli.command, Commands::Init | Commands::Skills { .. }) {
        db.ensure_initialized()?;
    }
    run(&db, &session, cli.command)
}

fn run(db: &Database, session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
            Ok(())
        }
        Commands::Apps { command } => run_apps(db, session, command),
        Commands::Prefs { command } => run_prefs(db, session, command),
        Commands::Skills { role, skills, json } => run_skills(&role, &skills, json),
        Commands::Qa { command } => run_qa(db, session, command),
        Commands::Forum { command } => run_forum(db, session, command),
        Commands::Account { command } => run_account(db, session, command),
    }
}

fn run_apps(db: &Database, session: &Session, command: AppCommands) -> Result<()> {
    match command {
        AppCommands::List { status, json } => {
            let owner = session.require_owner()?;
            let filter = status.map(|s| s.parse::<ApplicationStatus>()).transpose()?;
            let loaded = tracker::load_applications(db, owner);
            if let Some(notice) = &loaded.notice {
                eprintln!("Warning: {}", notice);
            }
            let apps: Vec<JobApplication> = loaded
                .value
                .into_iter()
                .filter(|a| filter.is_none_or(|s| a.status == s))
                .collect();
            if json {
                print_json(&apps)?;
            } else if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<36} {:<13} {:<30} {:<20} {:<10}",
                    "ID", "STATUS", "TITLE", "COMPANY", "APPLIED"
                );
                println!("{}", "-".repeat(113));
                for app in apps {
                    println!(
                        "{:<36} {:<13} {:<30} {:<20} {:<10}",
                        app.id,
                        app.status,
                        truncate(&app.title, 28),
                        truncate(&app.company, 18),
                        app.date_applied
                    );
                }
            }
        }

        AppCommands::Board { json } => {
            let owner = session.require_owner()?;
            let loaded = tracker::load_board(db, owner);
            if let Some(notice) = &loaded.notice {
                eprintln!("Warning: {}", notice);
            }
            if json {
                print_json(&loaded.value)?;
            } else {
                println!("{} applications\n", loaded.value.total());
                for (status, apps) in loaded.value.columns() {
                    println!("{} ({})", status.label().to_uppercase(), apps.len());
                    for app in apps {
                        println!("  {}  {} @ {}", short_id(&app.id), app.title, app.company);
                    }
                    println!();
                }
            }
        }

        AppCommands::Browse => {
            let owner = session.require_owner()?;
            tui::run_board(db, owner)?;
        }

        AppCommands::Add {
            title,
            company,
            status,
            date,
        } => {
            let new = NewApplication {
                title,
                company,
                status: status.parse()?,
                date_applied: date.as_deref().map(parse_date).transpose()?,
            };
            let app = tracker::add_application(db, session, new)?;
            println!("Application added: {} ({} @ {})", app.id, app.title, app.company);
        }

        AppCommands::Show { id } => {
            let owner = session.require_owner()?;
            let app = tracker::get_application(db, owner, &id)?;
            print_application(&app);
        }

        AppCommands::Update {
            id,
            title,
            company,
            status,
            date,
            resume,
            notes,
            jd_url,
            chance,
        } => {
            let owner = session.require_owner()?;
            let patch = ApplicationPatch {
                title,
                company,
                status: status.map(|s| s.parse()).transpose()?,
                date_applied: date.as_deref().map(parse_date).transpose()?,
                resume_version: resume,
                notes,
                jd_url,
                chance_score: chance,
            };
            if patch.is_empty() {
                return Err(anyhow!("Nothing to update. Pass at least one field flag."));
            }
            let app = tracker::update_application(db, owner, &id, patch)?;
            println!("Changes saved.");
            print_application(&app);
        }
    }
    Ok(())
}

fn run_prefs(db: &Database, session: &Session, command: PrefCommands) -> Result<()> {
    let owner = session.require_owner()?;
    let loaded = preferences::edit_buffer(db, owner);

    match command {
        PrefCommands::Show { json } => {
            if let Some(notice) = &loaded.notice {
                eprintln!("Warning: {} (showing defaults)", notice);
            }
            if json {
                print_json(&loaded.value)?;
            } else {
                print_preferences(&loaded.value);
            }
            Ok(())
        }
        edit => {
            // Saving over a record we failed to read would clobber it with defaults.
            if let Some(notice) = loaded.notice {
                return Err(anyhow!("Failed to load preferences: {}", notice));
            }
            let mut buffer = loaded.value;
            apply_pref_edit(&mut buffer, edit)?;

            match preferences::save_preferences(db, session, &buffer) {
                Ok(saved) => {
                    println!("Preferences saved successfully!");
                    print_preferences(&saved);
                    Ok(())
                }
                Err(e) => {
                    // Hand the unsaved edits back so nothing is lost.
                    eprintln!("Unsaved preferences:\n{}", serde_json::to_string_pretty(&buffer)?);
                    Err(anyhow!("Failed to save preferences: {}", e))
                }
            }
        }
    }
}

fn apply_pref_edit(buffer: &mut PreferenceRecord, command: PrefCommands) -> Result<()> {
    match command {
        PrefCommands::Show { .. } => {}
        PrefCommands::Set {
            salary_min,
            salary_max,
            equity_min,
            equity_max,
            investment_min,
            investment_max,
            remote,
            notify_email,
        } => {
            if let Some(v) = salary_min {
                buffer.salary_min = v;
            }
            if let Some(v) = salary_max {
                buffer.salary_max = v;
            }
            if equity_min.is_some() {
                buffer.equity_min = equity_min;
            }
            if equity_max.is_some() {
                buffer.equity_max = equity_max;
            }
            if investment_min.is_some() {
                buffer.investment_min = investment_min;
            }
            if investment_max.is_some() {
                buffer.investment_max = investment_max;
            }
            if let Some(r) = remote {
                buffer.remote_preference = r.parse()?;
            }
            if let Some(v) = notify_email {
                buffer.notify_email = v;
            }
        }
        PrefCommands::Add { list, value } => {
            let field: PreferenceList = list.parse()?;
            if !preferences::add_to_set(buffer, field, &value)? {
                println!("'{}' is already in {}.", value.trim(), field.as_str());
            }
        }
        PrefCommands::Remove { list, value } => {
            let field: PreferenceList = list.parse()?;
            if !preferences::remove_from_set(buffer, field, &value)? {
                println!("'{}' is not in {}.", value.trim(), field.as_str());
            }
        }
    }
    Ok(())
}

fn run_skills(role: &str, skills: &[String], json: bool) -> Result<()> {
    let current: SkillSet = skills.iter().map(String::as_str).collect();
    if current.is_empty() {
        println!("No current skills given; every requirement counts as missing.");
    }
    let report = skills::assess(&current, role, &skills::reference_skills());

    if json {
        return print_json(&report);
    }

    println!("Target role: {}", report.target_role);
    println!(
        "Match: {}% (you have {} out of {} required skills; weighted coverage {}%)",
        report.result.percentage,
        report.current_count,
        report.required_count,
        report.weighted_percentage
    );
    println!("\nRequired skills:");
    for skill in &report.required {
        let mark = if skill.has { "+" } else { " " };
        println!("  [{}] {:<12} importance {:>3}", mark, skill.name, skill.weight);
    }
    if !report.result.missing.is_empty() {
        println!("\nRecommended learning path:");
        for (i, skill) in report.result.missing.iter().enumerate() {
            println!("  {}. {} (importance {})", i + 1, skill.name, skill.weight);
        }
    }
    Ok(())
}

fn run_qa(db: &Database, session: &Session, command: QaCommands) -> Result<()> {
    match command {
        QaCommands::Ask { title, body, tags } => {
            let id = community::post_question(db, session, &title, &body, &tags)?;
            println!("Question posted: {}", id);
        }
        QaCommands::Answer { question_id, body } => {
            community::post_answer(db, session, &question_id, &body)?;
            println!("Answer posted!");
        }
        QaCommands::List => {
            let threads = community::list_questions(db)?;
            if threads.is_empty() {
                println!("No questions yet.");
            }
            for thread in threads {
                let q = &thread.question;
                println!("{}  {}", short_id(&q.id), q.title);
                println!("  by {} on {}", q.author, q.created_at.format("%Y-%m-%d"));
                if !q.tags.is_empty() {
                    println!("  tags: {}", q.tags.join(", "));
                }
                for line in textwrap::fill(&q.body, 76).lines() {
                    println!("  {}", line);
                }
                for answer in &thread.answers {
                    println!("    - {}: {}", answer.author, answer.body);
                }
                println!();
            }
        }
    }
    Ok(())
}

fn run_forum(db: &Database, session: &Session, command: ForumCommands) -> Result<()> {
    match command {
        ForumCommands::Post {
            title,
            excerpt,
            post_type,
            tags,
        } => {
            let id = community::post_forum_entry(
                db,
                session,
                &title,
                excerpt.as_deref(),
                post_type.as_deref(),
                &tags,
            )?;
            println!("Post created: {}", id);
        }
        ForumCommands::List { post_type } => {
            let posts = community::list_forum_posts(db, post_type.as_deref())?;
            if posts.is_empty() {
                println!("No posts found.");
            }
            for post in posts {
                println!("[{}] {} ({})", post.post_type, post.title, post.author);
                if let Some(excerpt) = &post.excerpt {
                    println!("  {}", truncate(excerpt, 76));
                }
            }
        }
    }
    Ok(())
}

fn run_account(db: &Database, session: &Session, command: AccountCommands) -> Result<()> {
    let owner = session.require_owner()?;
    let profile = match command {
        AccountCommands::Register {
            name,
            email,
            user_type,
        } => account::register_profile(
            db,
            owner,
            name.as_deref(),
            email.as_deref(),
            user_type.as_deref(),
        )?,
        AccountCommands::Show => account::get_profile(db, owner)?,
        AccountCommands::Premium => {
            let profile = account::upgrade_to_premium(db, session)?;
            println!("Upgraded to Premium!");
            profile
        }
    };

    println!("Profile {}", profile.id);
    if let Some(name) = &profile.full_name {
        println!("Name: {}", name);
    }
    if let Some(email) = &profile.email {
        println!("Email: {}", email);
    }
    if let Some(kind) = &profile.user_type {
        println!("Type: {}", kind);
    }
    println!("Plan: {}", if profile.premium { "premium" } else { "free" });
    Ok(())
}

fn print_application(app: &JobApplication) {
    println!("Application {}", app.id);
    println!("Title: {}", app.title);
    println!("Company: {}", app.company);
    println!("Status: {}", app.status.label());
    println!("Applied: {}", app.date_applied);
    if let Some(resume) = &app.resume_version {
        println!("Resume: {}", resume);
    }
    if let Some(url) = &app.jd_url {
        println!("JD URL: {}", url);
    }
    if let Some(score) = app.chance_score {
        println!("Chance: {}%", score);
    }
    println!("Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", notes);
    }
}

fn print_preferences(prefs: &PreferenceRecord) {
    println!("Salary: ${} - ${}", prefs.salary_min, prefs.salary_max);
    match (prefs.equity_min, prefs.equity_max) {
        (None, None) => {}
        (min, max) => println!("Equity: {}% - {}%", opt(min), opt(max)),
    }
    match (prefs.investment_min, prefs.investment_max) {
        (None, None) => {}
        (min, max) => println!("Investment: ${} - ${}", opt(min), opt(max)),
    }
    println!("Work preference: {}", prefs.remote_preference);
    for field in [
        PreferenceList::Locations,
        PreferenceList::Sectors,
        PreferenceList::JobTypes,
        PreferenceList::Stages,
    ] {
        let values = prefs.list(field);
        if !values.is_empty() {
            println!("{}: {}", field.as_str(), values.join(", "));
        }
    }
    println!("Email notifications: {}", if prefs.notify_email { "on" } else { "off" });
    for violation in preferences::range_violations(prefs) {
        eprintln!("Warning: {}", violation);
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Senior Frontend Developer", 10), "Senior ...");
        assert_eq!(truncate("Zürich Zürich Zürich", 8), "Züric...");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
        );
        assert!(parse_date("05/01/2025").is_err());
    }

    #[test]
    fn test_cli_parses_update_flags() {
        let cli = Cli::try_parse_from([
            "vconnect", "--user", "u1", "apps", "update", "abc", "--status", "offer", "--chance", "80",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("u1"));
        match cli.command {
            Commands::Apps {
                command: AppCommands::Update { id, status, chance, .. },
            } => {
                assert_eq!(id, "abc");
                assert_eq!(status.as_deref(), Some("offer"));
                assert_eq!(chance, Some(80));
            }
            _ => panic!("expected apps update"),
        }
    }

    #[test]
    fn test_skills_defaults() {
        let cli = Cli::try_parse_from(["vconnect", "skills"]).unwrap();
        match cli.command {
            Commands::Skills { role, skills, json } => {
                assert_eq!(role, "Senior Full-Stack Developer");
                assert_eq!(skills, vec!["JavaScript", "React", "CSS"]);
                assert!(!json);
            }
            _ => panic!("expected skills"),
        }
    }

    #[test]
    fn test_init_runs_through_dispatch() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ensure_initialized().is_err());
        let cli = Cli::try_parse_from(["vconnect", "init"]).unwrap();
        run(&db, &Session::anonymous(), cli.command).unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_apps_list_reports_store_failure_without_erroring() {
        // no schema, so the fetch itself fails
        let db = Database::open_in_memory().unwrap();
        let session = Session::from_user(Some("user-u"));
        let cli = Cli::try_parse_from(["vconnect", "apps", "list"]).unwrap();
        run(&db, &session, cli.command).unwrap();
    }
}
