//! achievement-ledger CLI
//!
//! Every command except `init` and `add-user` acts as a principal given with
//! `--as <user-id>`, resolved against the accounts table. Results are printed
//! as JSON; failures print `{"error": {"code", "message"}}` and exit non-zero.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use achievement_ledger::content_store::ContentPatch;
use achievement_ledger::db::{NewProfile, Pagination};
use achievement_ledger::services::events::spawn_logging_listener;
use achievement_ledger::services::{AttachmentInput, CreateAchievementInput, ListQuery};
use achievement_ledger::{
    AchievementStatus, AchievementType, Config, Details, Ledger, LedgerError, LedgerResult,
    Principal, PrincipalResolver, Role,
};

#[derive(Parser, Debug)]
#[command(name = "achievement-ledger")]
#[command(about = "Student achievement records with a review workflow")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "LEDGER_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// User id to act as
    #[arg(long = "as", global = true, env = "LEDGER_USER")]
    acting_as: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the stores and write a default config
    Init,

    /// Register a user (and its student or lecturer profile)
    AddUser {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// student, advisor or admin
        #[arg(long)]
        role: Role,
        #[arg(long)]
        email: Option<String>,
        /// Student or lecturer code
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value = "")]
        program: String,
        #[arg(long, default_value_t = 0)]
        year: i32,
        #[arg(long, default_value = "")]
        department: String,
    },

    /// Assign an advisor to a student (admin)
    SetAdvisor { student_id: String, lecturer_id: String },

    /// List a lecturer's advisees
    Advisees {
        lecturer_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },

    /// List the students the caller can see
    Students {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },

    /// Show one student profile
    Student { student_id: String },

    /// List all lecturers
    Lecturers {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },

    /// Create a draft achievement (student)
    Create {
        #[arg(long = "type")]
        achievement_type: AchievementType,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = 0)]
        points: u32,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Details as a JSON object
        #[arg(long)]
        details: Option<String>,
    },

    /// Partially update a draft (student)
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        points: Option<u32>,
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
        /// Replaces the whole details object (JSON)
        #[arg(long)]
        details: Option<String>,
    },

    /// Record file metadata on a draft (student)
    Attach {
        id: String,
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        file_url: String,
        #[arg(long)]
        file_type: String,
    },

    Submit { id: String },
    Verify { id: String },
    Reject {
        id: String,
        #[arg(long)]
        note: String,
    },
    Delete { id: String },
    Get { id: String },

    List {
        #[arg(long)]
        status: Option<AchievementStatus>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },

    /// Statistics over everything visible to the caller
    Stats,

    /// Report for one student
    Report { student_id: String },
}

fn parse_details(raw: Option<String>) -> LedgerResult<Details> {
    let Some(raw) = raw else {
        return Ok(Details::new());
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map.into()),
        Ok(_) => Err(LedgerError::ValidationFailed("details must be a JSON object".into())),
        Err(e) => Err(LedgerError::ValidationFailed(format!("details: {}", e))),
    }
}

fn principal(ledger: &Ledger, acting_as: &Option<String>) -> LedgerResult<Principal> {
    let user_id = acting_as
        .as_deref()
        .ok_or_else(|| LedgerError::Unauthenticated("--as <user-id> is required".into()))?;
    ledger.principals.resolve(user_id)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(ledger: &Ledger, acting_as: &Option<String>, command: Command) -> LedgerResult<serde_json::Value> {
    let to_json = |value: serde_json::Result<serde_json::Value>| {
        value.map_err(|e| LedgerError::StoreUnavailable(format!("encode output: {}", e)))
    };
    let services = &ledger.services;

    match command {
        Command::Init => to_json(serde_json::to_value(ledger.db.stats()?)),

        Command::AddUser {
            id,
            name,
            role,
            email,
            code,
            program,
            year,
            department,
        } => {
            let mut profile = NewProfile::new(&id, name);
            if let Some(email) = email {
                profile = profile.with_email(email);
            }
            let code = code.unwrap_or_else(|| id.clone());
            match role {
                Role::Student => to_json(serde_json::to_value(
                    ledger.profiles.create_student(profile, &code, &program, year, None)?,
                )),
                Role::Advisor => to_json(serde_json::to_value(
                    ledger.profiles.create_lecturer(profile, &code, &department)?,
                )),
                Role::Admin => to_json(serde_json::to_value(ledger.profiles.create_user(profile, role)?)),
            }
        }

        Command::SetAdvisor { student_id, lecturer_id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(
                services.roster.set_advisor(&principal, &student_id, &lecturer_id)?,
            ))
        }

        Command::Advisees { lecturer_id, page, limit } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.roster.list_advisees(
                &principal,
                &lecturer_id,
                Pagination::new(page, limit),
            )?))
        }

        Command::Students { page, limit } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(
                services.roster.list_students(&principal, Pagination::new(page, limit))?,
            ))
        }

        Command::Student { student_id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.roster.get_student(&principal, &student_id)?))
        }

        Command::Lecturers { page, limit } => {
            principal(ledger, acting_as)?;
            to_json(serde_json::to_value(
                services.roster.list_lecturers(Pagination::new(page, limit))?,
            ))
        }

        Command::Create {
            achievement_type,
            title,
            description,
            points,
            tags,
            details,
        } => {
            let principal = principal(ledger, acting_as)?;
            let input = CreateAchievementInput {
                achievement_type,
                title,
                description,
                details: parse_details(details)?,
                tags,
                points,
            };
            to_json(serde_json::to_value(services.lifecycle.create(&principal, input)?))
        }

        Command::Update { id, title, description, points, tags, details } => {
            let principal = principal(ledger, acting_as)?;
            let details = match details {
                Some(raw) => Some(parse_details(Some(raw))?),
                None => None,
            };
            let patch = ContentPatch {
                title,
                description,
                points,
                tags,
                details,
            };
            to_json(serde_json::to_value(services.lifecycle.update(&principal, &id, patch)?))
        }

        Command::Attach { id, file_name, file_url, file_type } => {
            let principal = principal(ledger, acting_as)?;
            let input = AttachmentInput { file_name, file_url, file_type };
            to_json(serde_json::to_value(services.lifecycle.attach(&principal, &id, input)?))
        }

        Command::Submit { id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.lifecycle.submit(&principal, &id)?))
        }

        Command::Verify { id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.lifecycle.verify(&principal, &id)?))
        }

        Command::Reject { id, note } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.lifecycle.reject(&principal, &id, &note)?))
        }

        Command::Delete { id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.lifecycle.delete(&principal, &id)?))
        }

        Command::Get { id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.lifecycle.get(&principal, &id)?))
        }

        Command::List { status, student, page, limit } => {
            let principal = principal(ledger, acting_as)?;
            let query = ListQuery { status, page, limit };
            let listed = match student {
                Some(student_id) => services.lifecycle.list_for_student(&principal, &student_id, query)?,
                None => services.lifecycle.list(&principal, query)?,
            };
            to_json(serde_json::to_value(listed))
        }

        Command::Stats => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(services.aggregation.statistics(&principal)?))
        }

        Command::Report { student_id } => {
            let principal = principal(ledger, acting_as)?;
            to_json(serde_json::to_value(
                services.aggregation.student_report(&principal, &student_id)?,
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("achievement_ledger=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    let ledger = Ledger::open(&config).context("failed to open stores")?;
    let listener = spawn_logging_listener(ledger.services.events.clone());

    if matches!(args.command, Command::Init) {
        let config_path = config.config_path();
        if !config_path.exists() {
            config.save(&config_path)?;
            info!(path = %config_path.display(), "Created default config");
        }
    }

    let outcome = run(&ledger, &args.acting_as, args.command);
    ledger.flush()?;
    // Let the audit listener drain what this command emitted
    tokio::task::yield_now().await;
    listener.abort();

    match outcome {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&e.to_json())?;
            std::process::exit(match e.http_status() {
                400..=499 => 2,
                _ => 1,
            });
        }
    }
}
