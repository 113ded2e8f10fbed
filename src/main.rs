mod account;
mod blob;
mod config;
mod db;
mod demo;
mod errors;
mod identity;
mod models;
mod notify;
mod profile;
mod stage;
mod tui;
mod view;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use account::{ProfileImage, Services};
use blob::{upload_resume, FsBlobStore};
use config::Config;
use db::{Database, RecordStore};
use demo::{DemoStore, DEMO_USER};
use identity::{require_session, AuthProvider, IdentityProvider, Session, SessionFile};
use models::{
    parse_date, parse_when, Application, ApplicationPatch, ApplicationStatus, NewApplication, RoundType,
};
use profile::{
    check_username, normalize_username, public_url, render_profile, Certification, Education, Experience,
    PortfolioEntry, PortfolioKind, Profile, ProfileStore, SocialLink, UsernameCheck,
};
use stage::{apply_transition, Transition};
use view::{filter_and_sort, ListQuery, SortKey};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Job application tracker - log applications and move them through interview rounds")]
struct Cli {
    /// Use throwaway sample data instead of your database
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Sign in on this machine
    Login {
        /// Account email
        email: String,

        /// User id (defaults to the email)
        #[arg(long)]
        user_id: Option<String>,

        /// How the account signs in (email, magic-link, or an OAuth provider name)
        #[arg(long, default_value = "email")]
        provider: String,

        /// The email address has been verified
        #[arg(long)]
        verified: bool,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Log a new application
    Add {
        company: String,
        role: String,

        /// Date applied (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,

        /// Next round date (YYYY-MM-DD or YYYY-MM-DDTHH:MM)
        #[arg(short, long)]
        next: Option<String>,

        #[arg(short, long)]
        salary: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Resume file to attach
        #[arg(short, long)]
        resume: Option<PathBuf>,
    },

    /// List applications
    List {
        /// Match company or role (case-insensitive)
        #[arg(short, long)]
        query: Option<String>,

        /// Filter by status (saved, applied, assessment, interview, offer, rejected)
        #[arg(short, long)]
        status: Option<ApplicationStatus>,

        /// Sort by date, next, or salary (always descending)
        #[arg(long, default_value = "date")]
        sort: SortKey,
    },

    /// Show an application and its timeline
    Show {
        /// Application id or unique prefix
        id: String,
    },

    /// Record the next round for an application
    Advance {
        /// Application id or unique prefix
        id: String,

        /// Round type (oa, aptitude, phone-screen, technical, system-design, managerial, hr, offer, rejected, custom, none)
        round: RoundType,

        /// When the round is scheduled (omit for TBD)
        #[arg(short, long)]
        date: Option<String>,

        /// Label for a custom round
        #[arg(short, long)]
        label: Option<String>,

        /// Override the status derived from the round
        #[arg(short, long)]
        status: Option<ApplicationStatus>,

        /// Notes for this round only (kept on the timeline entry)
        #[arg(long)]
        event_notes: Option<String>,
    },

    /// Set the status directly, without adding a round
    SetStatus {
        /// Application id or unique prefix
        id: String,
        status: ApplicationStatus,
    },

    /// Edit application fields
    Edit {
        /// Application id or unique prefix
        id: String,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        role: Option<String>,

        /// Date applied (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Next round date, or "tbd" to clear it
        #[arg(long)]
        next: Option<String>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Replace the notes (the round tag is kept)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an application
    Delete {
        /// Application id or unique prefix
        id: String,
    },

    /// Attach a resume to an application
    Attach {
        /// Application id or unique prefix
        id: String,
        file: PathBuf,
    },

    /// Show totals and response rate
    Stats,

    /// Rounds scheduled in the next 7 days
    Upcoming,

    /// Browse applications interactively
    Browse {
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        status: Option<ApplicationStatus>,

        #[arg(long, default_value = "date")]
        sort: SortKey,
    },

    /// Manage your public profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Account security and deletion
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile
    Show,

    /// Update profile fields
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        headline: Option<String>,

        #[arg(long)]
        about: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Comma-separated skills
        #[arg(long)]
        skills: Option<String>,

        /// Comma-separated interests
        #[arg(long)]
        interests: Option<String>,
    },

    /// Claim a username for your public page
    Claim { username: String },

    /// Add a position to your portfolio
    AddExperience {
        title: String,
        company: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// You still work here
        #[arg(long)]
        current: bool,

        #[arg(long)]
        description: Option<String>,
    },

    /// Add a school to your portfolio
    AddEducation {
        school: String,

        #[arg(long)]
        degree: Option<String>,

        /// Field of study
        #[arg(long)]
        field: Option<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        current: bool,
    },

    /// Add a certification to your portfolio
    AddCert {
        name: String,

        /// Issuing organization
        #[arg(long)]
        org: Option<String>,

        /// Issue date (YYYY-MM-DD)
        #[arg(long)]
        issued: Option<String>,

        /// Credential URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Add a social or website link
    AddLink { url: String },

    /// Remove a portfolio entry by its number in 'profile show'
    Remove {
        /// experience, education, cert, or link
        kind: PortfolioKind,
        position: usize,
    },

    /// Look up someone's public profile
    Public { username: String },

    /// Upload an avatar image
    Avatar { file: PathBuf },

    /// Upload a cover image
    Cover { file: PathBuf },

    /// Hide your profile and sign out
    Hibernate,

    /// Make your profile public again
    Reactivate,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Send the password-changed security alert
    PasswordChanged,

    /// Permanently delete your account and all data
    Delete {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut identity = SessionFile::new(config.session_path());
    identity.subscribe(Box::new(|session| match session {
        Some(s) => tracing::debug!(user = %s.user_id, "session changed"),
        None => tracing::debug!("session cleared"),
    }));

    // Commands that don't need a signed-in user or an initialized database.
    match &cli.command {
        Commands::Init => {
            let db = Database::open(&config.db_path)?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
            return Ok(());
        }
        Commands::Login {
            email,
            user_id,
            provider,
            verified,
        } => {
            let session = Session {
                user_id: user_id.clone().unwrap_or_else(|| email.trim().to_lowercase()),
                email: email.trim().to_string(),
                email_verified: *verified,
                provider: AuthProvider::parse(provider),
            };
            identity.sign_in(&session)?;
            let session = require_session(&identity)?;
            println!("Signed in as {} ({})", session.email, session.user_id);
            return Ok(());
        }
        Commands::Logout => {
            identity.sign_out()?;
            println!("Signed out ({} removed).", identity.path().display());
            return Ok(());
        }
        Commands::Whoami => {
            match identity.current_session()? {
                Some(s) => println!(
                    "{} ({}) via {:?}{}",
                    s.email,
                    s.user_id,
                    s.provider,
                    if s.email_verified { "" } else { ", unverified" }
                ),
                None => println!("Not signed in."),
            }
            return Ok(());
        }
        _ => {}
    }

    let db = open_database(&config, cli.demo)?;
    let demo_store;
    let (records, session): (&dyn RecordStore, Session) = match &db {
        Some(db) => (db as &dyn RecordStore, require_session(&identity)?),
        None => {
            demo_store = DemoStore::seeded();
            (&demo_store as &dyn RecordStore, demo_session())
        }
    };
    let owner = session.user_id.as_str();
    let blobs = FsBlobStore::new(config.blob_root());

    match cli.command {
        Commands::Init | Commands::Login { .. } | Commands::Logout | Commands::Whoami => {}

        Commands::Add {
            company,
            role,
            date,
            next,
            salary,
            location,
            notes,
            resume,
        } => {
            let mut new = NewApplication {
                company,
                role,
                date_applied: date.as_deref().map(parse_date).transpose()?,
                next_event_at: next.as_deref().map(parse_when).transpose()?,
                salary,
                location,
                notes,
                resume: None,
            };
            new.validate()?;

            if let Some(path) = resume {
                if cli.demo {
                    println!("(Demo mode - resume not stored)");
                } else {
                    let (name, bytes) = read_upload(&path)?;
                    new.resume = upload_resume(&blobs, owner, &name, &bytes);
                    if new.resume.is_none() {
                        println!("Resume upload failed; saving the application without it.");
                    }
                }
            }

            let app = records.insert_record(owner, new)?;
            println!("Added {} at {} [{}]", app.role, app.company, short_id(&app.id));
            if cli.demo {
                println!("(Demo mode - data won't be saved)");
            }
        }

        Commands::List { query, status, sort } => {
            let apps = records.list_records(owner)?;
            let query = ListQuery { text: query, status, sort };
            let view = filter_and_sort(&apps, &query);
            if view.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<9} {:<11} {:<20} {:<26} {:<11} {:<17} {:>10}",
                    "ID", "STATUS", "COMPANY", "ROLE", "APPLIED", "NEXT", "SALARY"
                );
                println!("{}", "-".repeat(110));
                for app in view {
                    println!(
                        "{:<9} {:<11} {:<20} {:<26} {:<11} {:<17} {:>10}",
                        short_id(&app.id),
                        app.status.as_str(),
                        truncate(&app.company, 18),
                        truncate(&app.role, 24),
                        app.date_applied,
                        format_next(app),
                        truncate(app.salary.as_deref().unwrap_or("-"), 10),
                    );
                }
            }
        }

        Commands::Show { id } => {
            let id = resolve_id(records, owner, &id)?;
            match records.get_record(owner, id)? {
                Some(app) => print_application(&app),
                None => println!("Application {} not found.", id),
            }
        }

        Commands::Advance {
            id,
            round,
            date,
            label,
            status,
            event_notes,
        } => {
            let id = resolve_id(records, owner, &id)?;
            let transition = Transition {
                round,
                scheduled_at: date.as_deref().map(parse_when).transpose()?,
                custom_label: label,
                manual_status: status,
                event_notes,
            };
            let app = advance(records, owner, id, &transition)?;
            let latest = app.latest_event().map(|e| e.display_name()).unwrap_or("-");
            println!(
                "{} at {}: {} -> {} (next: {})",
                app.role,
                app.company,
                latest,
                app.status,
                format_next(&app)
            );
        }

        Commands::SetStatus { id, status } => {
            let id = resolve_id(records, owner, &id)?;
            records.update_record(owner, id, &ApplicationPatch::status(status))?;
            println!("Marked {} as {}.", short_id(&id), status);
        }

        Commands::Edit {
            id,
            company,
            role,
            date,
            next,
            salary,
            location,
            notes,
        } => {
            let id = resolve_id(records, owner, &id)?;
            let app = records
                .get_record(owner, id)?
                .ok_or_else(|| anyhow!("Application {} not found", id))?;

            let next_event_at = match next.as_deref().map(str::trim) {
                None => None,
                Some(v) if v.eq_ignore_ascii_case("tbd") => Some(None),
                Some(v) => Some(Some(parse_when(v)?)),
            };
            let patch = ApplicationPatch {
                company,
                role,
                date_applied: date.as_deref().map(parse_date).transpose()?,
                next_event_at,
                salary: salary.map(Some),
                location: location.map(Some),
                notes: notes.and_then(|n| ApplicationPatch::notes(&app, &n).notes),
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("Nothing to change. Pass at least one field, e.g. --notes or --next.");
            }
            records.update_record(owner, id, &patch)?;
            println!("Updated {}.", short_id(&id));
        }

        Commands::Delete { id } => {
            let id = resolve_id(records, owner, &id)?;
            records.delete_record(owner, id)?;
            println!("Deleted {}.", short_id(&id));
        }

        Commands::Attach { id, file } => {
            if cli.demo {
                bail!("Attachments are not available in demo mode");
            }
            let id = resolve_id(records, owner, &id)?;
            let (name, bytes) = read_upload(&file)?;
            match upload_resume(&blobs, owner, &name, &bytes) {
                Some(resume) => {
                    let patch = ApplicationPatch {
                        resume: Some(Some(resume.clone())),
                        ..Default::default()
                    };
                    records.update_record(owner, id, &patch)?;
                    println!("Attached {} ({})", resume.name, resume.url);
                }
                None => println!("Upload failed; the application was left unchanged."),
            }
        }

        Commands::Stats => {
            let apps = records.list_records(owner)?;
            let stats = view::stats(&apps);
            println!("Total applications: {}", stats.total);
            println!("Interviews:         {}", stats.interviews);
            println!("Offers:             {}", stats.offers);
            println!("Response rate:      {}%", stats.response_rate);
            println!();
            for (status, count) in view::status_counts(&apps) {
                println!("{:<11} {:>3} {}", status.as_str(), count, "#".repeat(count));
            }
        }

        Commands::Upcoming => {
            let apps = records.list_records(owner)?;
            let today = chrono::Local::now().date_naive();
            let due = view::upcoming(&apps, today);
            if due.is_empty() {
                println!("Nothing scheduled in the next 7 days.");
            } else {
                for app in due {
                    let round = app.latest_event().map(|e| e.display_name()).unwrap_or("-");
                    println!(
                        "{}  {:<14} {} at {}",
                        format_next(app),
                        round,
                        app.role,
                        app.company
                    );
                }
            }
        }

        Commands::Browse { query, status, sort } => {
            tui::run_browse(records, owner, ListQuery { text: query, status, sort })?;
        }

        Commands::Profile { command } => {
            let Some(db) = db.as_ref() else {
                bail!("Profiles are not available in demo mode");
            };
            let notifier = config.notifier();
            let services = Services {
                identity: &identity,
                records: db,
                profiles: db,
                blobs: &blobs,
                notifier: notifier.as_ref(),
            };
            run_profile(command, &services, db, &session, &config)?;
        }

        Commands::Account { command } => {
            let Some(db) = db.as_ref() else {
                bail!("Account actions are not available in demo mode");
            };
            let notifier = config.notifier();
            let services = Services {
                identity: &identity,
                records: db,
                profiles: db,
                blobs: &blobs,
                notifier: notifier.as_ref(),
            };
            match command {
                AccountCommands::PasswordChanged => {
                    account::record_password_change(&services, &session);
                    println!("Security alert sent to {}.", session.email);
                }
                AccountCommands::Delete { yes } => {
                    if !yes {
                        bail!("This permanently deletes every application, file and your profile. Re-run with --yes to confirm.");
                    }
                    let report = account::delete_account(&services, &session)?;
                    println!(
                        "Account deleted: {} application(s), {} file(s) removed.",
                        report.records, report.files
                    );
                }
            }
        }
    }

    Ok(())
}

fn run_profile(
    command: ProfileCommands,
    services: &Services,
    profiles: &dyn ProfileStore,
    session: &Session,
    config: &Config,
) -> Result<()> {
    let user = session.user_id.as_str();
    match command {
        ProfileCommands::Show => match profiles.get_profile(user)? {
            Some(profile) => {
                print!("{}", render_profile(&profile));
                println!("Visibility: {}", profile.visibility);
                if let Some(username) = &profile.username {
                    println!("Public URL: {}", public_url(&config.public_url, username));
                }
            }
            None => println!("No profile yet. Run 'tracker profile set --name ...' to create one."),
        },

        ProfileCommands::Set {
            name,
            headline,
            about,
            location,
            skills,
            interests,
        } => {
            update_profile(profiles, user, |profile| {
                if let Some(name) = name {
                    profile.full_name = name;
                }
                if let Some(headline) = headline {
                    profile.set_headline(&headline);
                }
                if let Some(about) = about {
                    profile.about = Some(about);
                }
                if let Some(location) = location {
                    profile.location = Some(location);
                }
                if let Some(skills) = skills {
                    profile.skills = split_list(&skills);
                }
                if let Some(interests) = interests {
                    profile.interests = split_list(&interests);
                }
                Ok(())
            })?;
            println!("Profile saved.");
        }

        ProfileCommands::Claim { username } => {
            let username = normalize_username(&username);
            match check_username(profiles, user, &username)? {
                UsernameCheck::TooShort => {
                    bail!("Usernames need at least {} characters", profile::MIN_USERNAME_LEN)
                }
                UsernameCheck::Taken { suggestions } => {
                    println!("'{}' is taken.", username);
                    if !suggestions.is_empty() {
                        println!("Available: {}", suggestions.join(", "));
                    }
                }
                UsernameCheck::Available => {
                    update_profile(profiles, user, |profile| {
                        profile.username = Some(username.clone());
                        Ok(())
                    })?;
                    println!("Claimed '{}': {}", username, public_url(&config.public_url, &username));
                }
            }
        }

        ProfileCommands::AddExperience {
            title,
            company,
            start,
            end,
            current,
            description,
        } => {
            let entry = PortfolioEntry::Experience(Experience {
                title,
                company,
                start_date: start.as_deref().map(parse_date).transpose()?,
                end_date: end.as_deref().map(parse_date).transpose()?,
                current,
                description: description.unwrap_or_default(),
                ..Default::default()
            });
            update_profile(profiles, user, |p| Ok(p.add_entry(entry)?))?;
            println!("Experience added.");
        }

        ProfileCommands::AddEducation {
            school,
            degree,
            field,
            start,
            end,
            current,
        } => {
            let entry = PortfolioEntry::Education(Education {
                school,
                degree: degree.unwrap_or_default(),
                field: field.unwrap_or_default(),
                start_date: start.as_deref().map(parse_date).transpose()?,
                end_date: end.as_deref().map(parse_date).transpose()?,
                current,
                ..Default::default()
            });
            update_profile(profiles, user, |p| Ok(p.add_entry(entry)?))?;
            println!("Education added.");
        }

        ProfileCommands::AddCert { name, org, issued, url } => {
            let entry = PortfolioEntry::Certification(Certification {
                name,
                org: org.unwrap_or_default(),
                issue_date: issued.as_deref().map(parse_date).transpose()?,
                url: url.unwrap_or_default(),
                ..Default::default()
            });
            update_profile(profiles, user, |p| Ok(p.add_entry(entry)?))?;
            println!("Certification added.");
        }

        ProfileCommands::AddLink { url } => {
            let link = SocialLink::new(&url);
            let platform = link.platform.clone();
            update_profile(profiles, user, |p| Ok(p.add_entry(PortfolioEntry::Link(link))?))?;
            println!("Added {} link.", platform);
        }

        ProfileCommands::Remove { kind, position } => {
            update_profile(profiles, user, |p| Ok(p.remove_entry(kind, position)?))?;
            println!("Removed {} #{}.", kind.as_str(), position);
        }

        ProfileCommands::Public { username } => {
            let username = normalize_username(&username);
            match profiles.get_profile_by_username(&username)? {
                Some(profile) => print!("{}", render_profile(&profile)),
                None => println!("The user \"{}\" does not exist or has changed their handle.", username),
            }
        }

        ProfileCommands::Avatar { file } => {
            let (name, bytes) = read_upload(&file)?;
            let url = account::set_profile_image(services, session, ProfileImage::Avatar, &name, &bytes)?;
            println!("Avatar updated: {}", url);
        }

        ProfileCommands::Cover { file } => {
            let (name, bytes) = read_upload(&file)?;
            let url = account::set_profile_image(services, session, ProfileImage::Cover, &name, &bytes)?;
            println!("Cover updated: {}", url);
        }

        ProfileCommands::Hibernate => {
            account::hibernate(services, session)?;
            println!("Profile hidden and signed out. Log in and run 'tracker profile reactivate' to undo.");
        }

        ProfileCommands::Reactivate => {
            account::reactivate(services, session)?;
            println!("Profile is public again.");
        }
    }
    Ok(())
}

/// The user's database, or `None` in demo mode. Demo runs never touch the
/// data directory.
fn open_database(config: &Config, demo: bool) -> Result<Option<Database>> {
    if demo {
        return Ok(None);
    }
    let db = Database::open(&config.db_path)?;
    db.ensure_initialized()?;
    Ok(Some(db))
}

/// Loads the user's profile (or a blank one), edits it, and saves it back.
/// Nothing is written when `edit` fails.
fn update_profile(
    profiles: &dyn ProfileStore,
    user: &str,
    edit: impl FnOnce(&mut Profile) -> Result<()>,
) -> Result<Profile> {
    let mut profile = profiles.get_profile(user)?.unwrap_or_else(|| Profile::empty(user));
    edit(&mut profile)?;
    profiles.upsert_profile(&profile)?;
    Ok(profile)
}

/// Runs a transition against the stored record and writes the result back.
fn advance(store: &dyn RecordStore, owner: &str, id: Uuid, transition: &Transition) -> Result<Application> {
    let current = store
        .get_record(owner, id)?
        .ok_or_else(|| anyhow!("Application {} not found", id))?;
    let next = apply_transition(&current, transition)?;
    store.update_record(owner, id, &ApplicationPatch::stage_of(&next))?;
    Ok(next)
}

/// Accepts a full id or any prefix that matches exactly one application.
fn resolve_id(store: &dyn RecordStore, owner: &str, raw: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }
    let prefix = raw.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("Application id is required");
    }
    let matches: Vec<Uuid> = store
        .list_records(owner)?
        .into_iter()
        .map(|a| a.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("No application matches '{}'", raw)),
        _ => Err(anyhow!("'{}' matches {} applications; use more characters", raw, matches.len())),
    }
}

fn demo_session() -> Session {
    Session {
        user_id: DEMO_USER.to_string(),
        email: "demo@example.com".to_string(),
        email_verified: true,
        provider: AuthProvider::MagicLink,
    }
}

fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?
        .to_string();
    Ok((name, bytes))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_application(app: &Application) {
    println!("{} at {}", app.role, app.company);
    println!("ID: {}", app.id);
    println!("Status: {}", app.status);
    println!("Applied: {}", app.date_applied);
    println!("Next: {}", format_next(app));
    if let Some(salary) = &app.salary {
        println!("Salary: {}", salary);
    }
    if let Some(location) = &app.location {
        println!("Location: {}", location);
    }
    if let Some(resume) = &app.resume {
        println!("Resume: {} ({})", resume.name, resume.url);
    }
    let notes = app.editable_notes();
    if !notes.trim().is_empty() {
        println!("\n--- Notes ---\n{}", textwrap::fill(&notes, 80));
    }
    println!("\n--- Timeline ---");
    for event in &app.timeline {
        let when = event
            .scheduled_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "TBD".to_string());
        let state = if event.completed { "done" } else { "current" };
        println!("  {:<16} {:<17} {}", event.display_name(), when, state);
        if let Some(notes) = &event.notes {
            println!("  {:<16} {}", "", notes);
        }
    }
}

fn format_next(app: &Application) -> String {
    app.next_event_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "TBD".to_string())
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_persists_engine_result() {
        let store = DemoStore::seeded();
        let app = store.insert_record(DEMO_USER, NewApplication::new("Acme", "Engineer")).unwrap();

        let transition = Transition::new(RoundType::Technical).scheduled(parse_when("2024-06-01").unwrap());
        let moved = advance(&store, DEMO_USER, app.id, &transition).unwrap();
        let stored = store.get_record(DEMO_USER, app.id).unwrap().unwrap();
        assert_eq!(stored, moved);
        assert_eq!(stored.status, ApplicationStatus::Interview);
    }

    #[test]
    fn test_advance_rejects_before_writing() {
        let store = DemoStore::seeded();
        let app = store.insert_record(DEMO_USER, NewApplication::new("Acme", "Engineer")).unwrap();

        assert!(advance(&store, DEMO_USER, app.id, &Transition::new(RoundType::Custom)).is_err());
        assert_eq!(store.get_record(DEMO_USER, app.id).unwrap().unwrap(), app);
    }

    #[test]
    fn test_resolve_id_by_prefix() {
        let store = DemoStore::new();
        let app = store.insert_record("u", NewApplication::new("Acme", "Engineer")).unwrap();
        let full = app.id.to_string();

        assert_eq!(resolve_id(&store, "u", &full).unwrap(), app.id);
        assert_eq!(resolve_id(&store, "u", &full[..8]).unwrap(), app.id);
        assert!(resolve_id(&store, "u", "zzzz").is_err());
        assert!(resolve_id(&store, "u", "").is_err());
    }

    #[test]
    fn test_truncate_and_split() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer company name", 10), "a much ...");
        assert_eq!(split_list("Rust, SQL,, Go "), vec!["Rust", "SQL", "Go"]);
    }

    #[test]
    fn test_portfolio_edits_are_saved() {
        let db = Database::open_in_memory().unwrap();
        let link = PortfolioEntry::Link(SocialLink::new("github.com/alice"));
        update_profile(&db, "alice", |p| Ok(p.add_entry(link)?)).unwrap();
        let cert = PortfolioEntry::Certification(Certification {
            name: "CKA".to_string(),
            ..Default::default()
        });
        update_profile(&db, "alice", |p| Ok(p.add_entry(cert)?)).unwrap();

        let saved = db.get_profile("alice").unwrap().unwrap();
        assert_eq!(saved.social_links[0].platform, "github");
        assert_eq!(saved.certifications[0].name, "CKA");

        assert!(update_profile(&db, "alice", |p| Ok(p.remove_entry(PortfolioKind::Link, 5)?)).is_err());
        assert_eq!(db.get_profile("alice").unwrap().unwrap(), saved);

        update_profile(&db, "alice", |p| Ok(p.remove_entry(PortfolioKind::Link, 1)?)).unwrap();
        let saved = db.get_profile("alice").unwrap().unwrap();
        assert!(saved.social_links.is_empty());
        assert_eq!(saved.certifications.len(), 1);
    }

    #[test]
    fn test_cli_parses_portfolio_commands() {
        let cli = Cli::try_parse_from(["tracker", "profile", "remove", "cert", "2"]).unwrap();
        match cli.command {
            Commands::Profile {
                command: ProfileCommands::Remove { kind, position },
            } => {
                assert_eq!(kind, PortfolioKind::Certification);
                assert_eq!(position, 2);
            }
            _ => panic!("expected profile remove"),
        }
        assert!(Cli::try_parse_from(["tracker", "profile", "remove", "hobbies", "1"]).is_err());
        assert!(Cli::try_parse_from([
            "tracker", "profile", "add-experience", "Engineer", "Acme", "--start", "2021-01-01", "--current",
        ])
        .is_ok());
    }

    #[test]
    fn test_demo_leaves_data_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config = Config {
            db_path: data_dir.join("tracker.db"),
            data_dir: data_dir.clone(),
            resend_api_key: None,
            mail_from: "noreply@example.com".to_string(),
            public_url: "http://localhost".to_string(),
            rust_log: "warn".to_string(),
        };

        assert!(open_database(&config, true).unwrap().is_none());
        assert!(!data_dir.exists());

        // Not initialized yet, so the real path refuses to continue.
        assert!(open_database(&config, false).is_err());
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_cli_parses_advance() {
        let cli = Cli::try_parse_from([
            "tracker", "advance", "1234", "phone-screen", "--date", "2024-06-01T09:30",
        ])
        .unwrap();
        match cli.command {
            Commands::Advance { round, date, .. } => {
                assert_eq!(round, RoundType::PhoneScreen);
                assert_eq!(date.as_deref(), Some("2024-06-01T09:30"));
            }
            _ => panic!("expected advance"),
        }
    }
}
