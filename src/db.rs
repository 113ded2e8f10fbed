use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Application, ApplicationPatch, NewApplication, ResumeRef, TimelineEvent};
use crate::profile::{parse_list, Profile, ProfileStore, Visibility};

/// Where application records live. Every call is scoped to one owner; ids
/// belonging to someone else behave as if they did not exist.
pub trait RecordStore {
    /// Newest-created first.
    fn list_records(&self, owner: &str) -> Result<Vec<Application>>;
    fn get_record(&self, owner: &str, id: Uuid) -> Result<Option<Application>>;
    fn insert_record(&self, owner: &str, new: NewApplication) -> Result<Application>;
    fn update_record(&self, owner: &str, id: Uuid, patch: &ApplicationPatch) -> Result<()>;
    fn delete_record(&self, owner: &str, id: Uuid) -> Result<()>;
    /// Removes every record the owner has. Returns how many went.
    fn delete_all_records(&self, owner: &str) -> Result<usize>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

const APPLICATION_COLUMNS: &str = "id, owner, company, role, status, date_applied, next_event_at,
     salary, location, notes, current_round, timeline, resume_url, resume_name, created_at";

const PROFILE_COLUMNS: &str = "id, username, full_name, avatar_url, cover_url, headline, header_text,
     about, location, status, skills, interests, experience, education, certifications, social_links";

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Applied'
                    CHECK (status IN ('Saved', 'Applied', 'Assessment', 'Interview', 'Offer', 'Rejected')),
                date_applied TEXT NOT NULL,
                next_event_at TEXT,
                salary TEXT,
                location TEXT,
                notes TEXT,
                current_round TEXT,
                timeline TEXT NOT NULL DEFAULT '[]',
                resume_url TEXT,
                resume_name TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE,
                full_name TEXT NOT NULL DEFAULT '',
                avatar_url TEXT,
                cover_url TEXT,
                headline TEXT,
                header_text TEXT,
                about TEXT,
                location TEXT,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'hibernated')),
                skills TEXT NOT NULL DEFAULT '[]',
                interests TEXT NOT NULL DEFAULT '[]',
                experience TEXT NOT NULL DEFAULT '[]',
                education TEXT NOT NULL DEFAULT '[]',
                certifications TEXT NOT NULL DEFAULT '[]',
                social_links TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_applications_owner ON applications(owner);
            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'tracker init' first."));
        }
        Ok(())
    }

    fn write_application(conn: &Connection, app: &Application) -> Result<()> {
        let timeline = serde_json::to_string(&app.timeline).context("Failed to encode timeline")?;
        let (resume_url, resume_name) = match &app.resume {
            Some(r) => (Some(r.url.as_str()), Some(r.name.as_str())),
            None => (None, None),
        };
        conn.execute(
            "UPDATE applications SET company = ?1, role = ?2, status = ?3, date_applied = ?4,
                next_event_at = ?5, salary = ?6, location = ?7, notes = ?8, current_round = ?9,
                timeline = ?10, resume_url = ?11, resume_name = ?12, updated_at = datetime('now')
             WHERE id = ?13 AND owner = ?14",
            params![
                app.company,
                app.role,
                app.status.as_str(),
                app.date_applied,
                app.next_event_at,
                app.salary,
                app.location,
                app.notes,
                app.current_round.map(|r| r.label()),
                timeline,
                resume_url,
                resume_name,
                app.id.to_string(),
                app.owner,
            ],
        )?;
        Ok(())
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let current_round: Option<String> = row.get(10)?;
        let timeline: String = row.get(11)?;
        let resume_url: Option<String> = row.get(12)?;
        let resume_name: Option<String> = row.get(13)?;

        Ok(Application {
            id: parse_column(0, row.get(0)?)?,
            owner: row.get(1)?,
            company: row.get(2)?,
            role: row.get(3)?,
            status: parse_column(4, row.get(4)?)?,
            date_applied: row.get::<_, NaiveDate>(5)?,
            next_event_at: row.get::<_, Option<NaiveDateTime>>(6)?,
            salary: row.get(7)?,
            location: row.get(8)?,
            notes: row.get(9)?,
            current_round: current_round.map(|r| parse_column(10, r)).transpose()?,
            timeline: serde_json::from_str::<Vec<TimelineEvent>>(&timeline)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?,
            resume: match (resume_url, resume_name) {
                (Some(url), Some(name)) => Some(ResumeRef { url, name }),
                _ => None,
            },
            created_at: row.get(14)?,
        })
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            username: row.get(1)?,
            full_name: row.get(2)?,
            avatar_url: row.get(3)?,
            cover_url: row.get(4)?,
            headline: row.get(5)?,
            header_text: row.get(6)?,
            about: row.get(7)?,
            location: row.get(8)?,
            visibility: parse_column::<Visibility>(9, row.get(9)?)?,
            skills: parse_list(row.get::<_, Option<String>>(10)?.as_deref()),
            interests: parse_list(row.get::<_, Option<String>>(11)?.as_deref()),
            experience: parse_list(row.get::<_, Option<String>>(12)?.as_deref()),
            education: parse_list(row.get::<_, Option<String>>(13)?.as_deref()),
            certifications: parse_list(row.get::<_, Option<String>>(14)?.as_deref()),
            social_links: parse_list(row.get::<_, Option<String>>(15)?.as_deref()),
        })
    }
}

impl RecordStore for Database {
    fn list_records(&self, owner: &str) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE owner = ?1 ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner], Self::row_to_application)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    fn get_record(&self, owner: &str, id: Uuid) -> Result<Option<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1 AND owner = ?2");
        self.conn
            .query_row(&sql, params![id.to_string(), owner], Self::row_to_application)
            .optional()
            .with_context(|| format!("Failed to load application {id}"))
    }

    fn insert_record(&self, owner: &str, new: NewApplication) -> Result<Application> {
        let app = Application::new(owner, new)?;
        let timeline = serde_json::to_string(&app.timeline).context("Failed to encode timeline")?;
        let (resume_url, resume_name) = match &app.resume {
            Some(r) => (Some(r.url.clone()), Some(r.name.clone())),
            None => (None, None),
        };

        self.conn.execute(
            "INSERT INTO applications (id, owner, company, role, status, date_applied, next_event_at,
                salary, location, notes, current_round, timeline, resume_url, resume_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                app.id.to_string(),
                app.owner,
                app.company,
                app.role,
                app.status.as_str(),
                app.date_applied,
                app.next_event_at,
                app.salary,
                app.location,
                app.notes,
                app.current_round.map(|r| r.label()),
                timeline,
                resume_url,
                resume_name,
                app.created_at,
            ],
        )?;

        tracing::info!(application = %app.id, company = %app.company, "inserted application");
        Ok(app)
    }

    fn update_record(&self, owner: &str, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        patch.validate()?;
        let tx = self.conn.unchecked_transaction()?;

        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1 AND owner = ?2");
        let mut app = tx
            .query_row(&sql, params![id.to_string(), owner], Self::row_to_application)
            .optional()?
            .ok_or_else(|| anyhow!("Application {} not found", id))?;

        patch.apply_to(&mut app);
        Self::write_application(&tx, &app)?;
        tx.commit()?;

        tracing::debug!(application = %id, "updated application");
        Ok(())
    }

    fn delete_record(&self, owner: &str, id: Uuid) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM applications WHERE id = ?1 AND owner = ?2",
            params![id.to_string(), owner],
        )?;
        if removed == 0 {
            return Err(anyhow!("Application {} not found", id));
        }
        tracing::info!(application = %id, "deleted application");
        Ok(())
    }

    fn delete_all_records(&self, owner: &str) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM applications WHERE owner = ?1", [owner])?;
        Ok(removed)
    }
}

impl ProfileStore for Database {
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
        self.conn
            .query_row(&sql, [user_id], Self::row_to_profile)
            .optional()
            .context("Failed to load profile")
    }

    fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ?1 AND status = 'active'");
        self.conn
            .query_row(&sql, [username], Self::row_to_profile)
            .optional()
            .context("Failed to look up profile")
    }

    fn username_owner(&self, username: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT id FROM profiles WHERE username = ?1", [username], |row| row.get(0))
            .optional()
            .context("Failed to check username")
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO profiles (id, username, full_name, avatar_url, cover_url, headline, header_text,
                about, location, status, skills, interests, experience, education, certifications, social_links)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username, full_name = excluded.full_name,
                avatar_url = excluded.avatar_url, cover_url = excluded.cover_url,
                headline = excluded.headline, header_text = excluded.header_text,
                about = excluded.about, location = excluded.location, status = excluded.status,
                skills = excluded.skills, interests = excluded.interests,
                experience = excluded.experience, education = excluded.education,
                certifications = excluded.certifications, social_links = excluded.social_links,
                updated_at = datetime('now')",
            params![
                profile.id,
                profile.username,
                profile.full_name,
                profile.avatar_url,
                profile.cover_url,
                profile.headline,
                profile.header_text,
                profile.about,
                profile.location,
                profile.visibility.as_str(),
                encode_list(&profile.skills)?,
                encode_list(&profile.interests)?,
                encode_list(&profile.experience)?,
                encode_list(&profile.education)?,
                encode_list(&profile.certifications)?,
                encode_list(&profile.social_links)?,
            ],
        )?;
        Ok(())
    }

    fn set_visibility(&self, user_id: &str, visibility: Visibility) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE profiles SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![visibility.as_str(), user_id],
        )?;
        if changed == 0 {
            return Err(anyhow!("No profile yet. Run 'tracker profile set' first."));
        }
        Ok(())
    }

    fn delete_profile(&self, user_id: &str) -> Result<()> {
        self.conn.execute("DELETE FROM profiles WHERE id = ?1", [user_id])?;
        Ok(())
    }
}

fn encode_list<T: Serialize>(items: &[T]) -> Result<String> {
    serde_json::to_string(items).context("Failed to encode profile list")
}

fn parse_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
