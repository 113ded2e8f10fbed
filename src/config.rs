use anyhow::Result;
use std::path::PathBuf;

use crate::notify::{LogNotifier, Notifier, ResendNotifier};

const DEFAULT_MAIL_FROM: &str = "Tracker Security <onboarding@resend.dev>";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:5173";

/// Runtime configuration from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub public_url: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir = optional_env("TRACKER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let db_path = optional_env("TRACKER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("tracker.db"));

        Ok(Config {
            db_path,
            resend_api_key: optional_env("RESEND_API_KEY"),
            mail_from: optional_env("TRACKER_MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            public_url: optional_env("TRACKER_PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "warn".to_string()),
            data_dir,
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn notifier(&self) -> Box<dyn Notifier> {
        match &self.resend_api_key {
            Some(key) => Box::new(ResendNotifier::new(key.clone(), self.mail_from.clone())),
            None => Box::new(LogNotifier),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    match directories::ProjectDirs::from("", "", "tracker") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from("."),
    }
}
