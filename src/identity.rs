use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum AuthProvider {
    Email,
    MagicLink,
    #[serde(rename = "oauth")]
    OAuth(String),
}

impl AuthProvider {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "email" | "password" => AuthProvider::Email,
            "magic-link" | "magic_link" | "magiclink" | "otp" => AuthProvider::MagicLink,
            other => AuthProvider::OAuth(other.to_string()),
        }
    }
}

/// Who is using the tool. Passed explicitly to anything that acts for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
    pub provider: AuthProvider,
}

pub type SessionListener = Box<dyn Fn(Option<&Session>)>;

pub trait IdentityProvider {
    fn current_session(&self) -> Result<Option<Session>>;
    /// `listener` is called with the new session after every sign-in or sign-out.
    fn subscribe(&mut self, listener: SessionListener);
    fn sign_out(&self) -> Result<()>;
}

/// Session persisted as JSON next to the database.
pub struct SessionFile {
    path: PathBuf,
    listeners: Vec<SessionListener>,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            listeners: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sign_in(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;
        tracing::info!(user = %session.user_id, "signed in");
        self.notify(Some(session));
        Ok(())
    }

    fn notify(&self, session: Option<&Session>) {
        for listener in &self.listeners {
            listener(session);
        }
    }
}

impl IdentityProvider for SessionFile {
    fn current_session(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file: {e}");
                Ok(None)
            }
        }
    }

    fn subscribe(&mut self, listener: SessionListener) {
        self.listeners.push(listener);
    }

    fn sign_out(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        }
        tracing::info!("signed out");
        self.notify(None);
        Ok(())
    }
}

/// Returns the signed-in session, or why there isn't a usable one. Password
/// users with an unverified address are signed out on the spot.
pub fn require_session(identity: &dyn IdentityProvider) -> Result<Session> {
    let session = identity.current_session()?.ok_or(AuthError::NotSignedIn)?;
    if session.provider == AuthProvider::Email && !session.email_verified {
        identity.sign_out()?;
        return Err(AuthError::EmailUnverified(session.email).into());
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session(provider: AuthProvider, verified: bool) -> Session {
        Session {
            user_id: "user-1".to_string(),
            email: "jane@example.com".to_string(),
            email_verified: verified,
            provider,
        }
    }

    #[test]
    fn test_no_session_file_means_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let identity = SessionFile::new(dir.path().join("session.json"));
        assert!(identity.current_session().unwrap().is_none());

        let err = require_session(&identity).unwrap_err();
        assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::NotSignedIn));
    }

    #[test]
    fn test_sign_in_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut identity = SessionFile::new(dir.path().join("session.json"));
        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        identity.subscribe(Box::new(move |s| sink.borrow_mut().push(s.map(|s| s.user_id.clone()))));

        identity.sign_in(&session(AuthProvider::OAuth("github".to_string()), false)).unwrap();
        let current = require_session(&identity).unwrap();
        assert_eq!(current.user_id, "user-1");

        identity.sign_out().unwrap();
        assert!(identity.current_session().unwrap().is_none());
        assert_eq!(*seen.borrow(), vec![Some("user-1".to_string()), None]);
    }

    #[test]
    fn test_unverified_email_user_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let identity = SessionFile::new(dir.path().join("session.json"));
        identity.sign_in(&session(AuthProvider::Email, false)).unwrap();

        let err = require_session(&identity).unwrap_err();
        assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::EmailUnverified(_))));
        assert!(identity.current_session().unwrap().is_none());
    }

    #[test]
    fn test_magic_link_does_not_need_verification_flag() {
        let dir = tempfile::tempdir().unwrap();
        let identity = SessionFile::new(dir.path().join("session.json"));
        identity.sign_in(&session(AuthProvider::MagicLink, false)).unwrap();
        assert!(require_session(&identity).is_ok());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(AuthProvider::parse("Email"), AuthProvider::Email);
        assert_eq!(AuthProvider::parse("magic-link"), AuthProvider::MagicLink);
        assert_eq!(AuthProvider::parse("GitHub"), AuthProvider::OAuth("github".to_string()));
    }
}
