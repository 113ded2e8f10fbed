//! Account-level actions that span several collaborators.

use anyhow::{Context, Result};

use crate::blob::{object_path, BlobStore, PROFILE_MEDIA, RESUMES};
use crate::db::RecordStore;
use crate::identity::{IdentityProvider, Session};
use crate::notify::{notify_quietly, EmailKind, Notifier};
use crate::profile::{Profile, ProfileStore, Visibility};

/// Everything an account action may need to touch.
pub struct Services<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub records: &'a dyn RecordStore,
    pub profiles: &'a dyn ProfileStore,
    pub blobs: &'a dyn BlobStore,
    pub notifier: &'a dyn Notifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    Cover,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub records: usize,
    pub files: usize,
}

/// Hides the public profile, tells the user, and ends the session.
pub fn hibernate(services: &Services, session: &Session) -> Result<()> {
    services.profiles.set_visibility(&session.user_id, Visibility::Hibernated)?;
    notify_quietly(services.notifier, &session.email, EmailKind::Hibernate);
    services.identity.sign_out()?;
    tracing::info!(user = %session.user_id, "profile hibernated");
    Ok(())
}

pub fn reactivate(services: &Services, session: &Session) -> Result<()> {
    services.profiles.set_visibility(&session.user_id, Visibility::Active)?;
    tracing::info!(user = %session.user_id, "profile reactivated");
    Ok(())
}

/// The password lives with the identity provider; all that is left for us is
/// the security alert.
pub fn record_password_change(services: &Services, session: &Session) {
    notify_quietly(services.notifier, &session.email, EmailKind::PasswordChange);
}

/// Wipes everything the user owns: files, records, profile, session.
pub fn delete_account(services: &Services, session: &Session) -> Result<DeletionReport> {
    let user = session.user_id.as_str();
    notify_quietly(services.notifier, &session.email, EmailKind::DeleteAccount);

    let mut report = DeletionReport::default();
    for bucket in [PROFILE_MEDIA, RESUMES] {
        report.files += services
            .blobs
            .remove_prefix(bucket, user)
            .with_context(|| format!("Failed to purge {bucket} for {user}"))?;
    }
    report.records = services.records.delete_all_records(user)?;
    services.profiles.delete_profile(user)?;
    services.identity.sign_out()?;

    tracing::info!(user, records = report.records, files = report.files, "account deleted");
    Ok(report)
}

/// Uploads an avatar or cover image and points the profile at it.
pub fn set_profile_image(
    services: &Services,
    session: &Session,
    which: ProfileImage,
    file_name: &str,
    bytes: &[u8],
) -> Result<String> {
    let path = object_path(&session.user_id, file_name);
    let url = services.blobs.upload(PROFILE_MEDIA, &path, bytes)?;

    let mut profile = services
        .profiles
        .get_profile(&session.user_id)?
        .unwrap_or_else(|| Profile::empty(&session.user_id));
    match which {
        ProfileImage::Avatar => profile.avatar_url = Some(url.clone()),
        ProfileImage::Cover => profile.cover_url = Some(url.clone()),
    }
    services.profiles.upsert_profile(&profile)?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FsBlobStore;
    use crate::db::Database;
    use crate::identity::{AuthProvider, SessionFile};
    use crate::models::NewApplication;
    use crate::notify::LogNotifier;

    struct Fixture {
        _dir: tempfile::TempDir,
        identity: SessionFile,
        db: Database,
        blobs: FsBlobStore,
        session: Session,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let identity = SessionFile::new(dir.path().join("session.json"));
            let session = Session {
                user_id: "alice".to_string(),
                email: "alice@example.com".to_string(),
                email_verified: true,
                provider: AuthProvider::Email,
            };
            identity.sign_in(&session).unwrap();
            let blobs = FsBlobStore::new(dir.path().join("blobs"));
            Self {
                identity,
                db: Database::open_in_memory().unwrap(),
                blobs,
                session,
                _dir: dir,
            }
        }

        fn services(&self) -> Services<'_> {
            Services {
                identity: &self.identity,
                records: &self.db,
                profiles: &self.db,
                blobs: &self.blobs,
                notifier: &LogNotifier,
            }
        }
    }

    #[test]
    fn test_delete_account_wipes_everything() {
        let fx = Fixture::new();
        let services = fx.services();
        fx.db.insert_record("alice", NewApplication::new("Acme", "Engineer")).unwrap();
        fx.db.insert_record("alice", NewApplication::new("Globex", "Engineer")).unwrap();
        fx.db.insert_record("bob", NewApplication::new("Initech", "Engineer")).unwrap();
        set_profile_image(&services, &fx.session, ProfileImage::Avatar, "me.png", b"png").unwrap();
        fx.blobs.upload(RESUMES, "alice/cv.pdf", b"pdf").unwrap();

        let report = delete_account(&services, &fx.session).unwrap();
        assert_eq!(report, DeletionReport { records: 2, files: 2 });
        assert!(fx.db.list_records("alice").unwrap().is_empty());
        assert_eq!(fx.db.list_records("bob").unwrap().len(), 1);
        assert!(fx.db.get_profile("alice").unwrap().is_none());
        assert!(fx.identity.current_session().unwrap().is_none());
    }

    #[test]
    fn test_hibernate_hides_profile_and_signs_out() {
        let fx = Fixture::new();
        let services = fx.services();
        let mut profile = Profile::empty("alice");
        profile.username = Some("alice".to_string());
        fx.db.upsert_profile(&profile).unwrap();

        hibernate(&services, &fx.session).unwrap();
        assert!(fx.db.get_profile_by_username("alice").unwrap().is_none());
        assert!(fx.identity.current_session().unwrap().is_none());

        reactivate(&services, &fx.session).unwrap();
        assert!(fx.db.get_profile_by_username("alice").unwrap().is_some());
    }

    #[test]
    fn test_set_cover_creates_profile() {
        let fx = Fixture::new();
        let services = fx.services();
        let url = set_profile_image(&services, &fx.session, ProfileImage::Cover, "banner.jpg", b"jpg").unwrap();
        let profile = fx.db.get_profile("alice").unwrap().unwrap();
        assert_eq!(profile.cover_url, Some(url));
        assert!(profile.avatar_url.is_none());
    }
}
