use anyhow::{anyhow, Context, Result};
use serde::Serialize;

// --- Email kinds ---

/// Security-relevant account events that get an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    PasswordChange,
    Hibernate,
    DeleteAccount,
}

impl EmailKind {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailKind::PasswordChange => "Security Alert: Password Changed",
            EmailKind::Hibernate => "Your Account is now Hidden",
            EmailKind::DeleteAccount => "Account Permanently Deleted",
        }
    }

    pub fn html(&self) -> &'static str {
        match self {
            EmailKind::PasswordChange => {
                r#"<div style="font-family: sans-serif; color: #333;">
  <h1 style="color: #2563eb;">Password Updated</h1>
  <p>The password for your <strong>Tracker</strong> account was just changed.</p>
  <p><strong>Was this you?</strong> If yes, you can safely ignore this email.</p>
  <p style="color: #dc2626;"><strong>If it wasn't, reset your password immediately.</strong></p>
</div>"#
            }
            EmailKind::Hibernate => {
                r#"<div style="font-family: sans-serif; color: #333;">
  <h1 style="color: #4b5563;">Account Hibernated</h1>
  <p>Your profile is now <strong>hidden from the public</strong>.</p>
  <p>Your data is safe, but nobody can open your portfolio URL.</p>
  <p>To reactivate, log in and run <code>tracker profile reactivate</code>.</p>
</div>"#
            }
            EmailKind::DeleteAccount => {
                r#"<div style="font-family: sans-serif; color: #333;">
  <h1 style="color: #dc2626;">Account Deleted</h1>
  <p>As requested, your account and all associated data have been <strong>permanently wiped</strong>.</p>
  <p>We are sorry to see you go.</p>
</div>"#
            }
        }
    }
}

// --- Notifier trait ---

pub trait Notifier {
    fn send_transactional_email(&self, address: &str, kind: EmailKind) -> Result<()>;
}

/// Sends and forgets. A failed email never fails the action that caused it.
pub fn notify_quietly(notifier: &dyn Notifier, address: &str, kind: EmailKind) {
    if let Err(e) = notifier.send_transactional_email(address, kind) {
        tracing::warn!(?kind, "Failed to send notification email: {e:#}");
    }
}

// --- Resend ---

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug)]
pub struct ResendNotifier {
    api_key: String,
    from: String,
    client: reqwest::blocking::Client,
}

impl ResendNotifier {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Notifier for ResendNotifier {
    fn send_transactional_email(&self, address: &str, kind: EmailKind) -> Result<()> {
        let request = ResendRequest {
            from: &self.from,
            to: vec![address],
            subject: kind.subject(),
            html: kind.html(),
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send request to Resend API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Resend API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        tracing::info!(?kind, "sent notification email");
        Ok(())
    }
}

// --- Log-only fallback ---

/// Used when no email API key is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_transactional_email(&self, address: &str, kind: EmailKind) -> Result<()> {
        tracing::info!(address, subject = kind.subject(), "email delivery not configured; skipping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(String, EmailKind)>>,
        fail: bool,
    }

    impl Notifier for Recorder {
        fn send_transactional_email(&self, address: &str, kind: EmailKind) -> Result<()> {
            if self.fail {
                return Err(anyhow!("smtp down"));
            }
            self.sent.borrow_mut().push((address.to_string(), kind));
            Ok(())
        }
    }

    #[test]
    fn test_notify_quietly_swallows_failures() {
        let failing = Recorder {
            fail: true,
            ..Default::default()
        };
        notify_quietly(&failing, "jane@example.com", EmailKind::Hibernate);
        assert!(failing.sent.borrow().is_empty());

        let ok = Recorder::default();
        notify_quietly(&ok, "jane@example.com", EmailKind::DeleteAccount);
        assert_eq!(ok.sent.borrow()[0].1, EmailKind::DeleteAccount);
    }

    #[test]
    fn test_resend_payload_shape() {
        let request = ResendRequest {
            from: "Tracker <noreply@example.com>",
            to: vec!["jane@example.com"],
            subject: EmailKind::PasswordChange.subject(),
            html: EmailKind::PasswordChange.html(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"][0], "jane@example.com");
        assert_eq!(json["subject"], "Security Alert: Password Changed");
        assert!(json["html"].as_str().unwrap().contains("Password Updated"));
    }

    #[test]
    fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send_transactional_email("a@b.c", EmailKind::Hibernate).is_ok());
    }
}
