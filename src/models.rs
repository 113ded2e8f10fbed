use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::stage::{strip_round_tag, tag_notes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Saved,
    Applied,
    Assessment,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Saved,
        ApplicationStatus::Applied,
        ApplicationStatus::Assessment,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "Saved",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Assessment => "Assessment",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_lowercase() == wanted)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

/// Kind of round recorded on a timeline event.
///
/// `Applied` only ever marks the first event of a new application. `None` is
/// the "no particular round" sentinel: it leaves the status alone and never
/// tags the notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundType {
    Applied,
    None,
    #[serde(rename = "OA")]
    Oa,
    Aptitude,
    #[serde(rename = "Phone Screen")]
    PhoneScreen,
    Technical,
    #[serde(rename = "System Design")]
    SystemDesign,
    Managerial,
    #[serde(rename = "HR")]
    Hr,
    Offer,
    Rejected,
    Custom,
}

impl RoundType {
    pub const ALL: [RoundType; 12] = [
        RoundType::Applied,
        RoundType::None,
        RoundType::Oa,
        RoundType::Aptitude,
        RoundType::PhoneScreen,
        RoundType::Technical,
        RoundType::SystemDesign,
        RoundType::Managerial,
        RoundType::Hr,
        RoundType::Offer,
        RoundType::Rejected,
        RoundType::Custom,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoundType::Applied => "Applied",
            RoundType::None => "None",
            RoundType::Oa => "OA",
            RoundType::Aptitude => "Aptitude",
            RoundType::PhoneScreen => "Phone Screen",
            RoundType::Technical => "Technical",
            RoundType::SystemDesign => "System Design",
            RoundType::Managerial => "Managerial",
            RoundType::Hr => "HR",
            RoundType::Offer => "Offer",
            RoundType::Rejected => "Rejected",
            RoundType::Custom => "Custom",
        }
    }
}

impl fmt::Display for RoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoundType {
    type Err = ValidationError;

    /// Accepts the display label or any spacing of it: "Phone Screen",
    /// "phone-screen", "phone_screen" and "phonescreen" all match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squash = |v: &str| -> String {
            v.chars()
                .filter(|c| !matches!(c, ' ' | '-' | '_'))
                .flat_map(char::to_lowercase)
                .collect()
        };
        let wanted = squash(s);
        RoundType::ALL
            .into_iter()
            .find(|round| squash(round.label()) == wanted)
            .ok_or_else(|| ValidationError::UnknownRoundType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub round: RoundType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_label: Option<String>,
    /// `None` means the date is still to be determined.
    #[serde(default)]
    pub scheduled_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub completed: bool,
}

impl TimelineEvent {
    pub fn new(round: RoundType, custom_label: Option<String>, scheduled_at: Option<NaiveDateTime>) -> Self {
        Self {
            id: Uuid::new_v4(),
            round,
            custom_label,
            scheduled_at,
            notes: None,
            completed: false,
        }
    }

    pub fn display_name(&self) -> &str {
        match (&self.round, &self.custom_label) {
            (RoundType::Custom, Some(label)) => label,
            (round, _) => round.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub owner: String,
    pub company: String,
    pub role: String,
    pub status: ApplicationStatus,
    pub date_applied: NaiveDate,
    /// Mirrors the scheduled date of the newest timeline event.
    pub next_event_at: Option<NaiveDateTime>,
    pub salary: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    /// Round type of the newest timeline event.
    pub current_round: Option<RoundType>,
    /// Newest first.
    pub timeline: Vec<TimelineEvent>,
    pub resume: Option<ResumeRef>,
    pub created_at: NaiveDateTime,
}

/// User-supplied fields for a new application.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub company: String,
    pub role: String,
    pub date_applied: Option<NaiveDate>,
    pub next_event_at: Option<NaiveDateTime>,
    pub salary: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub resume: Option<ResumeRef>,
}

impl NewApplication {
    pub fn new(company: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company.trim().is_empty() {
            return Err(ValidationError::MissingField("company"));
        }
        if self.role.trim().is_empty() {
            return Err(ValidationError::MissingField("role"));
        }
        Ok(())
    }
}

impl Application {
    /// Builds a fresh record: one open `Applied` event, status `Applied`.
    pub fn new(owner: &str, new: NewApplication) -> Result<Self, ValidationError> {
        new.validate()?;

        let first = TimelineEvent::new(RoundType::Applied, None, new.next_event_at);
        Ok(Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            company: new.company.trim().to_string(),
            role: new.role.trim().to_string(),
            status: ApplicationStatus::Applied,
            date_applied: new.date_applied.unwrap_or_else(|| Utc::now().date_naive()),
            next_event_at: new.next_event_at,
            salary: non_blank(new.salary),
            location: non_blank(new.location),
            notes: non_blank(new.notes),
            current_round: Some(RoundType::Applied),
            timeline: vec![first],
            resume: new.resume,
            created_at: Utc::now().naive_utc(),
        })
    }

    pub fn latest_event(&self) -> Option<&TimelineEvent> {
        self.timeline.first()
    }

    /// Notes with the machine-written round tag removed.
    pub fn editable_notes(&self) -> String {
        strip_round_tag(self.notes.as_deref().unwrap_or_default()).to_string()
    }
}

/// Partial update for a stored application. `None` leaves a field untouched;
/// nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub company: Option<String>,
    pub role: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub date_applied: Option<NaiveDate>,
    pub next_event_at: Option<Option<NaiveDateTime>>,
    pub salary: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub current_round: Option<Option<RoundType>>,
    pub timeline: Option<Vec<TimelineEvent>>,
    pub resume: Option<Option<ResumeRef>>,
}

impl ApplicationPatch {
    /// Everything a stage transition touches, taken from the transitioned record.
    pub fn stage_of(app: &Application) -> Self {
        Self {
            status: Some(app.status),
            next_event_at: Some(app.next_event_at),
            notes: Some(app.notes.clone()),
            current_round: Some(app.current_round),
            timeline: Some(app.timeline.clone()),
            ..Default::default()
        }
    }

    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Replaces the user-written part of the notes, keeping the round tag
    /// that belongs to `app`'s current round.
    pub fn notes(app: &Application, text: &str) -> Self {
        Self {
            notes: Some(tag_notes(app.current_round, text)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::MissingField("company"));
        }
        if self.role.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(ValidationError::MissingField("role"));
        }
        Ok(())
    }

    pub fn apply_to(&self, app: &mut Application) {
        if let Some(company) = &self.company {
            app.company = company.trim().to_string();
        }
        if let Some(role) = &self.role {
            app.role = role.trim().to_string();
        }
        if let Some(status) = self.status {
            app.status = status;
        }
        if let Some(date) = self.date_applied {
            app.date_applied = date;
        }
        if let Some(salary) = &self.salary {
            app.salary = non_blank(salary.clone());
        }
        if let Some(location) = &self.location {
            app.location = non_blank(location.clone());
        }
        if let Some(notes) = &self.notes {
            app.notes = non_blank(notes.clone());
        }
        if let Some(round) = self.current_round {
            app.current_round = round;
        }
        if let Some(timeline) = &self.timeline {
            app.timeline = timeline.clone();
        }
        if let Some(resume) = &self.resume {
            app.resume = resume.clone();
        }
        // Keep the newest event's date in step with the record.
        if let Some(next) = self.next_event_at {
            app.next_event_at = next;
            if let Some(latest) = app.timeline.first_mut() {
                latest.scheduled_at = next;
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a scheduled date. A bare date means midnight.
pub fn parse_when(input: &str) -> Result<NaiveDateTime, ValidationError> {
    let s = input.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(when) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(when);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ValidationError::BadDate(input.to_string()))
}

pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::BadDate(input.to_string()))
}
