//! Stage transitions.
//!
//! Given the round an application just moved into, work out the new status,
//! the new timeline head, the next event date and the notes annotation. Pure:
//! the caller persists the result and rolls back its own state if that fails.

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::errors::ValidationError;
use crate::models::{Application, ApplicationStatus, RoundType, TimelineEvent};

static LEADING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s*").expect("static regex"));

/// What the user reported happening to an application.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub round: RoundType,
    pub scheduled_at: Option<NaiveDateTime>,
    /// Required for `Custom`, rejected for everything else.
    pub custom_label: Option<String>,
    /// Overrides the derived status when present.
    pub manual_status: Option<ApplicationStatus>,
    /// Kept on the new timeline event only.
    pub event_notes: Option<String>,
}

impl Transition {
    pub fn new(round: RoundType) -> Self {
        Self {
            round,
            scheduled_at: None,
            custom_label: None,
            manual_status: None,
            event_notes: None,
        }
    }

    pub fn scheduled(mut self, at: NaiveDateTime) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.custom_label = Some(label.into());
        self
    }

    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.manual_status = Some(status);
        self
    }

    pub fn noted(mut self, notes: impl Into<String>) -> Self {
        self.event_notes = Some(notes.into());
        self
    }

    /// Returns the cleaned custom label, or the reason the pairing is invalid.
    fn checked_label(&self) -> Result<Option<String>, ValidationError> {
        let label = self
            .custom_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        match (self.round, label) {
            (RoundType::Custom, None) => Err(ValidationError::MissingCustomLabel),
            (RoundType::Custom, Some(label)) => Ok(Some(label)),
            (_, None) => Ok(None),
            (round, Some(_)) => Err(ValidationError::UnexpectedCustomLabel(round.to_string())),
        }
    }
}

/// Status implied by moving into `round`. `Custom` and `None` keep `previous`.
pub fn derive_status(round: RoundType, previous: ApplicationStatus) -> ApplicationStatus {
    match round {
        RoundType::Oa | RoundType::Aptitude => ApplicationStatus::Assessment,
        RoundType::PhoneScreen
        | RoundType::Technical
        | RoundType::SystemDesign
        | RoundType::Managerial
        | RoundType::Hr => ApplicationStatus::Interview,
        RoundType::Offer => ApplicationStatus::Offer,
        RoundType::Rejected => ApplicationStatus::Rejected,
        RoundType::Applied => ApplicationStatus::Applied,
        RoundType::Custom | RoundType::None => previous,
    }
}

/// Drops one leading `[...]` tag and the whitespace after it.
pub fn strip_round_tag(notes: &str) -> &str {
    match LEADING_TAG.find(notes) {
        Some(m) => &notes[m.end()..],
        None => notes,
    }
}

/// Notes re-tagged for `round`. `Applied`, `Custom` and `None` leave the
/// notes untagged, matching what a freshly created record stores.
pub fn tag_notes(round: Option<RoundType>, notes: &str) -> Option<String> {
    let body = strip_round_tag(notes);
    match round {
        Some(RoundType::Applied | RoundType::Custom | RoundType::None) | None => {
            (!body.trim().is_empty()).then(|| body.to_string())
        }
        Some(round) => Some(format!("[{}] {}", round.label(), body)),
    }
}

/// Moves `app` into the round described by `transition`.
///
/// Every existing event is closed, the new event becomes the head of the
/// timeline, and the record's status, next event date, current round and
/// notes follow it. Validation happens before anything is built, so on error
/// the caller still holds the untouched original.
pub fn apply_transition(app: &Application, transition: &Transition) -> Result<Application, ValidationError> {
    let custom_label = transition.checked_label()?;

    let mut next = app.clone();
    let mut event = TimelineEvent::new(transition.round, custom_label, transition.scheduled_at);
    event.notes = transition
        .event_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    for old in next.timeline.iter_mut() {
        old.completed = true;
    }
    next.timeline.insert(0, event);

    next.status = transition
        .manual_status
        .unwrap_or_else(|| derive_status(transition.round, app.status));
    next.next_event_at = transition.scheduled_at;
    next.current_round = Some(transition.round);
    next.notes = tag_notes(Some(transition.round), app.notes.as_deref().unwrap_or_default());

    tracing::debug!(
        application = %app.id,
        round = %transition.round,
        from = %app.status,
        to = %next.status,
        "applied stage transition"
    );

    Ok(next)
}
