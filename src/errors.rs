use thiserror::Error;

/// Rejected input. Raised before anything is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("A custom round needs a non-empty label")]
    MissingCustomLabel,

    #[error("Only custom rounds take a label (got one for {0})")]
    UnexpectedCustomLabel(String),

    #[error("Unknown status '{0}'. Expected one of: saved, applied, assessment, interview, offer, rejected")]
    UnknownStatus(String),

    #[error("Unknown round type '{0}'. Expected one of: oa, aptitude, phone-screen, technical, system-design, managerial, hr, offer, rejected, custom, applied, none")]
    UnknownRoundType(String),

    #[error("Unknown sort key '{0}'. Expected one of: date, next, salary")]
    UnknownSortKey(String),

    #[error("Could not read '{0}' as a date (use YYYY-MM-DD or YYYY-MM-DDTHH:MM)")]
    BadDate(String),

    #[error("Unknown portfolio section '{0}'. Expected one of: experience, education, cert, link")]
    UnknownPortfolioKind(String),

    #[error("There is no {kind} entry #{position}")]
    NoSuchEntry { kind: &'static str, position: usize },
}

/// Identity failures. The caller is expected to send the user back to sign in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not signed in. Run 'tracker login' first.")]
    NotSignedIn,

    #[error("Please verify {0} before logging in")]
    EmailUnverified(String),
}
