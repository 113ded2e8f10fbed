use anyhow::Result;
use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::{self, Write};
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::errors::ValidationError;

static USERNAME_JUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_-]").expect("static regex"));

/// Shortest username worth checking for availability.
pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Active,
    Hibernated,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Active => "active",
            Visibility::Hibernated => "hibernated",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Visibility::Active),
            "hibernated" => Ok(Visibility::Hibernated),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Public portfolio for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub headline: Option<String>,
    pub header_text: Option<String>,
    pub about: Option<String>,
    pub location: Option<String>,
    pub visibility: Visibility,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub certifications: Vec<Certification>,
    pub social_links: Vec<SocialLink>,
}

impl Profile {
    pub fn empty(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            username: None,
            full_name: String::new(),
            avatar_url: None,
            cover_url: None,
            headline: None,
            header_text: None,
            about: None,
            location: None,
            visibility: Visibility::Active,
            skills: Vec::new(),
            interests: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            certifications: Vec::new(),
            social_links: Vec::new(),
        }
    }

    /// The public header shows `header_text`, so the two are kept equal.
    pub fn set_headline(&mut self, headline: &str) {
        let headline = Some(headline.trim().to_string()).filter(|h| !h.is_empty());
        self.header_text = headline.clone();
        self.headline = headline;
    }

    pub fn display_headline(&self) -> Option<&str> {
        self.header_text.as_deref().or(self.headline.as_deref())
    }

    /// Newest entries go on top, the way the portfolio lists them.
    pub fn add_entry(&mut self, entry: PortfolioEntry) -> Result<(), ValidationError> {
        entry.validate()?;
        match entry {
            PortfolioEntry::Experience(mut e) => {
                ensure_id(&mut e.id);
                if e.current {
                    e.end_date = None;
                }
                self.experience.insert(0, e);
            }
            PortfolioEntry::Education(mut e) => {
                ensure_id(&mut e.id);
                if e.current {
                    e.end_date = None;
                }
                self.education.insert(0, e);
            }
            PortfolioEntry::Certification(mut c) => {
                ensure_id(&mut c.id);
                self.certifications.insert(0, c);
            }
            PortfolioEntry::Link(mut l) => {
                ensure_id(&mut l.id);
                self.social_links.insert(0, l);
            }
        }
        Ok(())
    }

    /// Removes the entry shown as `#position` (1-based) in `kind`'s list.
    pub fn remove_entry(&mut self, kind: PortfolioKind, position: usize) -> Result<(), ValidationError> {
        let len = match kind {
            PortfolioKind::Experience => self.experience.len(),
            PortfolioKind::Education => self.education.len(),
            PortfolioKind::Certification => self.certifications.len(),
            PortfolioKind::Link => self.social_links.len(),
        };
        if position == 0 || position > len {
            return Err(ValidationError::NoSuchEntry {
                kind: kind.as_str(),
                position,
            });
        }
        let idx = position - 1;
        match kind {
            PortfolioKind::Experience => {
                self.experience.remove(idx);
            }
            PortfolioKind::Education => {
                self.education.remove(idx);
            }
            PortfolioKind::Certification => {
                self.certifications.remove(idx);
            }
            PortfolioKind::Link => {
                self.social_links.remove(idx);
            }
        }
        Ok(())
    }
}

// --- Portfolio entries ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    pub current: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub id: String,
    pub school: String,
    pub degree: String,
    pub field: String,
    #[serde(deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    pub current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub id: String,
    pub name: String,
    pub org: String,
    #[serde(deserialize_with = "lenient_date")]
    pub issue_date: Option<NaiveDate>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLink {
    pub id: String,
    pub url: String,
    pub platform: String,
}

impl SocialLink {
    pub fn new(url: &str) -> Self {
        let url = url.trim().to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            platform: detect_platform(&url),
            url,
        }
    }

    /// The link with a scheme, for opening in a browser.
    pub fn href(&self) -> String {
        if self.url.starts_with("http") {
            self.url.clone()
        } else {
            format!("https://{}", self.url)
        }
    }
}

/// Short site name from a URL: `https://www.github.com/x` is `github`.
pub fn detect_platform(url: &str) -> String {
    let full = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    reqwest::Url::parse(&full)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .and_then(|host| {
            host.trim_start_matches("www.")
                .split('.')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Website".to_string())
}

fn ensure_id(id: &mut String) {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

/// Old rows store unset dates as `""`; those read as `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer).unwrap_or_default();
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioKind {
    Experience,
    Education,
    Certification,
    Link,
}

impl PortfolioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioKind::Experience => "experience",
            PortfolioKind::Education => "education",
            PortfolioKind::Certification => "cert",
            PortfolioKind::Link => "link",
        }
    }
}

impl FromStr for PortfolioKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "experience" | "exp" | "job" => Ok(PortfolioKind::Experience),
            "education" | "edu" | "school" => Ok(PortfolioKind::Education),
            "cert" | "certs" | "certification" | "certifications" => Ok(PortfolioKind::Certification),
            "link" | "links" | "social" => Ok(PortfolioKind::Link),
            _ => Err(ValidationError::UnknownPortfolioKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortfolioEntry {
    Experience(Experience),
    Education(Education),
    Certification(Certification),
    Link(SocialLink),
}

impl PortfolioEntry {
    fn validate(&self) -> Result<(), ValidationError> {
        let (field, value) = match self {
            PortfolioEntry::Experience(e) => ("title", &e.title),
            PortfolioEntry::Education(e) => ("school", &e.school),
            PortfolioEntry::Certification(c) => ("name", &c.name),
            PortfolioEntry::Link(l) => ("url", &l.url),
        };
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
        Ok(())
    }
}

/// Plain-text rendering of the public page. Sections without entries are left out.
pub fn render_profile(profile: &Profile) -> String {
    let mut out = String::new();
    let name = if profile.full_name.is_empty() { "(no name)" } else { &profile.full_name };
    let _ = writeln!(out, "{name}");
    if let Some(username) = &profile.username {
        let _ = writeln!(out, "@{username}");
    }
    if let Some(headline) = profile.display_headline() {
        let _ = writeln!(out, "{headline}");
    }
    if let Some(location) = &profile.location {
        let _ = writeln!(out, "Location: {location}");
    }
    if !profile.social_links.is_empty() {
        let _ = writeln!(out, "\nLinks:");
        for (i, link) in profile.social_links.iter().enumerate() {
            let _ = writeln!(out, "  {}. {:<10} {}", i + 1, link.platform, link.href());
        }
    }
    if let Some(about) = &profile.about {
        let _ = writeln!(out, "\n{}", textwrap::fill(about, 80));
    }
    if !profile.experience.is_empty() {
        let _ = writeln!(out, "\nExperience:");
        for (i, e) in profile.experience.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} at {} ({})",
                i + 1,
                e.title,
                e.company,
                span(e.start_date, e.end_date, e.current)
            );
            if !e.description.trim().is_empty() {
                let options = textwrap::Options::new(80).initial_indent("     ").subsequent_indent("     ");
                let _ = writeln!(out, "{}", textwrap::fill(&e.description, options));
            }
        }
    }
    if !profile.education.is_empty() {
        let _ = writeln!(out, "\nEducation:");
        for (i, e) in profile.education.iter().enumerate() {
            let study = [e.degree.as_str(), e.field.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "  {}. {}{} ({})",
                i + 1,
                e.school,
                if study.is_empty() { String::new() } else { format!(" - {study}") },
                span(e.start_date, e.end_date, e.current)
            );
        }
    }
    if !profile.certifications.is_empty() {
        let _ = writeln!(out, "\nCertifications:");
        for (i, c) in profile.certifications.iter().enumerate() {
            let mut line = format!("  {}. {}", i + 1, c.name);
            if !c.org.is_empty() {
                let _ = write!(line, " - {}", c.org);
            }
            if let Some(issued) = c.issue_date {
                let _ = write!(line, " ({})", issued.format("%b %Y"));
            }
            if !c.url.is_empty() {
                let _ = write!(line, " {}", c.url);
            }
            let _ = writeln!(out, "{line}");
        }
    }
    if !profile.skills.is_empty() {
        let _ = writeln!(out, "\nSkills: {}", profile.skills.join(", "));
    }
    if !profile.interests.is_empty() {
        let _ = writeln!(out, "Interests: {}", profile.interests.join(", "));
    }
    out
}

fn span(start: Option<NaiveDate>, end: Option<NaiveDate>, current: bool) -> String {
    let month = |d: Option<NaiveDate>| d.map(|d| d.format("%b %Y").to_string()).unwrap_or_else(|| "?".to_string());
    let end = if current { "Present".to_string() } else { month(end) };
    format!("{} - {}", month(start), end)
}

pub trait ProfileStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    /// Public lookup. Unknown and hibernated usernames both come back `None`.
    fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>>;
    /// Who holds `username`, regardless of visibility.
    fn username_owner(&self, username: &str) -> Result<Option<String>>;
    fn upsert_profile(&self, profile: &Profile) -> Result<()>;
    fn set_visibility(&self, user_id: &str, visibility: Visibility) -> Result<()>;
    fn delete_profile(&self, user_id: &str) -> Result<()>;
}

/// Reads a list column that may hold a JSON array, a JSON string wrapping an
/// array, or garbage. Garbage is an empty list.
pub fn parse_list<T: DeserializeOwned>(raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let items = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    // One malformed entry drops only itself.
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

pub fn normalize_username(raw: &str) -> String {
    USERNAME_JUNK.replace_all(&raw.trim().to_lowercase(), "").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameCheck {
    TooShort,
    Available,
    Taken { suggestions: Vec<String> },
}

/// Checks `username` (already normalized) for `user_id`. Holding the name
/// yourself counts as available.
pub fn check_username(store: &dyn ProfileStore, user_id: &str, username: &str) -> Result<UsernameCheck> {
    if username.len() < MIN_USERNAME_LEN {
        return Ok(UsernameCheck::TooShort);
    }
    match store.username_owner(username)? {
        Some(owner) if owner != user_id => {}
        _ => return Ok(UsernameCheck::Available),
    }

    let suffix = rand::thread_rng().gen_range(0..99);
    let candidates = [
        format!("{username}pro"),
        format!("{username}dev"),
        format!("iam{username}"),
        format!("{username}{suffix}"),
    ];
    let mut suggestions = Vec::new();
    for candidate in candidates {
        if store.username_owner(&candidate)?.is_none() {
            suggestions.push(candidate);
        }
    }
    Ok(UsernameCheck::Taken { suggestions })
}

pub fn public_url(base: &str, username: &str) -> String {
    format!("{}/p/{}", base.trim_end_matches('/'), username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_parse_list_is_lenient() {
        let direct: Vec<String> = parse_list(Some(r#"["Rust","SQL"]"#));
        assert_eq!(direct, vec!["Rust", "SQL"]);

        let wrapped: Vec<String> = parse_list(Some(r#""[\"Go\"]""#));
        assert_eq!(wrapped, vec!["Go"]);

        let junk: Vec<String> = parse_list(Some("not json"));
        assert!(junk.is_empty());

        let object: Vec<String> = parse_list(Some(r#"{"a":1}"#));
        assert!(object.is_empty());

        let missing: Vec<Value> = parse_list(None);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Jane.Doe! "), "janedoe");
        assert_eq!(normalize_username("dev_ops-42"), "dev_ops-42");
    }

    #[test]
    fn test_check_username() {
        let db = Database::open_in_memory().unwrap();
        let mut taken = Profile::empty("bob");
        taken.username = Some("jane".to_string());
        db.upsert_profile(&taken).unwrap();
        let mut pro = Profile::empty("carol");
        pro.username = Some("janepro".to_string());
        db.upsert_profile(&pro).unwrap();

        assert_eq!(check_username(&db, "alice", "ja").unwrap(), UsernameCheck::TooShort);
        assert_eq!(check_username(&db, "alice", "alice").unwrap(), UsernameCheck::Available);
        assert_eq!(check_username(&db, "bob", "jane").unwrap(), UsernameCheck::Available);

        match check_username(&db, "alice", "jane").unwrap() {
            UsernameCheck::Taken { suggestions } => {
                assert!(suggestions.contains(&"janedev".to_string()));
                assert!(suggestions.contains(&"iamjane".to_string()));
                assert!(!suggestions.contains(&"janepro".to_string()));
            }
            other => panic!("expected taken, got {other:?}"),
        }
    }

    fn date(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    fn portfolio() -> Profile {
        let mut profile = Profile::empty("alice");
        profile.full_name = "Alice Smith".to_string();
        profile.username = Some("alice".to_string());
        profile.set_headline("Backend engineer");
        profile
            .add_entry(PortfolioEntry::Experience(Experience {
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                start_date: date("2021-03-01"),
                end_date: date("2023-01-01"),
                current: true,
                description: "Built the billing pipeline.".to_string(),
                ..Default::default()
            }))
            .unwrap();
        profile
            .add_entry(PortfolioEntry::Education(Education {
                school: "State University".to_string(),
                degree: "BSc".to_string(),
                field: "Computer Science".to_string(),
                start_date: date("2016-09-01"),
                end_date: date("2020-06-01"),
                ..Default::default()
            }))
            .unwrap();
        profile
            .add_entry(PortfolioEntry::Certification(Certification {
                name: "AWS Solutions Architect".to_string(),
                org: "Amazon".to_string(),
                issue_date: date("2023-03-10"),
                ..Default::default()
            }))
            .unwrap();
        profile.add_entry(PortfolioEntry::Link(SocialLink::new("www.github.com/alice"))).unwrap();
        profile
    }

    #[test]
    fn test_add_entries_newest_first() {
        let mut profile = portfolio();
        let first = profile.experience[0].clone();
        assert!(!first.id.is_empty());
        assert_eq!(first.end_date, None, "current roles have no end date");

        profile
            .add_entry(PortfolioEntry::Experience(Experience {
                title: "Staff Engineer".to_string(),
                company: "Globex".to_string(),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(profile.experience[0].company, "Globex");
        assert_eq!(profile.experience[1], first);

        let err = profile.add_entry(PortfolioEntry::Link(SocialLink::new("  "))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("url"));
    }

    #[test]
    fn test_remove_entry_by_position() {
        let mut profile = portfolio();
        profile.add_entry(PortfolioEntry::Link(SocialLink::new("https://linkedin.com/in/alice"))).unwrap();
        assert_eq!(profile.social_links.len(), 2);

        profile.remove_entry(PortfolioKind::Link, 2).unwrap();
        assert_eq!(profile.social_links.len(), 1);
        assert_eq!(profile.social_links[0].platform, "linkedin");

        let err = profile.remove_entry(PortfolioKind::Education, 3).unwrap_err();
        assert_eq!(err, ValidationError::NoSuchEntry { kind: "education", position: 3 });
        assert!(profile.remove_entry(PortfolioKind::Certification, 0).is_err());
        assert_eq!("certs".parse::<PortfolioKind>().unwrap(), PortfolioKind::Certification);
    }

    #[test]
    fn test_render_public_profile() {
        let text = render_profile(&portfolio());
        assert!(text.starts_with("Alice Smith\n@alice\nBackend engineer\n"));
        assert!(text.contains("1. github     https://www.github.com/alice"));
        assert!(text.contains("1. Engineer at Acme (Mar 2021 - Present)"));
        assert!(text.contains("     Built the billing pipeline."));
        assert!(text.contains("1. State University - BSc, Computer Science (Sep 2016 - Jun 2020)"));
        assert!(text.contains("1. AWS Solutions Architect - Amazon (Mar 2023)"));

        let bare = render_profile(&Profile::empty("bob"));
        assert_eq!(bare, "(no name)\n");
    }

    #[test]
    fn test_headline_mirrors_header_text() {
        let mut profile = Profile::empty("alice");
        profile.set_headline("  Data person ");
        assert_eq!(profile.header_text.as_deref(), Some("Data person"));
        assert_eq!(profile.display_headline(), Some("Data person"));
        profile.set_headline("");
        assert_eq!(profile.headline, None);
    }

    #[test]
    fn test_entries_parse_leniently() {
        let raw = r#"[
            {"id":"1","title":"Dev","company":"Acme","start_date":"","end_date":"2020-01-01","current":false},
            "not an entry",
            {"title":"Intern"}
        ]"#;
        let entries: Vec<Experience> = parse_list(Some(raw));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_date, None);
        assert_eq!(entries[0].end_date, date("2020-01-01"));
        assert_eq!(entries[1].title, "Intern");
        assert_eq!(entries[1].description, "");
    }

    #[test]
    fn test_portfolio_survives_store_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let profile = portfolio();
        db.upsert_profile(&profile).unwrap();
        assert_eq!(db.get_profile("alice").unwrap().unwrap(), profile);
    }

    #[test]
    fn test_detect_platform() {
        assert_eq!(detect_platform("https://www.github.com/alice"), "github");
        assert_eq!(detect_platform("linkedin.com/in/alice"), "linkedin");
        assert_eq!(detect_platform("not a url at all"), "Website");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("https://jobs.example.com/", "jane"), "https://jobs.example.com/p/jane");
    }
}
