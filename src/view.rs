use chrono::{Duration, NaiveDate};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::models::{Application, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DateApplied,
    NextEvent,
    Salary,
}

impl FromStr for SortKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" | "date-applied" | "applied" => Ok(SortKey::DateApplied),
            "next" | "next-event" | "interview" => Ok(SortKey::NextEvent),
            "salary" | "pay" => Ok(SortKey::Salary),
            _ => Err(ValidationError::UnknownSortKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub text: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub sort: SortKey,
}

impl ListQuery {
    pub fn matches(&self, app: &Application) -> bool {
        let text_ok = match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => {
                let q = q.to_lowercase();
                app.company.to_lowercase().contains(&q) || app.role.to_lowercase().contains(&q)
            }
        };
        let status_ok = self.status.is_none_or(|s| app.status == s);
        text_ok && status_ok
    }
}

/// Filters, then sorts descending by the query's key. Ties keep input order.
pub fn filter_and_sort<'a>(apps: &'a [Application], query: &ListQuery) -> Vec<&'a Application> {
    let mut view: Vec<&Application> = apps.iter().filter(|a| query.matches(a)).collect();
    match query.sort {
        SortKey::DateApplied => view.sort_by_key(|a| Reverse(a.date_applied)),
        // Unscheduled records sink to the bottom.
        SortKey::NextEvent => view.sort_by_key(|a| Reverse(a.next_event_at)),
        SortKey::Salary => view.sort_by_key(|a| Reverse(parse_salary(a.salary.as_deref().unwrap_or_default()))),
    }
    view
}

/// Reads a salary out of free text: the first number, commas ignored, a
/// trailing `k` meaning thousands. Anything without digits is 0.
pub fn parse_salary(text: &str) -> u64 {
    let chars: Vec<char> = text.chars().collect();
    let Some(start) = chars.iter().position(|c| c.is_ascii_digit()) else {
        return 0;
    };

    // Saturating: an absurd figure caps at u64::MAX instead of reading as 0.
    let mut whole: u64 = 0;
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == ',') {
        if let Some(digit) = chars[end].to_digit(10) {
            whole = whole.saturating_mul(10).saturating_add(u64::from(digit));
        }
        end += 1;
    }
    // Skip a decimal part like "85.5k"
    let mut fraction = String::new();
    if end + 1 < chars.len() && chars[end] == '.' && chars[end + 1].is_ascii_digit() {
        end += 1;
        while end < chars.len() && chars[end].is_ascii_digit() {
            fraction.push(chars[end]);
            end += 1;
        }
    }

    let thousands = chars.get(end).is_some_and(|c| c.eq_ignore_ascii_case(&'k'));
    if !thousands {
        return whole;
    }
    let fraction_value = if fraction.is_empty() {
        0
    } else {
        let scale = 10u64.pow(fraction.len().min(3) as u32);
        let trimmed: String = fraction.chars().take(3).collect();
        trimmed.parse::<u64>().unwrap_or(0) * 1000 / scale
    };
    whole.saturating_mul(1000).saturating_add(fraction_value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub interviews: usize,
    pub offers: usize,
    /// Share of applications that reached Interview or Offer, in percent.
    pub response_rate: u32,
}

pub fn stats(apps: &[Application]) -> Stats {
    let interviews = apps.iter().filter(|a| a.status == ApplicationStatus::Interview).count();
    let offers = apps.iter().filter(|a| a.status == ApplicationStatus::Offer).count();
    let response_rate = if apps.is_empty() {
        0
    } else {
        (((interviews + offers) as f64 / apps.len() as f64) * 100.0).round() as u32
    };
    Stats {
        total: apps.len(),
        interviews,
        offers,
        response_rate,
    }
}

pub fn status_counts(apps: &[Application]) -> Vec<(ApplicationStatus, usize)> {
    let mut counts: HashMap<ApplicationStatus, usize> = HashMap::new();
    for app in apps {
        *counts.entry(app.status).or_default() += 1;
    }
    ApplicationStatus::ALL
        .into_iter()
        .map(|s| (s, counts.get(&s).copied().unwrap_or(0)))
        .collect()
}

/// Applications with a round scheduled between `today` and a week from it.
pub fn upcoming(apps: &[Application], today: NaiveDate) -> Vec<&Application> {
    let Some(start) = today.and_hms_opt(0, 0, 0) else {
        return Vec::new();
    };
    let end = start + Duration::days(7);
    let mut due: Vec<&Application> = apps
        .iter()
        .filter(|a| a.next_event_at.is_some_and(|at| at >= start && at <= end))
        .collect();
    due.sort_by_key(|a| a.next_event_at);
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, parse_when, NewApplication};

    fn app(company: &str, role: &str, status: ApplicationStatus, salary: &str) -> Application {
        let mut new = NewApplication::new(company, role);
        new.salary = Some(salary.to_string());
        let mut app = Application::new("u", new).unwrap();
        app.status = status;
        app
    }

    fn five() -> Vec<Application> {
        vec![
            app("Google", "Frontend Engineer", ApplicationStatus::Interview, "$120k"),
            app("Spotify", "Product Manager", ApplicationStatus::Offer, "$135k"),
            app("Netflix", "UI Designer", ApplicationStatus::Applied, "$140k"),
            app("Stripe", "Backend Engineer", ApplicationStatus::Offer, "150,000"),
            app("Amazon", "Backend Dev", ApplicationStatus::Rejected, ""),
        ]
    }

    #[test]
    fn test_status_filter_keeps_order() {
        let apps = five();
        let query = ListQuery {
            status: Some(ApplicationStatus::Offer),
            ..Default::default()
        };
        let hits: Vec<&str> = filter_and_sort(&apps, &query).iter().map(|a| a.company.as_str()).collect();
        assert_eq!(hits, vec!["Spotify", "Stripe"]);
    }

    #[test]
    fn test_text_query_is_case_insensitive_on_company_and_role() {
        let apps = five();
        let query = ListQuery {
            text: Some("BACKEND".to_string()),
            ..Default::default()
        };
        let hits: Vec<&str> = filter_and_sort(&apps, &query).iter().map(|a| a.company.as_str()).collect();
        assert_eq!(hits, vec!["Stripe", "Amazon"]);

        let query = ListQuery {
            text: Some("goo".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_and_sort(&apps, &query).len(), 1);
    }

    #[test]
    fn test_salary_sort_treats_junk_as_zero() {
        let apps = vec![
            app("A", "r", ApplicationStatus::Applied, "$80k"),
            app("B", "r", ApplicationStatus::Applied, "100000"),
            app("C", "r", ApplicationStatus::Applied, "abc"),
            app("D", "r", ApplicationStatus::Applied, ""),
        ];
        let query = ListQuery {
            sort: SortKey::Salary,
            ..Default::default()
        };
        let order: Vec<&str> = filter_and_sort(&apps, &query).iter().map(|a| a.company.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_parse_salary() {
        assert_eq!(parse_salary("$80k"), 80_000);
        assert_eq!(parse_salary("100000"), 100_000);
        assert_eq!(parse_salary("$120,000 - $150,000"), 120_000);
        assert_eq!(parse_salary("85.5K"), 85_500);
        assert_eq!(parse_salary("abc"), 0);
        assert_eq!(parse_salary(""), 0);
        assert_eq!(parse_salary("$99,999,999,999,999,999,999"), u64::MAX);
        assert!(parse_salary("999999999999999999999") > parse_salary("$80k"));
    }

    #[test]
    fn test_date_sorts() {
        let mut apps = five();
        apps[0].date_applied = parse_date("2023-10-15").unwrap();
        apps[1].date_applied = parse_date("2023-09-01").unwrap();
        apps[2].date_applied = parse_date("2023-10-20").unwrap();
        apps[3].date_applied = parse_date("2023-08-01").unwrap();
        apps[4].date_applied = parse_date("2023-08-15").unwrap();
        apps[1].next_event_at = Some(parse_when("2024-01-10").unwrap());
        apps[3].next_event_at = Some(parse_when("2024-02-10").unwrap());

        let by_date: Vec<&str> = filter_and_sort(&apps, &ListQuery::default())
            .iter()
            .map(|a| a.company.as_str())
            .collect();
        assert_eq!(by_date, vec!["Netflix", "Google", "Spotify", "Amazon", "Stripe"]);

        let query = ListQuery {
            sort: SortKey::NextEvent,
            ..Default::default()
        };
        let by_next: Vec<&str> = filter_and_sort(&apps, &query).iter().map(|a| a.company.as_str()).collect();
        assert_eq!(by_next, vec!["Stripe", "Spotify", "Google", "Netflix", "Amazon"]);
    }

    #[test]
    fn test_stats_and_counts() {
        let apps = five();
        let s = stats(&apps);
        assert_eq!(s.total, 5);
        assert_eq!(s.interviews, 1);
        assert_eq!(s.offers, 2);
        assert_eq!(s.response_rate, 60);
        assert_eq!(stats(&[]).response_rate, 0);

        let counts = status_counts(&apps);
        assert_eq!(counts.len(), 6);
        assert!(counts.contains(&(ApplicationStatus::Offer, 2)));
        assert!(counts.contains(&(ApplicationStatus::Saved, 0)));
    }

    #[test]
    fn test_upcoming_window() {
        let mut apps = five();
        apps[0].next_event_at = Some(parse_when("2024-06-03T09:00").unwrap());
        apps[1].next_event_at = Some(parse_when("2024-06-01").unwrap());
        apps[2].next_event_at = Some(parse_when("2024-05-31T23:00").unwrap());
        apps[3].next_event_at = Some(parse_when("2024-06-09").unwrap());

        let due: Vec<&str> = upcoming(&apps, parse_date("2024-06-01").unwrap())
            .iter()
            .map(|a| a.company.as_str())
            .collect();
        assert_eq!(due, vec!["Spotify", "Google"]);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("salary".parse::<SortKey>().unwrap(), SortKey::Salary);
        assert_eq!("next".parse::<SortKey>().unwrap(), SortKey::NextEvent);
        assert!("alphabetical".parse::<SortKey>().is_err());
    }
}
