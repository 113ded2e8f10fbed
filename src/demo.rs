use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use std::cell::RefCell;
use uuid::Uuid;

use crate::db::RecordStore;
use crate::models::{Application, ApplicationPatch, NewApplication, RoundType};
use crate::stage::{apply_transition, Transition};

pub const DEMO_USER: &str = "demo";

/// In-memory record store for trying the tool out. Nothing is persisted.
pub struct DemoStore {
    records: RefCell<Vec<Application>>,
}

impl DemoStore {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
        }
    }

    /// Four sample applications, moved into their rounds through the engine.
    pub fn seeded() -> Self {
        let now = Utc::now().naive_utc();
        let samples = [
            ("Google", "Frontend Engineer", (2023, 10, 15), "$120k", "Remote", None, Some(Transition::new(RoundType::Technical).scheduled(now))),
            ("Netflix", "UI Designer", (2023, 10, 20), "$140k", "Los Gatos, CA", None, None),
            ("Spotify", "Product Manager", (2023, 9, 1), "$135k", "New York", Some("Great culture!"), Some(Transition::new(RoundType::Offer))),
            ("Amazon", "Backend Dev", (2023, 8, 15), "$110k", "Seattle", None, Some(Transition::new(RoundType::Rejected))),
        ];

        let store = Self::new();
        {
            let mut records = store.records.borrow_mut();
            for (company, role, (y, m, d), salary, location, notes, transition) in samples {
                let new = NewApplication {
                    company: company.to_string(),
                    role: role.to_string(),
                    date_applied: NaiveDate::from_ymd_opt(y, m, d),
                    next_event_at: None,
                    salary: Some(salary.to_string()),
                    location: Some(location.to_string()),
                    notes: notes.map(str::to_string),
                    resume: None,
                };
                let seeded = Application::new(DEMO_USER, new).and_then(|app| match &transition {
                    Some(t) => apply_transition(&app, t),
                    None => Ok(app),
                });
                match seeded {
                    Ok(app) => records.push(app),
                    Err(e) => tracing::warn!(company, "Skipping demo sample: {e}"),
                }
            }
        }
        store
    }
}

impl Default for DemoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for DemoStore {
    fn list_records(&self, owner: &str) -> Result<Vec<Application>> {
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect())
    }

    fn get_record(&self, owner: &str, id: Uuid) -> Result<Option<Application>> {
        Ok(self
            .records
            .borrow()
            .iter()
            .find(|a| a.owner == owner && a.id == id)
            .cloned())
    }

    fn insert_record(&self, owner: &str, new: NewApplication) -> Result<Application> {
        let app = Application::new(owner, new)?;
        self.records.borrow_mut().insert(0, app.clone());
        Ok(app)
    }

    fn update_record(&self, owner: &str, id: Uuid, patch: &ApplicationPatch) -> Result<()> {
        patch.validate()?;
        let mut records = self.records.borrow_mut();
        let app = records
            .iter_mut()
            .find(|a| a.owner == owner && a.id == id)
            .ok_or_else(|| anyhow!("Application {} not found", id))?;
        patch.apply_to(app);
        Ok(())
    }

    fn delete_record(&self, owner: &str, id: Uuid) -> Result<()> {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|a| !(a.owner == owner && a.id == id));
        if records.len() == before {
            return Err(anyhow!("Application {} not found", id));
        }
        Ok(())
    }

    fn delete_all_records(&self, owner: &str) -> Result<usize> {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|a| a.owner != owner);
        Ok(before - records.len())
    }
}
