use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::db::RecordStore;
use crate::models::{Application, ApplicationPatch, ApplicationStatus};
use crate::view::{filter_and_sort, ListQuery};

struct AppState<'a> {
    store: &'a dyn RecordStore,
    owner: &'a str,
    query: ListQuery,
    apps: Vec<Application>,
    selected: usize,
    scroll_offset: u16,
    message: Option<String>,
}

impl<'a> AppState<'a> {
    fn load(store: &'a dyn RecordStore, owner: &'a str, query: ListQuery) -> Result<Self> {
        let mut state = Self {
            store,
            owner,
            query,
            apps: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            message: None,
        };
        state.reload()?;
        Ok(state)
    }

    fn reload(&mut self) -> Result<()> {
        let all = self.store.list_records(self.owner)?;
        self.apps = filter_and_sort(&all, &self.query).into_iter().cloned().collect();
        if self.selected >= self.apps.len() {
            self.selected = self.apps.len().saturating_sub(1);
        }
        Ok(())
    }

    fn current(&self) -> Option<&Application> {
        self.apps.get(self.selected)
    }

    fn next(&mut self) {
        if !self.apps.is_empty() && self.selected < self.apps.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Shows the new status straight away, then writes it through. If the
    /// write fails the list is reloaded from the store.
    fn set_status(&mut self, status: ApplicationStatus) {
        let Some(app) = self.apps.get_mut(self.selected) else { return };
        let id = app.id;
        app.status = status;

        match self.store.update_record(self.owner, id, &ApplicationPatch::status(status)) {
            Ok(()) => self.message = Some(format!("Marked as {status}")),
            Err(e) => self.recover(format!("Update failed: {e:#}")),
        }
    }

    fn delete_current(&mut self) {
        if self.selected >= self.apps.len() {
            return;
        }
        let removed = self.apps.remove(self.selected);
        if self.selected >= self.apps.len() {
            self.selected = self.apps.len().saturating_sub(1);
        }

        match self.store.delete_record(self.owner, removed.id) {
            Ok(()) => self.message = Some(format!("Deleted {}", removed.company)),
            Err(e) => self.recover(format!("Delete failed: {e:#}")),
        }
    }

    fn recover(&mut self, message: String) {
        tracing::warn!("{message}");
        self.message = Some(match self.reload() {
            Ok(()) => message,
            Err(e) => format!("{message} (reload failed: {e:#})"),
        });
    }
}

pub fn run_browse(store: &dyn RecordStore, owner: &str, query: ListQuery) -> Result<()> {
    let mut state = AppState::load(store, owner, query)?;
    if state.apps.is_empty() {
        println!("No applications found.");
        return Ok(());
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, state: &mut AppState) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('s') => state.set_status(ApplicationStatus::Saved),
                KeyCode::Char('a') => state.set_status(ApplicationStatus::Applied),
                KeyCode::Char('e') => state.set_status(ApplicationStatus::Assessment),
                KeyCode::Char('i') => state.set_status(ApplicationStatus::Interview),
                KeyCode::Char('o') => state.set_status(ApplicationStatus::Offer),
                KeyCode::Char('x') => state.set_status(ApplicationStatus::Rejected),
                KeyCode::Char('D') => state.delete_current(),
                KeyCode::Char('r') => {
                    if let Err(e) = state.reload() {
                        state.message = Some(format!("Reload failed: {e:#}"));
                    }
                }
                _ => {}
            }
            if state.apps.is_empty() {
                break;
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn status_style(status: ApplicationStatus) -> Style {
    match status {
        ApplicationStatus::Saved => Style::default().fg(Color::DarkGray),
        ApplicationStatus::Applied => Style::default().fg(Color::Blue),
        ApplicationStatus::Assessment => Style::default().fg(Color::Cyan),
        ApplicationStatus::Interview => Style::default().fg(Color::Yellow),
        ApplicationStatus::Offer => Style::default().fg(Color::Green),
        ApplicationStatus::Rejected => Style::default().fg(Color::Red),
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    // Left panel: application list
    let items: Vec<ListItem> = state
        .apps
        .iter()
        .map(|app| {
            let role = if app.role.chars().count() > 28 {
                format!("{}...", app.role.chars().take(25).collect::<String>())
            } else {
                app.role.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<11}", app.status.as_str()), status_style(app.status)),
                Span::raw(format!("{} | {}", app.company, role)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Applications ({}) ", state.apps.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: detail
    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    // Footer: last message or key help
    let footer = match &state.message {
        Some(msg) => Paragraph::new(format!(" {msg}")).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(
            " j/k:navigate  J/K:scroll  s/a/e/i/o/x:status  D:delete  r:reload  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[1]);
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(app) = state.current() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        format!("{} at {}", app.role, app.company),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status),
        status_style(app.status),
    )));
    lines.push(Line::from(format!("Applied: {}", app.date_applied)));
    match app.next_event_at {
        Some(at) => lines.push(Line::from(format!("Next: {}", at.format("%Y-%m-%d %H:%M")))),
        None => lines.push(Line::from("Next: TBD")),
    }
    if let Some(salary) = &app.salary {
        lines.push(Line::from(format!("Salary: {salary}")));
    }
    if let Some(location) = &app.location {
        lines.push(Line::from(format!("Location: {location}")));
    }
    if let Some(resume) = &app.resume {
        lines.push(Line::from(format!("Resume: {} ({})", resume.name, resume.url)));
    }

    let notes = app.editable_notes();
    if !notes.trim().is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("NOTES", Style::default().add_modifier(Modifier::BOLD))));
        for line in textwrap::fill(&notes, 70).lines() {
            lines.push(Line::from(format!("  {line}")));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("TIMELINE", Style::default().add_modifier(Modifier::BOLD))));
    for event in &app.timeline {
        let when = event
            .scheduled_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "TBD".to_string());
        let marker = if event.completed { "x" } else { ">" };
        let style = if event.completed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        lines.push(Line::from(Span::styled(
            format!("  {marker} {:<16} {when}", event.display_name()),
            style,
        )));
        if let Some(notes) = &event.notes {
            lines.push(Line::from(Span::styled(format!("      {notes}"), style)));
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoStore, DEMO_USER};
    use anyhow::anyhow;
    use uuid::Uuid;

    /// Reads from the demo data but refuses every write.
    struct ReadOnly(DemoStore);

    impl RecordStore for ReadOnly {
        fn list_records(&self, owner: &str) -> Result<Vec<Application>> {
            self.0.list_records(owner)
        }
        fn get_record(&self, owner: &str, id: Uuid) -> Result<Option<Application>> {
            self.0.get_record(owner, id)
        }
        fn insert_record(&self, _owner: &str, _new: crate::models::NewApplication) -> Result<Application> {
            Err(anyhow!("read only"))
        }
        fn update_record(&self, _owner: &str, _id: Uuid, _patch: &ApplicationPatch) -> Result<()> {
            Err(anyhow!("read only"))
        }
        fn delete_record(&self, _owner: &str, _id: Uuid) -> Result<()> {
            Err(anyhow!("read only"))
        }
        fn delete_all_records(&self, _owner: &str) -> Result<usize> {
            Err(anyhow!("read only"))
        }
    }

    #[test]
    fn test_status_change_writes_through() {
        let store = DemoStore::seeded();
        let mut state = AppState::load(&store, DEMO_USER, ListQuery::default()).unwrap();
        let id = state.current().unwrap().id;

        state.set_status(ApplicationStatus::Offer);
        assert_eq!(state.current().unwrap().status, ApplicationStatus::Offer);
        assert_eq!(
            store.get_record(DEMO_USER, id).unwrap().unwrap().status,
            ApplicationStatus::Offer
        );
    }

    #[test]
    fn test_failed_status_change_rolls_back() {
        let store = ReadOnly(DemoStore::seeded());
        let mut state = AppState::load(&store, DEMO_USER, ListQuery::default()).unwrap();
        let before = state.current().unwrap().status;

        state.set_status(ApplicationStatus::Saved);
        assert_eq!(state.current().unwrap().status, before);
        assert!(state.message.as_deref().unwrap().starts_with("Update failed"));
    }

    #[test]
    fn test_failed_delete_restores_row() {
        let store = ReadOnly(DemoStore::seeded());
        let mut state = AppState::load(&store, DEMO_USER, ListQuery::default()).unwrap();
        state.delete_current();
        assert_eq!(state.apps.len(), 4);
        assert!(state.message.as_deref().unwrap().starts_with("Delete failed"));
    }

    #[test]
    fn test_delete_removes_row() {
        let store = DemoStore::seeded();
        let mut state = AppState::load(&store, DEMO_USER, ListQuery::default()).unwrap();
        state.selected = 3;
        state.delete_current();
        assert_eq!(state.apps.len(), 3);
        assert_eq!(state.selected, 2);
        assert_eq!(store.list_records(DEMO_USER).unwrap().len(), 3);
    }
}
