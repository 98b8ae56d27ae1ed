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

use crate::db::Database;
use crate::models::{ApplicationPatch, ApplicationStatus, JobApplication, Owner};
use crate::tracker::{self, StatusBoard};

struct BoardState {
    board: StatusBoard,
    column: usize,
    rows: [usize; 4],
    notice: Option<String>,
}

impl BoardState {
    fn new() -> Self {
        Self {
            board: StatusBoard::default(),
            column: 0,
            rows: [0; 4],
            notice: None,
        }
    }

    fn reload(&mut self, db: &Database, owner: &Owner) {
        let loaded = tracker::load_board(db, owner);
        match loaded.notice {
            // keep the last board we managed to draw
            Some(err) => self.notice = Some(format!("Could not refresh: {}", err)),
            None => {
                self.board = loaded.value;
                self.clamp_rows();
            }
        }
    }

    fn clamp_rows(&mut self) {
        for (i, status) in ApplicationStatus::ALL.iter().enumerate() {
            let len = self.board.bucket(*status).len();
            self.rows[i] = self.rows[i].min(len.saturating_sub(1));
        }
    }

    fn status(&self) -> ApplicationStatus {
        ApplicationStatus::ALL[self.column]
    }

    fn current(&self) -> Option<&JobApplication> {
        self.board.bucket(self.status()).get(self.rows[self.column])
    }

    fn next(&mut self) {
        let len = self.board.bucket(self.status()).len();
        if len > 0 && self.rows[self.column] < len - 1 {
            self.rows[self.column] += 1;
        }
    }

    fn prev(&mut self) {
        self.rows[self.column] = self.rows[self.column].saturating_sub(1);
    }

    fn left(&mut self) {
        self.column = self.column.saturating_sub(1);
    }

    fn right(&mut self) {
        if self.column < ApplicationStatus::ALL.len() - 1 {
            self.column += 1;
        }
    }

    fn move_current(&mut self, db: &Database, owner: &Owner, status: ApplicationStatus) {
        let Some(app) = self.current() else { return };
        if app.status == status {
            return;
        }
        let id = app.id.clone();
        match tracker::update_application(db, owner, &id, ApplicationPatch::status(status)) {
            Ok(updated) => {
                self.notice = Some(format!("Moved '{}' to {}", updated.title, status.label()));
                self.reload(db, owner);
            }
            Err(e) => self.notice = Some(format!("Failed to save changes: {}", e)),
        }
    }
}

pub fn run_board(db: &Database, owner: &Owner) -> Result<()> {
    let mut state = BoardState::new();
    state.reload(db, owner);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db, owner);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BoardState,
    db: &Database,
    owner: &Owner,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Left | KeyCode::Char('h') => state.left(),
                KeyCode::Right | KeyCode::Char('l') => state.right(),
                KeyCode::Char('R') => {
                    state.notice = None;
                    state.reload(db, owner);
                }
                KeyCode::Char('a') => state.move_current(db, owner, ApplicationStatus::Applied),
                KeyCode::Char('i') => {
                    state.move_current(db, owner, ApplicationStatus::Interviewing)
                }
                KeyCode::Char('o') => state.move_current(db, owner, ApplicationStatus::Offer),
                KeyCode::Char('x') => state.move_current(db, owner, ApplicationStatus::Rejected),
                _ => {}
            }
        }
    }
    Ok(())
}

fn status_color(status: ApplicationStatus) -> Color {
    match status {
        ApplicationStatus::Applied => Color::Cyan,
        ApplicationStatus::Interviewing => Color::Yellow,
        ApplicationStatus::Offer => Color::Green,
        ApplicationStatus::Rejected => Color::Red,
    }
}

fn draw(frame: &mut Frame, state: &BoardState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(10),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(rows[0]);

    for (i, (status, apps)) in state.board.columns().into_iter().enumerate() {
        let items: Vec<ListItem> = apps
            .iter()
            .map(|app| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        app.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        format!("{} · {}", app.company, app.date_applied),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect();

        let mut border = Style::default().fg(status_color(status));
        if i == state.column {
            border = border.add_modifier(Modifier::BOLD);
        }
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!(" {} ({}) ", status.label(), apps.len())),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        let mut list_state = ListState::default();
        if i == state.column && !apps.is_empty() {
            list_state.select(Some(state.rows[i]));
        }
        frame.render_stateful_widget(list, columns[i], &mut list_state);
    }

    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, rows[1]);

    let footer = match &state.notice {
        Some(notice) => Paragraph::new(format!(" {}", notice)).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(
            " h/l:column  j/k:row  a:applied i:interviewing o:offer x:rejected  R:reload  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[2]);
}

fn build_detail(state: &BoardState) -> Text<'_> {
    let Some(app) = state.current() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        format!("{} at {}", app.title, app.company),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status.label()),
        Style::default().fg(status_color(app.status)),
    )));
    lines.push(Line::from(format!("Applied: {}", app.date_applied)));
    if let Some(score) = app.chance_score {
        lines.push(Line::from(format!("Chance: {}%", score)));
    }
    if let Some(resume) = &app.resume_version {
        lines.push(Line::from(format!("Resume: {}", resume)));
    }
    if let Some(url) = &app.jd_url {
        lines.push(Line::from(format!("JD: {}", url)));
    }
    if let Some(notes) = &app.notes {
        for line in textwrap::fill(notes, 90).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApplication;
    use crate::session::Session;

    #[test]
    fn test_move_current_updates_store_and_board() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let owner = Owner::new("board-user").unwrap();
        let session = Session::signed_in(owner.clone());
        tracker::add_application(&db, &session, NewApplication::new("Dev", "Acme")).unwrap();

        let mut state = BoardState::new();
        state.reload(&db, &owner);
        assert_eq!(state.board.applied.len(), 1);

        state.move_current(&db, &owner, ApplicationStatus::Offer);
        assert!(state.board.applied.is_empty());
        assert_eq!(state.board.offer.len(), 1);
        assert!(state.current().is_none());

        state.right();
        state.right();
        assert_eq!(state.current().map(|a| a.title.as_str()), Some("Dev"));
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut state = BoardState::new();
        state.left();
        state.prev();
        state.next();
        assert_eq!(state.column, 0);
        assert_eq!(state.rows[0], 0);
        for _ in 0..10 {
            state.right();
        }
        assert_eq!(state.column, 3);
    }
}
