//! Terminal front end: recipe list, detail view and the wake-up banner.

pub mod app;
mod compose;
mod render;

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{backend::CrosstermBackend, widgets::TableState, Terminal};
use tokio::sync::broadcast::{self, error::TryRecvError};

use recipe_browser::availability::MonitorUpdate;

use app::{App, InputMode, View};

/// Redraw period; matches the countdown resolution.
const FRAME: Duration = Duration::from_millis(100);

pub async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    updates: &mut broadcast::Receiver<MonitorUpdate>,
) -> io::Result<()> {
    let mut table = TableState::default();
    table.select(Some(0));

    loop {
        app.sync_availability();
        terminal.draw(|f| render::render(f, app, &mut table))?;

        if event::poll(FRAME)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !handle_key(app, &mut table, key).await {
                    return Ok(());
                }
            }
        }

        let mut reload = false;
        loop {
            match updates.try_recv() {
                Ok(update) => reload |= app.on_update(&update),
                // Missed updates only matter for the reload decision.
                Err(TryRecvError::Lagged(_)) => reload = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if reload {
            app.reload().await;
            table.select(Some(0));
        }
    }
}

/// Returns false to quit.
async fn handle_key(app: &mut App, table: &mut TableState, key: KeyEvent) -> bool {
    match app.input {
        InputMode::Search => match key.code {
            KeyCode::Enter => {
                app.input = InputMode::Normal;
                app.reload().await;
                table.select(Some(0));
            }
            KeyCode::Esc => {
                app.input = InputMode::Normal;
                app.search.clear();
                app.reload().await;
            }
            KeyCode::Backspace => {
                app.search.pop();
            }
            KeyCode::Char(c) => app.search.push(c),
            _ => {}
        },
        InputMode::LoginName => match key.code {
            KeyCode::Enter => app.input = InputMode::LoginSecret,
            KeyCode::Esc => app.input = InputMode::Normal,
            KeyCode::Backspace => {
                app.login_name.pop();
            }
            KeyCode::Char(c) => app.login_name.push(c),
            _ => {}
        },
        InputMode::LoginSecret => match key.code {
            KeyCode::Enter => app.submit_login(),
            KeyCode::Esc => {
                app.login_secret.clear();
                app.input = InputMode::Normal;
            }
            KeyCode::Backspace => {
                app.login_secret.pop();
            }
            KeyCode::Char(c) => app.login_secret.push(c),
            _ => {}
        },
        InputMode::Compose(field) => match key.code {
            KeyCode::Enter => match field.next() {
                Some(next) => app.input = InputMode::Compose(next),
                None => app.submit_draft().await,
            },
            // Leaves the draft as typed; [a] picks it up again.
            KeyCode::Esc => app.input = InputMode::Normal,
            KeyCode::Backspace => {
                app.draft.field_mut(field).pop();
            }
            KeyCode::Char(c) => app.draft.field_mut(field).push(c),
            _ => {}
        },
        InputMode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return false,
            KeyCode::Char('r') | KeyCode::Char('R') => app.reload().await,
            KeyCode::Char('/') => app.input = InputMode::Search,
            KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_login(),
            KeyCode::Char('a') | KeyCode::Char('A')
                if matches!(app.view, View::List | View::SubmitError(_)) =>
            {
                app.start_compose()
            }
            KeyCode::Char('c') | KeyCode::Char('C') if app.view == View::List => {
                app.cycle_category();
                table.select(Some(0));
            }
            KeyCode::Enter if app.view == View::List => {
                if let Some(i) = table.selected() {
                    app.open(i).await;
                }
            }
            KeyCode::Esc | KeyCode::Backspace => app.back(),
            KeyCode::Down | KeyCode::Char('j') => {
                let max = app.visible().len().saturating_sub(1);
                let next = table.selected().map_or(0, |i| (i + 1).min(max));
                table.select(Some(next));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let prev = table.selected().map_or(0, |i| i.saturating_sub(1));
                table.select(Some(prev));
            }
            _ => {}
        },
    }
    true
}
