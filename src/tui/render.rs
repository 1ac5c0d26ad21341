use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use recipe_browser::availability::format_countdown;
use recipe_browser::types::{DataOrigin, Difficulty, Recipe};

use super::app::{format_minutes, truncate, App, InputMode, View};

fn title_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn boxed(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, title_style()))
}

pub fn render(f: &mut Frame, app: &App, table: &mut TableState) {
    let banner_height = if app.availability.is_waking_up { 4 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // header
            Constraint::Length(banner_height), // wake-up banner
            Constraint::Min(0),                // body
            Constraint::Length(1),             // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    if app.availability.is_waking_up {
        render_banner(f, app, chunks[1]);
    }
    match &app.view {
        View::List => render_list(f, app, table, chunks[2]),
        View::Detail(recipe) => render_detail(f, recipe, chunks[2]),
        View::NotFound(slug) => {
            let p = Paragraph::new(format!("No recipe found for \"{slug}\".")).block(boxed(" RECIPE "));
            f.render_widget(p, chunks[2]);
        }
        View::Submitted(slug) => {
            let p = Paragraph::new(vec![
                Line::from(Span::styled("Recipe created", Style::default().fg(Color::Green))),
                Line::from(format!("Published as \"{slug}\". Press esc to return to the list.")),
            ])
            .block(boxed(" ADD RECIPE "));
            f.render_widget(p, chunks[2]);
        }
        View::SubmitError(message) => {
            let p = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Could not create the recipe",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(message.clone()),
                Line::from(""),
                Line::from(Span::styled(
                    "Press esc to return; [a] retries with the same draft.",
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title(Span::styled(" ADD RECIPE ", title_style())),
            );
            f.render_widget(p, chunks[2]);
        }
    }
    render_footer(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let (origin_text, origin_color) = match app.origin {
        DataOrigin::Live => ("● live data", Color::Green),
        DataOrigin::Fallback => ("◌ sample data", Color::Yellow),
    };

    let mut spans = vec![
        Span::styled(" Recipe Browser  ", title_style()),
        Span::styled(origin_text, Style::default().fg(origin_color)),
        Span::raw("  │  "),
        Span::styled(truncate(&app.probe_summary(), 70), Style::default().fg(Color::White)),
    ];
    if let Some(label) = app.access_label() {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(label, Style::default().fg(Color::Magenta)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(header, area);
}

fn render_banner(f: &mut Frame, app: &App, area: Rect) {
    let lines = vec![
        Line::from(vec![
            Span::styled(
                "Backend server waking up  ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format_countdown(app.remaining_secs),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(app.availability.current_message.clone(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(Span::styled(
            "Showing sample recipes until the live kitchen is ready.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let banner = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(banner, area);
}

fn render_list(f: &mut Frame, app: &App, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Recipe", "Time", "Serves", "Difficulty", "Categories"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .visible()
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let categories = r
                .categories
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Row::new(vec![
                Cell::from(format!("{}", i + 1)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&r.title, 36)),
                Cell::from(format_minutes(r.total_time())),
                Cell::from(r.servings.to_string()),
                Cell::from(r.difficulty.to_string()).style(Style::default().fg(difficulty_color(r))),
                Cell::from(truncate(&categories, 24)).style(Style::default().fg(Color::Cyan)),
            ])
        })
        .collect();

    let category = app
        .selected_category_slug()
        .and_then(|slug| app.categories.iter().find(|c| c.slug == slug))
        .map_or("All".to_string(), |c| c.name.clone());
    let search = if app.search.is_empty() {
        String::new()
    } else {
        format!(" · search \"{}\"", app.search)
    };
    let title = format!(" RECIPES · {category}{search} ");

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(16),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(24),
        ],
    )
    .header(header)
    .block(boxed(&title))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn difficulty_color(r: &Recipe) -> Color {
    match r.difficulty {
        Difficulty::Easy => Color::Green,
        Difficulty::Medium => Color::Yellow,
        Difficulty::Hard => Color::Red,
    }
}

fn render_detail(f: &mut Frame, r: &Recipe, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let mut left = vec![
        Line::from(Span::styled(r.title.clone(), title_style())),
        Line::from(r.description.clone()),
        Line::from(""),
        Line::from(format!(
            "Prep {} · Cook {} · Serves {} · {}",
            format_minutes(r.prep_time),
            format_minutes(r.cook_time),
            r.servings,
            r.difficulty
        )),
    ];
    if !r.tags.is_empty() {
        left.push(Line::from(Span::styled(
            format!("#{}", r.tags.join(" #")),
            Style::default().fg(Color::Magenta),
        )));
    }
    left.push(Line::from(""));
    left.push(Line::from(Span::styled("Ingredients", Style::default().fg(Color::Yellow))));
    for ing in &r.ingredients {
        let mut text = format!("• {} {} {}", ing.quantity, ing.unit, ing.item);
        if !ing.notes.is_empty() {
            text.push_str(&format!(" ({})", ing.notes));
        }
        left.push(Line::from(text));
    }

    let mut right = Vec::new();
    for step in &r.instructions {
        right.push(Line::from(vec![
            Span::styled(format!("{}. ", step.step_number), Style::default().fg(Color::Yellow)),
            Span::raw(step.description.clone()),
        ]));
        if let Some(tip) = &step.tips {
            right.push(Line::from(Span::styled(
                format!("   Tip: {tip}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    f.render_widget(
        Paragraph::new(left).wrap(Wrap { trim: true }).block(boxed(" RECIPE ")),
        halves[0],
    );
    f.render_widget(
        Paragraph::new(right).wrap(Wrap { trim: true }).block(boxed(" INSTRUCTIONS ")),
        halves[1],
    );
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let line = match app.input {
        InputMode::Search => Line::from(vec![key(" search: "), Span::raw(format!("{}▏", app.search))]),
        InputMode::LoginName => Line::from(vec![key(" name: "), Span::raw(format!("{}▏", app.login_name))]),
        InputMode::Compose(field) => Line::from(vec![
            key(" new recipe "),
            Span::raw(format!("{}: ", field.label())),
            Span::raw(format!("{}▏", app.draft.field(field))),
        ]),
        InputMode::LoginSecret => Line::from(vec![
            key(" secret: "),
            Span::raw(format!("{}▏", "*".repeat(app.login_secret.chars().count()))),
        ]),
        InputMode::Normal => {
            let mut spans = vec![
                key(" [q] "),
                Span::raw("quit  "),
                key("[/] "),
                Span::raw("search  "),
                key("[c] "),
                Span::raw("category  "),
                key("[enter/esc] "),
                Span::raw("open/back  "),
                key("[r] "),
                Span::raw("reload  "),
                key("[l] "),
                Span::raw("login/logout  "),
                key("[a] "),
                Span::raw("add recipe  "),
            ];
            if let Some(notice) = &app.notice {
                spans.push(Span::styled(notice.clone(), Style::default().fg(Color::DarkGray)));
            }
            Line::from(spans)
        }
    };
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}
