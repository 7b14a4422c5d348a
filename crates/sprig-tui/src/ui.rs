use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use sprig_core::{is_overdue, Category, Entry, Priority, View};

use crate::app::App;

pub fn draw(f: &mut Frame, app: &App) {
    if app.profile.is_none() {
        draw_signed_out(f, app);
    } else {
        draw_main(f, app);
    }

    if let Some(notice) = &app.notice {
        draw_notice(f, notice);
    }
}

fn draw_signed_out(f: &mut Frame, app: &App) {
    let mut lines = vec![
        Line::from(Span::styled(
            "sprig",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Your intelligent personal assistant",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];

    match &app.device {
        Some(device) => {
            lines.push(Line::from("To sign in, open the link below in a browser:"));
            lines.push(Line::from(Span::styled(
                device.verification_uri.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("and enter the code:"));
            lines.push(Line::from(Span::styled(
                device.user_code.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Waiting for authorization…",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )));
        }
        None => {
            lines.push(Line::from("Press Enter to sign in"));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Ctrl+C] Quit",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Green)));

    let area = centered_rect(60, 14, f.size());
    f.render_widget(paragraph, area);
}

fn draw_main(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(30)])
        .split(f.size());

    draw_sidebar(f, app, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(columns[1]);

    draw_header(f, app, rows[0]);
    match app.active_view {
        View::Chat => draw_composer(f, app, rows[1]),
        View::Search => draw_search(f, app, rows[1]),
        _ => draw_entry_list(f, app, rows[1]),
    }
    draw_status_bar(f, app, rows[2]);
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let counts = app.view_counts();
    let items = [
        (View::Chat, None),
        (View::Search, None),
        (View::All, Some(counts.all)),
        (View::Tasks, Some(counts.tasks)),
        (View::Reminders, Some(counts.reminders)),
        (View::Notes, Some(counts.notes)),
    ];

    let mut lines: Vec<Line> = items
        .iter()
        .map(|(view, count)| {
            let marker = if *view == app.active_view { "> " } else { "  " };
            let style = if *view == app.active_view {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let label = match count {
                Some(n) => format!("{marker}{:<10} {n:>3}", view.title()),
                None => format!("{marker}{}", view.title()),
            };
            Line::from(Span::styled(label, style))
        })
        .collect();

    lines.push(Line::from(""));
    if let Some(profile) = &app.profile {
        lines.push(Line::from(vec![
            Span::styled(
                format!("({}) ", profile.initial()),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                profile.display_name.clone(),
                Style::default().fg(Color::White),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            profile.email.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let sidebar = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("sprig")
            .border_style(Style::default().fg(Color::Green)),
    );
    f.render_widget(sidebar, area);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let count = app.visible_entries(App::today()).len();
    let subtitle = if app.active_view.is_list() {
        format!("{} items", count)
    } else {
        String::new()
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            app.active_view.title(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", subtitle), Style::default().fg(Color::Gray)),
        if app.entries_loading {
            Span::styled("  ◐ Loading…", Style::default().fg(Color::Yellow))
        } else {
            Span::raw("")
        },
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Blue)));

    f.render_widget(header, area);
}

fn draw_composer(f: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);

    let welcome = Paragraph::new("What's on your mind today?")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    f.render_widget(welcome, rows[0]);

    draw_input(f, app, rows[1], "Ask anything");
}

fn draw_search(f: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    draw_input(f, app, rows[0], "Search your entries…");
    draw_entry_list(f, app, rows[1]);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect, placeholder: &str) {
    let text = if app.is_submitting {
        Line::from(Span::styled(
            "Submitting…",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else if app.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                placeholder.to_string(),
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(app.input.clone(), Style::default().fg(Color::White)),
            Span::styled("▌", Style::default().fg(Color::Green)),
        ])
    };

    let input = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Blue)))
        .wrap(Wrap { trim: true });
    f.render_widget(input, area);
}

fn draw_entry_list(f: &mut Frame, app: &App, area: Rect) {
    let today = App::today();
    let entries = app.visible_entries(today);
    let search_mode = app.active_view == View::Search;

    if entries.is_empty() {
        let hint = if search_mode {
            "No results. Type a query and press Enter."
        } else {
            "Nothing here yet."
        };
        let empty = Paragraph::new(hint)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            ListItem::new(format_entry(entry, today, search_mode, idx == app.selected))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(list, area);
}

fn format_entry(entry: &Entry, today: chrono::NaiveDate, search_mode: bool, selected: bool) -> Text<'static> {
    let category_style = match entry.category {
        Category::Task => Style::default().fg(Color::Cyan),
        Category::Reminder => Style::default().fg(Color::Yellow),
        Category::Note => Style::default().fg(Color::Gray),
    };
    let text_style = if selected {
        Style::default().fg(Color::White).add_modifier(Modifier::REVERSED)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::styled(format!("{} ", entry.category.icon()), category_style),
        Span::styled(entry.text.clone(), text_style),
    ];

    if let Some(priority) = entry.priority {
        let priority_style = match priority {
            Priority::High => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            Priority::Medium => Style::default().fg(Color::Yellow),
            Priority::Low => Style::default().fg(Color::Green),
        };
        spans.push(Span::styled(format!("  {}", priority), priority_style));
    }

    if let Some(due) = entry.due_date {
        let (label, style) = if is_overdue(due, today) {
            (
                format!("  overdue {}", due),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )
        } else {
            (format!("  due {}", due), Style::default().fg(Color::Magenta))
        };
        spans.push(Span::styled(label, style));
    }

    if search_mode {
        if let Some(similarity) = entry.similarity {
            spans.push(Span::styled(
                format!("  {:.0}%", similarity * 100.0),
                Style::default().fg(Color::Cyan),
            ));
        }
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(created) = entry.created_at {
        lines.push(Line::from(Span::styled(
            format!("    └─ {}", created.format("%Y-%m-%d %H:%M")),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    Text::from(lines)
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let help = if app.has_composer() {
        "[Enter] Send  [Tab] Next View  [Ctrl+X] Sign Out  [Ctrl+C] Quit"
    } else {
        "[↑/↓] Select  [Ctrl+D] Delete  [Ctrl+R] Refresh  [Tab] Next View  [Ctrl+X] Sign Out  [Ctrl+C] Quit"
    };
    let status = Paragraph::new(help)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED));
    f.render_widget(status, area);
}

fn draw_notice(f: &mut Frame, notice: &str) {
    let area = centered_rect(60, 7, f.size());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to dismiss",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Error")
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(popup, area);
}

/// Fixed-height popup rect centered in `area`.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
