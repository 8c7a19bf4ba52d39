//! Terminal UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use tessera_core::{Section, BOUNDARY_MARKER};

use crate::app::{App, Mode};

// Catppuccin Mocha colors
const SURFACE0: Color = Color::Rgb(49, 50, 68);
const SURFACE1: Color = Color::Rgb(69, 71, 90);
const TEXT: Color = Color::Rgb(205, 214, 244);
const SUBTEXT0: Color = Color::Rgb(166, 173, 200);
const RED: Color = Color::Rgb(243, 139, 168);
const YELLOW: Color = Color::Rgb(249, 226, 175);
const GREEN: Color = Color::Rgb(166, 227, 161);
const BLUE: Color = Color::Rgb(137, 180, 250);
const MAUVE: Color = Color::Rgb(203, 166, 247);
const TEAL: Color = Color::Rgb(148, 226, 213);

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_title_bar(frame, app, chunks[0]);
    draw_main_area(frame, app, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);

    if app.mode == Mode::Help {
        draw_help(frame);
    }
}

fn draw_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let count = app.editor.section_count();
    let current = if count > 0 { app.cursor + 1 } else { 0 };
    let unsaved = if app.editor.is_unsaved() { " [unsaved]" } else { "" };

    let title_text = format!(" Tessera - {} [{}/{}]{}", app.title, current, count, unsaved);

    let title_bar = Paragraph::new(title_text).style(Style::default().fg(TEXT).bg(SURFACE0));

    frame.render_widget(title_bar, area);
}

fn draw_main_area(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55), // Sections
            Constraint::Percentage(45), // Detail
        ])
        .split(area);

    draw_sections(frame, app, chunks[0]);
    draw_detail(frame, app, chunks[1]);
}

fn draw_sections(frame: &mut Frame, app: &App, area: Rect) {
    let editor = &app.editor;
    let annotations = editor.annotations();
    let anchor = editor.anchor();

    let items: Vec<ListItem> = editor
        .sections()
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let selected = annotations.is_selected(section.id);
            let flagged = annotations.is_flagged(section.id);
            let cautioned = annotations.is_cautioned(section.id);
            let comment_count = editor.comments().get(&i).map(Vec::len).unwrap_or(0);

            let mut spans = vec![
                Span::styled(
                    if anchor == Some(i) { "@" } else if selected { "*" } else { " " },
                    Style::default().fg(MAUVE),
                ),
                Span::styled(format!("{:>3} ", i + 1), Style::default().fg(SUBTEXT0)),
            ];
            if flagged {
                spans.push(Span::styled("[F] ", Style::default().fg(RED)));
            } else if cautioned {
                spans.push(Span::styled("[C] ", Style::default().fg(YELLOW)));
            }
            if section.is_merged() || section.has_boundary() {
                spans.push(Span::styled("[M] ", Style::default().fg(TEAL)));
            }
            if comment_count > 0 {
                spans.push(Span::styled(format!("({comment_count}) "), Style::default().fg(GREEN)));
            }

            let text_style = if flagged {
                Style::default().fg(SUBTEXT0).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(TEXT)
            };
            spans.push(Span::styled(summary(section), text_style));

            let item = ListItem::new(Line::from(spans));
            if selected {
                item.style(Style::default().bg(SURFACE1))
            } else {
                item
            }
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title(format!("Sections ({})", editor.section_count()));

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

    let mut state = ListState::default();
    if editor.section_count() > 0 {
        state.select(Some(app.cursor));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn summary(section: &Section) -> String {
    section
        .text
        .replace(BOUNDARY_MARKER, " | ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn draw_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(SUBTEXT0))
        .title(format!("Section {}", app.cursor + 1));

    let Some(section) = app.editor.section(app.cursor) else {
        frame.render_widget(
            Paragraph::new("Empty document").block(block).style(Style::default().fg(SUBTEXT0)),
            area,
        );
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for (n, part) in section.text.split(BOUNDARY_MARKER).enumerate() {
        if n > 0 {
            lines.push(Line::from(Span::styled("── merged ──", Style::default().fg(TEAL))));
        }
        lines.extend(part.lines().map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(TEXT)))));
    }

    if let Some(thread) = app.editor.comments().get(&app.cursor) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Comments ({})", thread.len()),
            Style::default().fg(MAUVE).add_modifier(Modifier::BOLD),
        )));
        for comment in thread {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} {}: ", comment.created_at.format("%Y-%m-%d"), comment.author_name),
                    Style::default().fg(GREEN),
                ),
                Span::styled(comment.content.clone(), Style::default().fg(TEXT)),
            ]));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_str = match app.mode {
        Mode::Normal => "NORMAL",
        Mode::Help => "HELP",
    };

    let status = app.status_message.as_deref().unwrap_or("");

    let help_hint = "j/k move | space select | c caution | f flag | m combine | s separate | e export | ? help";

    let status_text = format!(
        " {} | {}",
        mode_str,
        if status.is_empty() { help_hint } else { status },
    );

    let status_bar = Paragraph::new(status_text).style(Style::default().fg(SUBTEXT0).bg(SURFACE0));

    frame.render_widget(status_bar, area);
}

fn draw_help(frame: &mut Frame) {
    let area = centered_rect(64, 24, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BLUE))
        .title("Help (press any key to close)");

    let heading = Style::default().fg(MAUVE).add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("Navigation", heading)),
        Line::from("  j/k      Move down/up"),
        Line::from("  g/G      Go to top/bottom"),
        Line::from(""),
        Line::from(Span::styled("Annotations", heading)),
        Line::from("  space    Toggle selection (first selected is the anchor @)"),
        Line::from("  x        Clear selection"),
        Line::from("  c        Toggle caution (keeps text over comments)"),
        Line::from("  f        Toggle flag (drops section from export)"),
        Line::from(""),
        Line::from(Span::styled("Structure", heading)),
        Line::from("  m        Combine selected sections"),
        Line::from("  r        Combine from anchor to cursor"),
        Line::from("  s        Separate section under cursor"),
        Line::from(""),
        Line::from(Span::styled("Export", heading)),
        Line::from("  R        Refresh comments"),
        Line::from("  e / E    Export document / full context"),
        Line::from("  w        Retry saving changes"),
        Line::from("  q        Quit"),
        Line::from(""),
        Line::from(Span::styled("Press any key to close", Style::default().fg(SUBTEXT0))),
    ];

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
