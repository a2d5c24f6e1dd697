use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Tabs, Wrap,
    },
};
use physique_core::{Extracted, MAX_REQUEST_IMAGES};
use crate::app::{App, FocusPane, FormField, InputMode, StatusKind, Tab};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('#') {
        let heading = trimmed.trim_start_matches('#').trim().to_string();
        return Line::from(Span::styled(heading, Style::default().fg(Color::Cyan).bold()));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Rows `lines` occupy once word-wrapped to `width` columns, as `Paragraph` lays them out.
fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    let rows = Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    rows.min(usize::from(u16::MAX)) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [form_area, content_area] = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(2, 3),
    ])
    .areas(body_area);

    render_form(app, frame, form_area);
    render_content(app, frame, content_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Physique Pro ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("Transform your body with AI-powered insights", Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(format!("[{}]", app.selected_model), Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_form(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Form;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Start Your Journey ");

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [fields_area, action_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(inner);

    let selected = app.selected_field();
    let items: Vec<ListItem> = FormField::all()
        .into_iter()
        .map(|field| {
            let editing = app.input_mode == InputMode::Editing && field == selected;
            let value = if editing {
                Span::styled(format!("{}_", app.field_input), Style::default().fg(Color::Yellow))
            } else {
                Span::styled(app.field_value(field), Style::default().fg(Color::White).bold())
            };
            ListItem::new(vec![
                Line::from(Span::styled(field.label(), Style::default().fg(Color::DarkGray))),
                Line::from(vec![Span::raw("  "), value]),
            ])
        })
        .collect();

    let highlight = if focused {
        Style::default().bg(Color::Blue).fg(Color::White)
    } else {
        Style::default().bg(Color::DarkGray)
    };
    let list = List::new(items)
        .highlight_style(highlight)
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, fields_area, &mut app.form_state);

    let action = if app.plan_loading {
        Line::from(Span::styled(" Generating... ", Style::default().fg(Color::Yellow)))
    } else {
        Line::from(vec![
            Span::styled(" g ", Style::default().bg(Color::Green).fg(Color::Black).bold()),
            Span::styled(" Generate Plan ", Style::default().fg(Color::Green)),
        ])
    };
    let action = Paragraph::new(action).block(Block::default().borders(Borders::TOP));
    frame.render_widget(action, action_area);
}

fn render_content(app: &mut App, frame: &mut Frame, area: Rect) {
    let [tabs_area, body_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
    ])
    .areas(area);

    let titles: Vec<Line> = Tab::all()
        .iter()
        .enumerate()
        .map(|(i, tab)| Line::from(format!(" {} {} ", i + 1, tab.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(tabs, tabs_area);

    match app.tab {
        Tab::Preview => render_preview(app, frame, body_area),
        Tab::Diet | Tab::Workout => render_plan_tab(app, frame, body_area),
    }
}

fn content_block(app: &App, title: &str) -> Block<'static> {
    let border_color = if app.focus == FocusPane::Content { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title))
}

fn render_preview(app: &mut App, frame: &mut Frame, area: Rect) {
    let sections = app.sections();
    let assessment = sections.as_ref().and_then(|s| s.assessment.clone());

    let [photos_area, assessment_area] = if assessment.is_some() {
        Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area)
    } else {
        Layout::vertical([Constraint::Min(0), Constraint::Length(0)]).areas(area)
    };

    let block = content_block(app, "Photo Preview");
    if app.photos.is_empty() {
        let placeholder = Paragraph::new("Add photos to see preview here")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, photos_area);
    } else {
        let items: Vec<ListItem> = app
            .photos
            .ordered()
            .enumerate()
            .map(|(i, photo)| {
                let name = match photo.source {
                    physique_core::PhotoSource::Camera => "Camera Shot".to_string(),
                    physique_core::PhotoSource::Upload => {
                        let offset = usize::from(app.photos.camera().is_some());
                        format!("Photo {}", i + 1 - offset)
                    }
                };
                let dims = photo
                    .dimensions
                    .map(|(w, h)| format!("{}x{}", w, h))
                    .unwrap_or_else(|| "?x?".to_string());

                let mut spans = vec![
                    Span::styled(name, Style::default().fg(Color::Yellow).bold()),
                    Span::raw(format!("  {}  {}  {} KB", photo.label, dims, photo.size_kb())),
                ];
                if i >= MAX_REQUEST_IMAGES {
                    spans.push(Span::styled("  (not sent)", Style::default().fg(Color::DarkGray)));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, photos_area, &mut app.photo_state);
    }

    if let Some(text) = assessment {
        let lines: Vec<Line> = text.lines().map(parse_markdown_line).collect();
        let paragraph = Paragraph::new(lines)
            .block(content_block(app, "Assessment"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, assessment_area);
    }
}

fn render_plan_tab(app: &mut App, frame: &mut Frame, area: Rect) {
    let (title, placeholder) = match app.tab {
        Tab::Workout => ("Workout Plan", "Generate your plan to see workout schedule"),
        _ => ("Diet Plan", "Generate your plan to see diet recommendations"),
    };
    let block = content_block(app, title);
    let inner_area = block.inner(area);
    app.content_height = inner_area.height;

    if app.plan_loading {
        let dots = ".".repeat(usize::from(app.animation_frame) + 1);
        let loading = Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Crafting your personalized plan{}", dots),
                Style::default().fg(Color::Yellow),
            )),
            Line::from(Span::styled(
                format!("({} chars)", app.plan_chars_received()),
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(block);
        frame.render_widget(loading, area);
        app.total_content_lines = 0;
        return;
    }

    let Some(sections) = app.sections() else {
        let paragraph = Paragraph::new(placeholder)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        app.total_content_lines = 0;
        return;
    };

    let section: &Extracted = if app.tab == Tab::Workout { &sections.workout } else { &sections.diet };

    let mut lines: Vec<Line> = Vec::new();
    if let Some(warning) = &section.warning {
        lines.push(Line::from(Span::styled(
            format!("! {}", warning),
            Style::default().fg(Color::Yellow).bold(),
        )));
        lines.push(Line::default());
    }
    lines.extend(section.text.lines().map(parse_markdown_line));

    app.total_content_lines = wrapped_height(&lines, inner_area.width);
    let max_scroll = app.total_content_lines.saturating_sub(app.content_height);
    app.content_scroll = app.content_scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.content_scroll, 0));
    frame.render_widget(paragraph, area);

    if app.total_content_lines > app.content_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(app.total_content_lines as usize)
            .position(app.content_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];

    // A status message replaces the key hints until the next one
    if let Some(status) = &app.status {
        let color = match status.kind {
            StatusKind::Info => Color::Green,
            StatusKind::Warning => Color::Yellow,
            StatusKind::Error => Color::Red,
        };
        spans.push(Span::styled(status.text.clone(), Style::default().bg(Color::Black).fg(color)));
        let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
        frame.render_widget(footer, area);
        return;
    }

    let hints: Vec<(&str, &str)> = match (app.input_mode, app.focus, app.tab) {
        (InputMode::Editing, _, _) => vec![("Enter", "apply"), ("Esc", "cancel")],
        (InputMode::Normal, FocusPane::Form, _) => vec![
            ("j/k", "field"),
            ("h/l", "adjust"),
            ("Enter", "edit"),
            ("g", "generate"),
            ("e", "export"),
            ("m", "model"),
            ("Tab", "focus"),
            ("q", "quit"),
        ],
        (InputMode::Normal, FocusPane::Content, Tab::Preview) => vec![
            ("j/k", "photo"),
            ("d", "remove"),
            ("1-3", "tab"),
            ("Tab", "focus"),
            ("q", "quit"),
        ],
        (InputMode::Normal, FocusPane::Content, _) => vec![
            ("j/k", "scroll"),
            ("^d/^u", "page"),
            ("1-3", "tab"),
            ("e", "export"),
            ("Tab", "focus"),
            ("q", "quit"),
        ],
    };

    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let rows = app.available_models.len().max(1) as u16;
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (rows + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    if app.available_models.is_empty() {
        let message = if app.models_task.is_some() { "Loading models..." } else { "No models found" };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, popup_area);
        return;
    }

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}
