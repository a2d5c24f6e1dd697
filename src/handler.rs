use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, FocusPane, InputMode, Tab};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Actions
        KeyCode::Char('g') => app.start_generation(),
        KeyCode::Char('e') => app.export_plan(),
        KeyCode::Char('m') => app.open_model_picker(),

        // Tabs
        KeyCode::Char('1') => app.switch_tab(Tab::Preview),
        KeyCode::Char('2') => app.switch_tab(Tab::Diet),
        KeyCode::Char('3') => app.switch_tab(Tab::Workout),
        KeyCode::Char(']') => app.switch_tab(app.tab.next()),
        KeyCode::Char('[') => app.switch_tab(app.tab.prev()),

        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Form => FocusPane::Content,
                FocusPane::Content => FocusPane::Form,
            };
        }

        _ => match app.focus {
            FocusPane::Form => handle_form_key(app, key),
            FocusPane::Content => handle_content_key(app, key),
        },
    }
}

fn handle_form_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.form_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.form_nav_up(),
        KeyCode::Char('h') | KeyCode::Left => app.adjust_field(false),
        KeyCode::Char('l') | KeyCode::Right => app.adjust_field(true),
        KeyCode::Enter | KeyCode::Char('i') => app.begin_edit(),
        _ => {}
    }
}

fn handle_content_key(app: &mut App, key: KeyEvent) {
    // The preview tab scrolls through photos; plan tabs scroll text
    if app.tab == Tab::Preview {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.photo_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.photo_nav_up(),
            KeyCode::Char('d') | KeyCode::Delete => app.remove_selected_photo(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('G') => {
            app.content_scroll = app.total_content_lines.saturating_sub(app.content_height);
        }
        KeyCode::Home => app.content_scroll = 0,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let numeric = app.selected_field().is_numeric();
    match key.code {
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Enter => app.commit_edit(),
        KeyCode::Backspace => {
            app.field_input.pop();
        }
        KeyCode::Char(c) => {
            if !numeric || c.is_ascii_digit() {
                app.field_input.push(c);
            }
        }
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.tab == Tab::Preview {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(),
        MouseEventKind::ScrollUp => app.scroll_up(),
        _ => {}
    }
}
