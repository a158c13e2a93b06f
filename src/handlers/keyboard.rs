use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, DialogMode};

pub enum KeyAction {
    Continue,
    Quit,
}

pub async fn handle_key_event(app: &mut App, key: KeyEvent) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }

    // Dialogs first
    if app.is_dialog_open() {
        return handle_dialog_input(app, key).await;
    }

    if app.search.is_active {
        return handle_search_input(app, key).await;
    }

    handle_normal_mode(app, key).await
}

async fn handle_dialog_input(app: &mut App, key: KeyEvent) -> KeyAction {
    if let DialogMode::ConfirmDelete { .. } = app.dialog.mode {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.confirm_delete().await;
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                app.close_dialog();
            }
            _ => {}
        }
        return KeyAction::Continue;
    }

    match key.code {
        KeyCode::Enter => app.submit_dialog().await,
        KeyCode::Esc => app.close_dialog(),
        KeyCode::Backspace => {
            app.dialog.input_text.pop();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.dialog.input_text.push(c);
        }
        _ => {}
    }
    KeyAction::Continue
}

async fn handle_search_input(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter => {
            app.search.is_active = false;
        }
        KeyCode::Esc => {
            app.search.is_active = false;
            app.search.query.clear();
            app.apply_search().await;
        }
        KeyCode::Backspace => {
            app.search.query.pop();
            app.apply_search().await;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.search.query.push(c);
            app.apply_search().await;
        }
        _ => {}
    }
    KeyAction::Continue
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') => return KeyAction::Quit,

        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::Char('g') | KeyCode::Home => app.list.selected = 0,
        KeyCode::Char('G') | KeyCode::End => {
            app.list.selected = app.visible_polls().len().saturating_sub(1);
        }

        KeyCode::Char(c @ '1'..='5') => {
            let option = c as usize - '1' as usize;
            app.vote_selected(option);
        }

        KeyCode::Char('/') => {
            app.search.is_active = true;
        }
        KeyCode::Char('s') => app.cycle_sort().await,
        KeyCode::Char('x') => app.toggle_expired().await,

        KeyCode::Char('n') => app.open_create_dialog(),
        KeyCode::Char('e') => app.open_edit_dialog(),
        KeyCode::Char('d') => app.open_delete_dialog(),

        KeyCode::Char('D') => {
            app.show_debug = !app.show_debug;
        }
        KeyCode::Esc => {
            app.status_message = None;
        }
        _ => {}
    }
    KeyAction::Continue
}
