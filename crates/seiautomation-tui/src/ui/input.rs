//! Keyboard input handling for the TUI.
//!
//! Handlers only change application state. Work that talks to the server is
//! queued on the `App` and carried out by `App::run_pending_actions` after the
//! next frame is drawn.

use crossterm::event::{KeyCode, KeyEvent};

use seiautomation_core::SessionPhase;

use crate::app::{
    can_add_email_char, can_add_password_char, App, AppState, DashboardFocus, LoginFocus,
    ParamField,
};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match app.phase() {
        SessionPhase::Authenticating => {
            if key.code == KeyCode::Char('q') {
                app.state = AppState::Quitting;
                return true;
            }
            false
        }
        SessionPhase::Unauthenticated => handle_login_input(app, key),
        SessionPhase::Authenticated => {
            handle_dashboard_input(app, key);
            false
        }
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    if app.login_busy {
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => app.request_login(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.len(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.len(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    false
}

fn handle_dashboard_input(app: &mut App, key: KeyEvent) {
    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return;
        }
        KeyCode::Char('x') => {
            app.logout();
            return;
        }
        KeyCode::Char('u') => {
            app.request_refresh();
            return;
        }
        _ => {}
    }

    let Some(dash) = app.dashboard.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Tab => dash.focus = dash.focus.next(),
        KeyCode::BackTab => dash.focus = dash.focus.prev(),
        KeyCode::Char('r') => dash.request_submit(),
        _ => match dash.focus {
            DashboardFocus::Tasks => match key.code {
                KeyCode::Up | KeyCode::Char('k') => dash.move_task_cursor(false),
                KeyCode::Down | KeyCode::Char('j') => dash.move_task_cursor(true),
                KeyCode::Char(' ') | KeyCode::Enter => dash.toggle_task_at_cursor(),
                _ => {}
            },
            DashboardFocus::Params => match key.code {
                KeyCode::Up => dash.param_field = dash.param_field.prev(),
                KeyCode::Down => dash.param_field = dash.param_field.next(),
                KeyCode::Backspace => dash.backspace(),
                KeyCode::Enter if dash.param_field == ParamField::Submit => dash.request_submit(),
                KeyCode::Char(' ') | KeyCode::Enter => dash.toggle_focused_flag(),
                KeyCode::Char(c) => dash.input_char(c),
                _ => {}
            },
            DashboardFocus::Runs => match key.code {
                KeyCode::Up | KeyCode::Char('k') => dash.move_run_selection(false),
                KeyCode::Down | KeyCode::Char('j') => dash.move_run_selection(true),
                _ => {}
            },
        },
    }
}
