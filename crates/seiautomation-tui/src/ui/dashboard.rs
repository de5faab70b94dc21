//! Dashboard rendering: task checklist, run parameters, recent runs.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{Dashboard, DashboardFocus, ParamField};
use crate::utils::{format_local_time, truncate_string};

use super::styles;

pub const NO_LOGS_MESSAGE: &str = "No logs available yet.";

pub fn render(frame: &mut Frame, dash: &Dashboard, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(11)])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);

    render_tasks(frame, dash, left[0]);
    render_params(frame, dash, left[1]);
    render_runs(frame, dash, right[0]);
    render_run_log(frame, dash, right[1]);
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    Block::default()
        .title(Span::styled(format!(" {} ", title), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused))
}

fn render_tasks(frame: &mut Frame, dash: &Dashboard, area: Rect) {
    let focused = dash.focus == DashboardFocus::Tasks;
    let block = panel("Tasks", focused);

    if dash.tasks.is_empty() {
        let paragraph = Paragraph::new(Span::styled(" No tasks available.", styles::muted_style()))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let width = area.width.saturating_sub(8) as usize;
    let items: Vec<ListItem> = dash
        .tasks
        .iter()
        .map(|task| {
            let mark = if dash.is_selected(&task.slug) { "[x] " } else { "[ ] " };
            let mut lines = vec![Line::from(vec![
                Span::styled(mark, styles::highlight_style()),
                Span::styled(task.name.clone(), styles::list_item_style()),
            ])];
            if !task.description.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("    {}", truncate_string(&task.description, width)),
                    styles::muted_style(),
                )));
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        });

    let mut state = ListState::default();
    state.select(Some(dash.task_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn render_params(frame: &mut Frame, dash: &Dashboard, area: Rect) {
    let focused = dash.focus == DashboardFocus::Params;
    let allow_auto = dash.allow_auto();

    let row = |field: ParamField, label: String, enabled: bool| -> Line<'static> {
        let style = if focused && dash.param_field == field {
            styles::selected_style()
        } else if enabled {
            styles::list_item_style()
        } else {
            styles::muted_style()
        };
        Line::from(Span::styled(format!(" {}", label), style))
    };

    let cursor = |field: ParamField| {
        if focused && dash.param_field == field {
            "▌"
        } else {
            ""
        }
    };

    let mut lines = vec![
        row(
            ParamField::BlocoId,
            format!("Block ID: [{:<10}{}]", dash.options.bloco_id, cursor(ParamField::BlocoId)),
            true,
        ),
        row(
            ParamField::Limit,
            format!("Limit:    [{:<10}{}]", dash.options.limit, cursor(ParamField::Limit)),
            true,
        ),
        row(
            ParamField::Headless,
            format!("{} Run headless", checkbox(dash.options.headless)),
            allow_auto,
        ),
        row(
            ParamField::AutoCredentials,
            format!("{} Use automatic credentials", checkbox(dash.options.auto_credentials)),
            allow_auto,
        ),
        row(
            ParamField::DevMode,
            format!("{} Development mode", checkbox(dash.options.dev_mode)),
            true,
        ),
    ];

    let button = if dash.submitting {
        "[ Dispatching... ]".to_string()
    } else if focused && dash.param_field == ParamField::Submit {
        "[ ▶ Run selected ◀ ]".to_string()
    } else {
        "[   Run selected   ]".to_string()
    };
    lines.push(Line::from(""));
    lines.push(row(ParamField::Submit, button, !dash.submitting));

    if let Some(ref error) = dash.error {
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    } else if let Some(ref success) = dash.success {
        lines.push(Line::from(Span::styled(format!(" {}", success), styles::success_style())));
    } else if !allow_auto {
        lines.push(Line::from(Span::styled(
            " Automatic credentials are not enabled for this account.",
            styles::muted_style(),
        )));
    }

    let paragraph = Paragraph::new(lines).block(panel("Parameters", focused));
    frame.render_widget(paragraph, area);
}

fn render_runs(frame: &mut Frame, dash: &Dashboard, area: Rect) {
    let focused = dash.focus == DashboardFocus::Runs;
    let block = panel("Recent runs", focused);

    if dash.runs.is_empty() {
        let paragraph =
            Paragraph::new(Span::styled(" No runs yet.", styles::muted_style())).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let name_width = area.width.saturating_sub(34) as usize;
    let items: Vec<ListItem> = dash
        .runs
        .iter()
        .map(|run| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!(" {:<w$} ", truncate_string(&run.task_name, name_width), w = name_width),
                    styles::list_item_style(),
                ),
                Span::styled(format!("{:<9}", run.status.to_string()), styles::run_status_style(&run.status)),
                Span::styled(format_local_time(&run.created_at), styles::muted_style()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        });

    let mut state = ListState::default();
    state.select(Some(dash.run_selection));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Split `text` into rows of at most `width` characters. Empty text is one row.
fn wrap_log_line(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

/// Scroll offset that puts the last of `rows` at the bottom of the view.
fn tail_offset(rows: usize, visible: usize) -> u16 {
    u16::try_from(rows.saturating_sub(visible)).unwrap_or(u16::MAX)
}

fn render_run_log(frame: &mut Frame, dash: &Dashboard, area: Rect) {
    let Some(run) = dash.selected_run() else {
        frame.render_widget(panel("Log", false), area);
        return;
    };

    // One leading space of padding inside the borders.
    let text_width = area.width.saturating_sub(3) as usize;

    let mut lines = vec![Line::from(vec![
        Span::styled(" Status: ", styles::muted_style()),
        Span::styled(run.status.to_string(), styles::run_status_style(&run.status)),
    ])];
    if let Some(finished) = run.finished_at.as_ref() {
        lines.push(Line::from(vec![
            Span::styled(" Finished: ", styles::muted_style()),
            Span::raw(format_local_time(finished)),
        ]));
    }
    if let Some(params) = run.params.as_ref() {
        lines.push(Line::from(vec![
            Span::styled(" Params: ", styles::muted_style()),
            Span::raw(truncate_string(&params.to_string(), text_width.saturating_sub(8))),
        ]));
    }
    lines.push(Line::from(""));

    if run.log.trim().is_empty() {
        lines.push(Line::from(Span::styled(format!(" {}", NO_LOGS_MESSAGE), styles::muted_style())));
    } else {
        lines.extend(
            run.log
                .lines()
                .flat_map(|l| wrap_log_line(l, text_width))
                .map(|row| Line::from(format!(" {}", row))),
        );
    }

    // Keep the tail of long logs in view.
    let scroll = tail_offset(lines.len(), area.height.saturating_sub(2) as usize);

    let paragraph = Paragraph::new(lines)
        .block(panel(&run.task_name, false))
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
