mod help;
mod state;

use crate::model::{ConfigValue, ProgramId};
use crate::orchestrator::{self, ProgramController, ProgramOperationGuard, UiCommand};
use crate::panel::form::FieldKind;
use crate::panel::view::{field_element_id, Element};
use crate::panel::{self, LogContent, LogRegion, Panel, SharedPanel};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use state::{Focus, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;

pub async fn run(
    panel: SharedPanel,
    region: LogRegion,
    controller: Arc<ProgramController>,
    server: String,
) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_panel = panel.clone();
    let guard = controller.guard().clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_panel, region, guard, server, cmd_tx));

    orchestrator::run_controller(controller, panel, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    shared: SharedPanel,
    region: LogRegion,
    guard: ProgramOperationGuard,
    server: String,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now() - tick_rate;

    let res = loop {
        if last_tick.elapsed() >= tick_rate {
            // Render from a copy so the lock is never held across terminal I/O.
            let snapshot = {
                let mut panel = panel::lock(&shared);
                let notice = std::mem::take(&mut panel.notice);
                if !notice.is_empty() {
                    state.info = notice;
                }
                panel.clone()
            };
            let field_count = selected_program(&state, &snapshot)
                .map(|p| snapshot.forms.fields(&p).len())
                .unwrap_or(0);
            state.clamp(snapshot.programs().len(), field_count);

            let log = region.snapshot();
            terminal
                .draw(|f| draw(f.area(), f, &state, &snapshot, &log, &guard, &server))
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &shared, &cmd_tx) == KeyOutcome::Quit {
                    break Ok(());
                }
                last_tick = Instant::now() - tick_rate;
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn selected_program(state: &UiState, panel: &Panel) -> Option<ProgramId> {
    panel.programs().get(state.program_selected).cloned()
}

/// Queue a live edit if the program has an auto-update toggle; the controller decides
/// whether the toggle is on.
fn queue_live_edit(
    panel: &Panel,
    program: &ProgramId,
    field: &str,
    cmd_tx: &UnboundedSender<UiCommand>,
) {
    if panel.forms.auto_update(program).is_ok() {
        let _ = cmd_tx.send(UiCommand::ConfigChanged {
            program: program.clone(),
            field: field.to_string(),
        });
    }
}

fn handle_key(
    state: &mut UiState,
    k: KeyEvent,
    shared: &SharedPanel,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> KeyOutcome {
    let mut panel = panel::lock(shared);
    let Some(program) = selected_program(state, &panel) else {
        return match (k.modifiers, k.code) {
            (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                KeyOutcome::Quit
            }
            (_, KeyCode::Char('?')) => {
                state.show_help = !state.show_help;
                KeyOutcome::Continue
            }
            _ => KeyOutcome::Continue,
        };
    };
    let field_count = panel.forms.fields(&program).len();

    if let Some(edit) = state.editing.as_mut() {
        match k.code {
            KeyCode::Esc => state.editing = None,
            KeyCode::Backspace => {
                edit.text.pop();
            }
            KeyCode::Enter => {
                let Some(edit) = state.editing.take() else {
                    return KeyOutcome::Continue;
                };
                match panel.forms.set_input(&program, &edit.field, &edit.text) {
                    Ok(value) => {
                        state.info = format!("{} = {value}", field_element_id(&program, &edit.field));
                        queue_live_edit(&panel, &program, &edit.field, cmd_tx);
                    }
                    Err(e) => state.info = e.to_string(),
                }
            }
            KeyCode::Char(c) if !k.modifiers.contains(KeyModifiers::CONTROL) => edit.text.push(c),
            _ => {}
        }
        return KeyOutcome::Continue;
    }

    match (k.modifiers, k.code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return KeyOutcome::Quit;
        }
        (_, KeyCode::Char('?')) => state.show_help = !state.show_help,
        (_, KeyCode::Esc) => state.show_help = false,
        (_, KeyCode::Tab) => state.cycle_focus(field_count),
        (_, KeyCode::Up) | (_, KeyCode::Char('k')) => match state.focus {
            Focus::Programs => state.select_prev_program(panel.programs().len()),
            Focus::Fields => state.select_prev_field(field_count),
        },
        (_, KeyCode::Down) | (_, KeyCode::Char('j')) => match state.focus {
            Focus::Programs => state.select_next_program(panel.programs().len()),
            Focus::Fields => state.select_next_field(field_count),
        },
        (_, KeyCode::Enter) | (_, KeyCode::Char('s')) => {
            let _ = cmd_tx.send(UiCommand::StartStop(program));
        }
        (_, KeyCode::Char('u')) => {
            let _ = cmd_tx.send(UiCommand::UpdateConfig(program));
        }
        (_, KeyCode::Char('a')) => {
            let toggled = panel
                .forms
                .auto_update(&program)
                .and_then(|on| panel.forms.set_auto_update(&program, !on).map(|_| !on));
            state.info = match toggled {
                Ok(on) => format!("Auto-update {}", if on { "on" } else { "off" }),
                Err(e) => e.to_string(),
            };
        }
        (_, KeyCode::Char('e')) if state.focus == Focus::Fields => {
            if let Some(field) = panel.forms.fields(&program).get(state.field_selected) {
                if field.kind == FieldKind::Checkbox {
                    state.info = "Use space to toggle a checkbox".into();
                } else {
                    let (name, current) = (field.name.clone(), field.value.to_form_value());
                    state.begin_edit(&name, &current);
                }
            }
        }
        (_, KeyCode::Char(' ')) if state.focus == Focus::Fields => {
            let name = panel
                .forms
                .fields(&program)
                .get(state.field_selected)
                .filter(|f| f.kind == FieldKind::Checkbox)
                .map(|f| f.name.clone());
            if let Some(name) = name {
                match panel.forms.toggle_flag(&program, &name) {
                    Ok(_) => queue_live_edit(&panel, &program, &name, cmd_tx),
                    Err(e) => state.info = e.to_string(),
                }
            }
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn draw(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    panel: &Panel,
    log: &LogContent,
    guard: &ProgramOperationGuard,
    server: &str,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Percentage(35),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let header = Paragraph::new(Line::from(vec![
        Span::styled("server ", Style::default().fg(Color::Gray)),
        Span::styled(server.to_string(), Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled("? for help", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("program-panel"));
    f.render_widget(header, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)].as_ref())
            .split(chunks[1]);
        draw_programs(body[0], f, state, panel, guard);
        draw_detail(body[1], f, state, panel);
    }

    draw_log(chunks[2], f, log);

    let status = Paragraph::new(state.info.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[3]);
}

fn draw_programs(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    panel: &Panel,
    guard: &ProgramOperationGuard,
) {
    let lines: Vec<Line> = panel
        .programs()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let selected = i == state.program_selected;
            let name_style = match (selected, state.focus) {
                (true, Focus::Programs) => Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
                (true, Focus::Fields) => Style::default().add_modifier(Modifier::BOLD),
                _ => Style::default(),
            };
            let state_label = panel.view(p).map(|v| v.state_label.as_str()).unwrap_or("");
            let mut spans = vec![
                Span::raw(if selected { "▶ " } else { "  " }),
                Span::styled(p.to_string(), name_style),
                Span::styled(format!("  {state_label}"), Style::default().fg(Color::Gray)),
            ];
            if guard.is_in_flight(p) {
                spans.push(Span::styled(" …", Style::default().fg(Color::Yellow)));
            }
            Line::from(spans)
        })
        .collect();

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Programs"));
    f.render_widget(p, area);
}

fn button(label: &str, enabled: bool) -> Span<'static> {
    let style = if enabled {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!("[ {label} ]"), style)
}

fn draw_detail(area: Rect, f: &mut ratatui::Frame, state: &UiState, panel: &Panel) {
    let Some(program) = selected_program(state, panel) else {
        let p = Paragraph::new("No programs in the layout. Pass --layout <file>.")
            .block(Block::default().borders(Borders::ALL).title("Program"));
        f.render_widget(p, area);
        return;
    };
    let view = panel.view(&program).cloned().unwrap_or_default();
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("{}: ", Element::State.id(&program)), dim),
            Span::styled(view.state_label.clone(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
    ];

    let mut controls = vec![
        button(&view.switch_label, view.switch_enabled),
        Span::raw("  "),
        button("Update", view.update_enabled),
        Span::raw("  "),
    ];
    if view.success_visible {
        controls.push(Span::styled("Success", Style::default().fg(Color::Green)));
    }
    if view.fail_visible {
        controls.push(Span::styled("Failed", Style::default().fg(Color::Red)));
    }
    lines.push(Line::from(controls));

    if let Ok(on) = panel.forms.auto_update(&program) {
        lines.push(Line::from(vec![
            Span::raw(if on { "[x] " } else { "[ ] " }),
            Span::raw("auto-update"),
        ]));
    }

    let fields = panel.forms.fields(&program);
    if !fields.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Configuration:"));
    }
    for (i, field) in fields.iter().enumerate() {
        let selected = state.focus == Focus::Fields && i == state.field_selected;
        let value = match (&state.editing, &field.value) {
            (Some(edit), _) if selected && edit.field == field.name => Span::styled(
                format!("{}_", edit.text),
                Style::default().fg(Color::Yellow),
            ),
            (_, ConfigValue::Flag(on)) => Span::raw(if *on { "[x]" } else { "[ ]" }),
            (_, ConfigValue::Text(text)) => Span::raw(text.clone()),
        };
        let label_style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(if selected { "▶ " } else { "  " }),
            Span::styled(format!("{}: ", field.display_name), label_style),
            value,
            Span::styled(
                format!("  ({})", field_element_id(&program, &field.name)),
                dim,
            ),
        ]));
    }

    if view.additional_controls_visible && !view.additional_controls.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Additional controls:"));
        for line in view.additional_controls.lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(program.to_string()));
    f.render_widget(p, area);
}

fn draw_log(area: Rect, f: &mut ratatui::Frame, log: &LogContent) {
    let clock = time::macros::format_description!("[hour]:[minute]:[second]");
    let title = match log.refreshed_at.and_then(|t| t.format(clock).ok()) {
        Some(at) => format!("Log (refreshed {at})"),
        None => "Log".to_string(),
    };
    let lines: Vec<Line> = log.text.lines().map(Line::from).collect();
    // Keep the newest output in view.
    let visible = area.height.saturating_sub(2) as usize;
    let offset = lines.len().saturating_sub(visible) as u16;
    let p = Paragraph::new(lines)
        .scroll((offset, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}
