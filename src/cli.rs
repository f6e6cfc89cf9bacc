use crate::gateway::{HttpGateway, RequestGateway};
use crate::layout::{default_layout_path, PanelLayout};
use crate::model::{OperationOutcome, PanelSettings, ProgramId};
use crate::orchestrator::{Dispatch, LogPoller, ProgramController};
use crate::panel::view::{field_element_id, ProgramView};
use crate::panel::{self, LogRegion, Panel, SharedPanel};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "program-panel",
    version,
    about = "Start, stop and configure programs on a remote program panel"
)]
pub struct Cli {
    /// Origin of the panel server
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Path prefix of the command endpoints (use "" for the bare layout)
    #[arg(long, default_value = "commands/")]
    pub base_path: String,

    /// Suffix appended to every endpoint name
    #[arg(long, default_value = ".esp")]
    pub endpoint_suffix: String,

    /// Panel layout file (defaults to <config dir>/program-panel/panel.json)
    #[arg(long)]
    pub layout: Option<PathBuf>,

    /// Log refresh interval
    #[arg(long, default_value = "1500ms")]
    pub log_interval: humantime::Duration,

    /// Timeout for a single request
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// More diagnostics (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List the programs and fields of the layout
    Programs,
    /// Toggle a program between running and stopped
    StartStop {
        program: String,
        /// Override a field before sending (field=value), repeatable
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Push the whole configuration of a running program
    UpdateConfig {
        program: String,
        /// Override a field before sending (field=value), repeatable
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Push a single configuration value
    SetValue {
        program: String,
        field: String,
        value: String,
    },
    /// Print the server log
    Log {
        /// Keep polling and print new output
        #[arg(long)]
        follow: bool,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => Err(format!("expected field=value, got {raw:?}")),
    }
}

/// Build `PanelSettings` from CLI arguments.
pub fn build_settings(args: &Cli) -> PanelSettings {
    PanelSettings {
        base_url: args.base_url.clone(),
        base_path: args.base_path.clone(),
        endpoint_suffix: args.endpoint_suffix.clone(),
        request_timeout: Duration::from(args.request_timeout),
        log_interval: Duration::from(args.log_interval),
        user_agent: format!("program-panel/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Load the layout. A missing default layout yields an empty panel; an explicit
/// `--layout` must exist.
fn load_layout(args: &Cli) -> Result<PanelLayout> {
    if let Some(path) = args.layout.as_deref() {
        return PanelLayout::load(path).context("load panel layout");
    }
    let path = default_layout_path();
    if path.exists() {
        PanelLayout::load(&path).context("load panel layout")
    } else {
        tracing::warn!(path = %path.display(), "no panel layout found, starting empty");
        Ok(PanelLayout::default())
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let tui_mode = cfg!(feature = "tui") && args.command.is_none();
    crate::logging::init(args.verbose, tui_mode)?;

    let settings = build_settings(&args);
    let layout = load_layout(&args)?;
    let panel = panel::shared(Panel::from_layout(&layout).context("build panel")?);
    let gateway: Arc<dyn RequestGateway> = Arc::new(HttpGateway::new(&settings)?);

    let Some(command) = args.command.clone() else {
        #[cfg(feature = "tui")]
        {
            let region = LogRegion::default();
            LogPoller::new(gateway.clone(), region.clone(), settings.log_interval).spawn();
            let controller = Arc::new(ProgramController::new(gateway, panel.clone()));
            return crate::tui::run(panel, region, controller, settings.base_url.clone()).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            return Err(anyhow::anyhow!(
                "built without TUI support; use a subcommand (see --help)"
            ));
        }
    };

    let (out_tx, out_handle) = spawn_output_writer();
    let res = run_command(command, &settings, panel, gateway, &out_tx).await;
    drop(out_tx);
    let _ = out_handle.await;
    res
}

async fn run_command(
    command: Command,
    settings: &PanelSettings,
    panel: SharedPanel,
    gateway: Arc<dyn RequestGateway>,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    match command {
        Command::Programs => {
            let panel = panel::lock(&panel);
            for program in panel.programs() {
                let _ = out.send(OutputLine::Stdout(program.to_string()));
                for field in panel.forms.fields(program) {
                    let _ = out.send(OutputLine::Stdout(format!(
                        "  {:<32} {:?} = {}",
                        field_element_id(program, &field.name),
                        field.kind,
                        field.value
                    )));
                }
            }
            Ok(())
        }
        Command::StartStop { program, set } => {
            let program = ProgramId::new(program);
            apply_overrides(&panel, &program, &set)?;
            let controller = ProgramController::new(gateway, panel);
            let dispatch = controller.start_stop(&program).await;
            report(out, &program, "start-stop", dispatch)
        }
        Command::UpdateConfig { program, set } => {
            let program = ProgramId::new(program);
            apply_overrides(&panel, &program, &set)?;
            let controller = ProgramController::new(gateway, panel);
            let dispatch = controller.update_config(&program).await;
            report(out, &program, "update-config", dispatch)
        }
        Command::SetValue {
            program,
            field,
            value,
        } => {
            let program = ProgramId::new(program);
            {
                let mut panel = panel::lock(&panel);
                panel
                    .forms
                    .set_input(&program, &field, &value)
                    .context("set field value")?;
                // Invoking the command is the live edit, whatever the layout's toggle says.
                panel.forms.register_program(program.clone(), Some(true));
            }
            let controller = ProgramController::new(gateway, panel);
            let dispatch = controller
                .config_changed(&program, &field)
                .await
                .context("send field value")?;
            report(out, &program, "set-value", dispatch)
        }
        Command::Log { follow } => {
            if follow {
                follow_log(gateway, settings.log_interval, out).await
            } else {
                match gateway.get_log().await {
                    OperationOutcome::Success(snapshot) => {
                        let _ = out.send(OutputLine::Stdout(snapshot.text));
                        Ok(())
                    }
                    OperationOutcome::Failure => Err(anyhow::anyhow!("failed to fetch log")),
                }
            }
        }
    }
}

fn apply_overrides(panel: &SharedPanel, program: &ProgramId, set: &[(String, String)]) -> Result<()> {
    let mut panel = panel::lock(panel);
    for (field, value) in set {
        panel
            .forms
            .set_input(program, field, value)
            .with_context(|| format!("apply --set {field}={value}"))?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CommandReport<'a> {
    timestamp_utc: String,
    program: &'a ProgramId,
    command: &'a str,
    view: &'a ProgramView,
    elements: BTreeMap<String, String>,
}

/// Print the program's view after a one-shot command. A shown fail indicator is an error.
fn report(
    out: &mpsc::UnboundedSender<OutputLine>,
    program: &ProgramId,
    command: &str,
    dispatch: Dispatch,
) -> Result<()> {
    let view = match dispatch {
        Dispatch::Completed(view) => view,
        Dispatch::Dropped => return Err(anyhow::anyhow!("{program} is busy")),
        Dispatch::AutoUpdateOff => {
            return Err(anyhow::anyhow!("auto-update is off for {program}"))
        }
    };
    let summary = CommandReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        program,
        command,
        view: &view,
        elements: view.visible_elements(program),
    };
    let _ = out.send(OutputLine::Stdout(serde_json::to_string_pretty(&summary)?));
    if view.fail_visible {
        return Err(anyhow::anyhow!("{command} failed for {program}"));
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum LogDelta<'a> {
    Unchanged,
    /// Text added after what was already printed.
    Appended(&'a str),
    /// The log no longer starts with what was printed; carries the whole text.
    Restarted(&'a str),
}

fn log_delta<'a>(printed: &str, current: &'a str) -> LogDelta<'a> {
    if current == printed {
        return LogDelta::Unchanged;
    }
    match current.strip_prefix(printed) {
        Some(added) if added.trim_matches('\n').is_empty() => LogDelta::Unchanged,
        Some(added) => LogDelta::Appended(added.trim_matches('\n')),
        None => LogDelta::Restarted(current.trim_end_matches('\n')),
    }
}

/// Poll the log until Ctrl-C and print what was added since the last refresh.
async fn follow_log(
    gateway: Arc<dyn RequestGateway>,
    interval: Duration,
    out: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let region = LogRegion::default();
    let poller = LogPoller::new(gateway, region.clone(), interval).spawn();
    let mut printed = String::new();
    let mut refresh = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = refresh.tick() => {
                let text = region.snapshot().text;
                match log_delta(&printed, &text) {
                    LogDelta::Unchanged => continue,
                    LogDelta::Appended(added) => {
                        let _ = out.send(OutputLine::Stdout(added.to_string()));
                    }
                    LogDelta::Restarted(all) => {
                        let _ = out.send(OutputLine::Stderr("-- log restarted --".into()));
                        let _ = out.send(OutputLine::Stdout(all.to_string()));
                    }
                }
                printed = text;
            }
        }
    }

    poller.abort();
    Ok(())
}
