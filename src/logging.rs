use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Log file used while the TUI owns the terminal.
pub fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("program-panel")
        .join("program-panel.log")
}

fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "program_panel=warn",
        1 => "program_panel=info",
        2 => "program_panel=debug",
        _ => "program_panel=trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `-v`.
///
/// With `to_file` the output goes to [`log_file_path`] so it does not tear the TUI.
pub fn init(verbose: u8, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    let installed = if to_file {
        let path = log_file_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    } else {
        builder.with_writer(std::io::stderr).try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("init logging: {err}"))
}
