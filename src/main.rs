mod cli;
mod gateway;
mod layout;
mod logging;
mod model;
mod orchestrator;
mod panel;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.command.is_some();

    match cli::run(args).await {
        Ok(()) => {
            // Exit explicitly so detached request tasks do not hold the runtime open.
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
