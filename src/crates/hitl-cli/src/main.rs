//! `hitl` binary

use clap::Parser;
use hitl_cli::exit::{self, ErrorReport};
use hitl_cli::{execute, load_config, Cli};
use hitl_server::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with 2 from inside clap
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit::SUCCESS),
        Err(error) => {
            let report = ErrorReport::new(&error);
            tracing::debug!(error = ?error, "Command failed");
            match serde_json::to_string_pretty(&report) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("error: {error:#}"),
            }
            ExitCode::from(report.exit_code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli).await?;
    logging::init_logging(&config.logging)?;

    if let Some(output) = execute(cli, config).await? {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
