// cvcheck/src/main.rs

mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug cvcheck check ... shows one line per check
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            paths,
            config,
            vocabulary,
            selection,
            criteria,
            format,
            output,
            jobs,
        } => {
            let options = commands::check::CheckOptions {
                paths,
                config,
                vocabulary,
                selection: selection.to_selection(),
                criteria,
                format,
                output,
                jobs,
            };
            commands::check::execute(options).await?;
        }
        Commands::List { config, selection } => {
            commands::list::execute(config, selection.to_selection())?;
        }
    }

    Ok(())
}
