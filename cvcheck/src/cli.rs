// cvcheck/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Args, Parser, Subcommand, ValueEnum};
use cvcheck_core::domain::scoring::Criteria;
use cvcheck_core::domain::selection::Selection;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cvcheck")]
#[command(about = "DRS and controlled-vocabulary compliance checker for climate datasets", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Check filters shared by `check` and `list`.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Check ids to leave out (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Only run these check ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,
}

impl SelectionArgs {
    pub fn to_selection(&self) -> Selection {
        Selection {
            skip: self.skip.clone(),
            include: self.include.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🔎 Checks dataset descriptors against the project rules
    Check {
        /// Dataset descriptors (*.json) or directories holding them
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Project configuration file, or the directory holding cvcheck.yaml
        #[arg(long, short, default_value = ".")]
        config: PathBuf,

        /// Vocabulary directory (<dir>/<project_id>/<collection>.yaml)
        #[arg(long)]
        vocabulary: Option<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Severities that decide the verdict: strict | normal | lenient
        #[arg(long, default_value = "normal")]
        criteria: Criteria,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Files checked in parallel
        #[arg(long, short, default_value = "4")]
        jobs: usize,
    },

    /// 📋 Lists the checks that would run, in execution order
    List {
        /// Project configuration file, or the directory holding cvcheck.yaml
        #[arg(long, short, default_value = ".")]
        config: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    #[test]
    fn test_cli_parse_check_defaults() -> Result<()> {
        let args = Cli::parse_from(["cvcheck", "check", "data/"]);
        match args.command {
            Commands::Check {
                paths,
                config,
                criteria,
                format,
                jobs,
                selection,
                ..
            } => {
                assert_eq!(paths, vec![PathBuf::from("data/")]);
                assert_eq!(config.to_string_lossy(), ".");
                assert_eq!(criteria, Criteria::Normal);
                assert_eq!(format, OutputFormat::Text);
                assert_eq!(jobs, 4);
                assert_eq!(selection.to_selection(), Selection::default());
                Ok(())
            }
            _ => bail!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_comma_separated_filters() -> Result<()> {
        let args = Cli::parse_from([
            "cvcheck",
            "check",
            "a.json",
            "--skip",
            "drs_path,tas_nan",
            "--criteria",
            "strict",
            "--format",
            "json",
        ]);
        match args.command {
            Commands::Check {
                selection,
                criteria,
                format,
                ..
            } => {
                assert_eq!(selection.skip, vec!["drs_path", "tas_nan"]);
                assert!(selection.include.is_empty());
                assert_eq!(criteria, Criteria::Strict);
                assert_eq!(format, OutputFormat::Json);
                Ok(())
            }
            _ => bail!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_list() -> Result<()> {
        let args = Cli::parse_from(["cvcheck", "list", "--config", "rules/", "--include", "dim_time"]);
        match args.command {
            Commands::List { config, selection } => {
                assert_eq!(config.to_string_lossy(), "rules/");
                assert_eq!(selection.include, vec!["dim_time"]);
                Ok(())
            }
            _ => bail!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_criteria() {
        assert!(Cli::try_parse_from(["cvcheck", "check", "a.json", "--criteria", "lax"]).is_err());
    }
}
