// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cellflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cellflow",
    version,
    about = "Reactive notebook runner: re-runs dependent cells when one changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the notebook file (TOML).
    #[arg(long, value_name = "PATH", default_value = "notebook.toml")]
    pub notebook: String,

    /// Cell to run together with its dependents. May be repeated.
    ///
    /// Default: every cell, in dependency order.
    #[arg(long = "run", value_name = "ID")]
    pub run: Vec<String>,

    /// Keep running and re-run changed cells when the notebook file changes.
    #[arg(long)]
    pub watch: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CELLFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print cells, edges and run order, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_run_flags_accumulate() {
        let args = CliArgs::try_parse_from([
            "cellflow", "--notebook", "nb.toml", "--run", "a", "--run", "b", "--watch",
        ])
        .unwrap();
        assert_eq!(args.notebook, "nb.toml");
        assert_eq!(args.run, vec!["a", "b"]);
        assert!(args.watch);
        assert!(!args.dry_run);
    }
}
