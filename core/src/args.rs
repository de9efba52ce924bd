use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "demand-sweep")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Directory holding train.csv, val.csv and test.csv.
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory trained models and their configurations are written to.
    #[arg(long, global = true, default_value = "models")]
    pub models_dir: PathBuf,

    /// Clip each gradient to a norm of 1 before applying it.
    #[arg(long, global = true)]
    pub clip_norm: bool,

    /// Seed for row sampling and batch shuffling.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Log debug output to the terminal.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write debug logs to a file.
    #[arg(short, long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the size of the configuration grid.
    Grid {
        /// Print every valid row as well.
        #[arg(long)]
        show: bool,
    },
    /// Train the hand-picked reference configuration.
    Baseline,
    /// Train randomly selected rows of the grid.
    Sweep {
        /// Number of rows to train.
        #[arg(long, default_value_t = 1)]
        runs: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["demand-sweep", "sweep"]).unwrap();
        assert_eq!(args.data_dir, PathBuf::from("."));
        assert_eq!(args.models_dir, PathBuf::from("models"));
        assert!(!args.clip_norm);
        assert_eq!(args.seed, None);
        assert_eq!(args.command, Command::Sweep { runs: 1 });
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "demand-sweep",
            "sweep",
            "--runs",
            "5",
            "--seed",
            "7",
            "--clip-norm",
            "--data-dir",
            "data",
        ])
        .unwrap();
        assert_eq!(args.command, Command::Sweep { runs: 5 });
        assert_eq!(args.seed, Some(7));
        assert!(args.clip_norm);
        assert_eq!(args.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_grid_show() {
        let args = Args::try_parse_from(["demand-sweep", "grid", "--show"]).unwrap();
        assert_eq!(args.command, Command::Grid { show: true });
    }

    #[test]
    fn test_missing_command_rejected() {
        assert!(Args::try_parse_from(["demand-sweep"]).is_err());
    }
}
