//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use observability::LogFormat;
use std::path::PathBuf;

/// handsynth - play notes with your hand, track your face
#[derive(Parser, Debug)]
#[command(
    name = "handsynth",
    author,
    version,
    about = "Dual-camera hand/face landmark to MIDI pipeline",
    long_about = "Captures a hand camera and a face camera, runs landmark models on \n\
                  dedicated worker threads, turns the playing hand into MIDI notes \n\
                  and records the session (CSV logs, orientation plot, trajectory \n\
                  animation, annotated videos)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "HANDSYNTH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (json, pretty, compact)
    #[arg(long, default_value = "pretty", global = true, env = "HANDSYNTH_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default level for the log filter (RUST_LOG still wins)
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "handsynth.toml", env = "HANDSYNTH_CONFIG")]
    pub config: PathBuf,

    /// Override the session output directory
    #[arg(short, long, env = "HANDSYNTH_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of ticks to run (0 = unlimited)
    #[arg(long, default_value = "0", env = "HANDSYNTH_MAX_FRAMES")]
    pub max_frames: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "HANDSYNTH_TIMEOUT")]
    pub timeout: f64,

    /// Override the MIDI output port name
    #[arg(long, env = "HANDSYNTH_MIDI_PORT")]
    pub midi_port: Option<String>,

    /// Continue without sound when no MIDI output is available
    #[arg(long)]
    pub allow_silent: bool,

    /// Do not write the annotated session videos
    #[arg(long)]
    pub no_video: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "HANDSYNTH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "handsynth.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "handsynth.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show pipeline, gesture and recorder settings
    #[arg(long)]
    pub details: bool,

    /// List the MIDI outputs currently available
    #[arg(long)]
    pub ports: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["handsynth", "run"]);
        let Commands::Run(ref args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("handsynth.toml"));
        assert_eq!(args.max_frames, 0);
        assert_eq!(args.metrics_port, 0);
        assert!(!args.dry_run);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_overrides_and_verbosity() {
        let cli = Cli::parse_from([
            "handsynth",
            "-vv",
            "--log-format",
            "json",
            "run",
            "--max-frames",
            "100",
            "--midi-port",
            "IAC Bus 1",
            "--timeout",
            "2.5",
        ]);
        assert_eq!(cli.log_level(), "trace");
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_frames, 100);
        assert_eq!(args.midi_port.as_deref(), Some("IAC Bus 1"));
        assert_eq!(args.timeout, 2.5);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["handsynth", "-q", "-v", "validate"]).is_err());
        let cli = Cli::parse_from(["handsynth", "-q", "validate", "--json"]);
        assert_eq!(cli.log_level(), "warn");
    }
}
