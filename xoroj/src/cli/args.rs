//! CLI argument definitions
//!
//! All Clap derive structs for `xoroj` command-line parsing.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use xoroj_core::{ContestId, parse_instant};

// ============================================================================
// Root CLI
// ============================================================================

/// Contest phase tracking for `XorOJ`.
#[derive(Parser, Debug)]
#[command(name = "xoroj", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "XOROJ_COLOR")]
    pub color: ColorChoice,

    /// Expose Prometheus metrics on this port.
    #[arg(long, global = true, env = "XOROJ_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute phase, action gate and countdown for a contest window.
    Phase(PhaseArgs),

    /// Follow a contest and report every phase change.
    Watch(WatchArgs),

    /// Register the configured user for a contest.
    Register(RegisterArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version and build information.
    Version(VersionArgs),
}

/// Arguments for `xoroj phase`.
#[derive(Args, Debug)]
pub struct PhaseArgs {
    /// Contest start (RFC 3339, or zone-less UTC).
    #[arg(long, value_parser = parse_instant_arg)]
    pub start: DateTime<Utc>,

    /// Contest end (RFC 3339, or zone-less UTC).
    #[arg(long, value_parser = parse_instant_arg)]
    pub end: DateTime<Utc>,

    /// Evaluate at this instant instead of now.
    #[arg(long, value_parser = parse_instant_arg)]
    pub at: Option<DateTime<Utc>>,

    /// Treat the viewer as registered.
    #[arg(long)]
    pub registered: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `xoroj watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Contest to follow.
    pub contest_id: ContestId,

    /// Path to client configuration file.
    #[arg(short, long, env = "XOROJ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSONL controller events to this file (`-` for stdout).
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Follow server time from the standings snapshot instead of the
    /// local clock.
    #[arg(long)]
    pub server_clock: bool,
}

/// Arguments for `xoroj register`.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Contest to register for.
    pub contest_id: ContestId,

    /// Path to client configuration file.
    #[arg(short, long, env = "XOROJ_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Human,
    /// JSON.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash.
    Bash,
    /// Zsh.
    Zsh,
    /// Fish.
    Fish,
    /// `PowerShell`.
    PowerShell,
    /// Elvish.
    Elvish,
}

fn parse_instant_arg(s: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(s).map_err(|e| format!("expected RFC 3339 timestamp: {e}"))
}
