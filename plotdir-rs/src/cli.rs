//! Command-line argument parsing.
//!
//! Usage:
//!   plotdir [--dry-run] [--port <PATH>] [-f <FILE> | --no-config] [-y]
//!           [--resume-key <C>] [--pause-key <C>] [--poll-ms <MS>]
//!           [--log-file <FILE>] <SCRIPT> [WEBHOOK]
//!
//! Exit status is 0 whenever the run ends in an operator-facing diagnostic:
//! a missing script, `Plotter not connected.`, or a declined home-position
//! check.  It is non-zero only for bad arguments, a plot aborted by a pause
//! with no terminal attached, and I/O failures.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::stream::KeyBindings;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "plotdir", version, about = "Stream a plot script to an EiBotBoard pen plotter")]
pub struct Cli {
    /// Plot script to run.
    pub script: PathBuf,

    /// URL that receives pause and completion notifications.
    pub webhook: Option<String>,

    /// Simulate the plotter instead of opening the serial port.
    #[arg(long)]
    pub dry_run: bool,

    /// Serial device node of the plotter.
    #[arg(long, default_value = "/dev/ttyACM0")]
    pub port: PathBuf,

    /// rc file to load instead of searching the default locations.
    #[arg(short = 'f', long = "config", value_name = "FILE", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Skip rc files.
    #[arg(long)]
    pub no_config: bool,

    /// Skip the home-position prompt and power check.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Key that resumes a paused plot.
    #[arg(long, default_value_t = 'c', value_name = "CHAR")]
    pub resume_key: char,

    /// Key that pauses a running plot.
    #[arg(long, value_name = "CHAR")]
    pub pause_key: Option<char>,

    /// Keyboard poll interval while paused, in milliseconds.
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub poll_ms: u64,

    /// Write logs to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// How to choose the rc file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFile {
    /// Use the first file on [`config::search_paths`](crate::config::search_paths).
    Search,
    /// `--no-config`.
    Skip,
    /// `-f <file>`.
    Explicit(PathBuf),
}

impl Cli {
    pub fn config_file(&self) -> ConfigFile {
        match (&self.config, self.no_config) {
            (_, true) => ConfigFile::Skip,
            (Some(path), false) => ConfigFile::Explicit(path.clone()),
            (None, false) => ConfigFile::Search,
        }
    }

    pub fn key_bindings(&self) -> KeyBindings {
        KeyBindings { resume: self.resume_key, pause: self.pause_key }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
