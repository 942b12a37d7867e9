//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "haptics", version, about = "Haptic device control CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and print results as JSON instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Force effect selectable from the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EffectKind {
    None,
    Wall,
    Sphere,
    Tracking,
}

impl EffectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Wall => "wall",
            Self::Sphere => "sphere",
            Self::Tracking => "tracking",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the application haptic loop with a force effect
    Run {
        /// Effect to render; overrides [effect] in the config
        #[arg(long, value_enum, value_name = "EFFECT")]
        effect: Option<EffectKind>,
        /// Stop after this many milliseconds (0 = until Ctrl-C); overrides runner.duration_ms
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Start the device, synchronize once and print its state
    Probe,
    /// Start and stop the device once
    SelfCheck,
}
