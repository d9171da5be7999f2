use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chunkfmt")]
#[command(about = "Formats byte counts, transfer speeds and durations for display")]
pub struct Cli {
    /// Values to format; reads lines from stdin when omitted
    pub values: Vec<String>,

    /// Treat values as transfer speeds (appends /s to the unit)
    #[arg(short, long)]
    pub speed: bool,

    /// Treat values as durations in milliseconds
    #[arg(short, long, conflicts_with = "speed")]
    pub duration: bool,

    /// Format values through a raw pattern instead of a size unit
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Render zero byte counts as an empty string
    #[arg(short, long)]
    pub zero_empty: bool,

    /// Inter-burst delay in milliseconds for batch formatting
    #[arg(long)]
    pub delay: Option<u64>,

    /// Path to an optional TOML config file
    #[arg(short, long, default_value = "chunkfmt.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
