pub mod chunk;
pub mod cli;
pub mod config;
pub mod duration;
pub mod pattern;
pub mod quantity;

pub use chunk::{
    BURST_BUDGET, ChunkFailure, ChunkHandle, ChunkOutcome, Clock, DEFAULT_DELAY, SystemClock,
    TimerLoop, run_chunked,
};
pub use cli::Cli;
pub use config::Config;
pub use duration::{DEFAULT_DURATION_TEMPLATE, compose_duration, compose_duration_with};
pub use pattern::{Pattern, format_pattern, format_pattern_or};
pub use quantity::{SizeKind, format_size};
