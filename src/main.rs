use std::cell::Cell;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, debug, error, info, warn};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use chunkfmt::{
    Cli, Clock, Config, SizeKind, SystemClock, TimerLoop, compose_duration_with, format_pattern,
    format_size, run_chunked, DEFAULT_DURATION_TEMPLATE,
};

/// How each input line is rendered.
enum Mode {
    Size { kind: SizeKind, zero_to_empty: bool },
    Duration { template: String },
    Pattern(String),
}

fn render_value(line: &str, mode: &Mode) -> Result<String> {
    let value = line.trim();
    match mode {
        Mode::Size { kind, zero_to_empty } => {
            let bytes: u64 = value
                .parse()
                .with_context(|| format!("Not a byte count: '{value}'"))?;
            Ok(format_size(bytes, *zero_to_empty, *kind))
        }
        Mode::Duration { template } => {
            let ms: u64 = value
                .parse()
                .with_context(|| format!("Not a duration in milliseconds: '{value}'"))?;
            Ok(compose_duration_with(ms, template))
        }
        Mode::Pattern(pattern) => {
            let number: f64 = value
                .parse()
                .with_context(|| format!("Not a number: '{value}'"))?;
            Ok(format_pattern(number, pattern))
        }
    }
}

fn read_stdin_values() -> Result<Vec<String>> {
    info!("Reading values from stdin");
    let mut values = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if !line.trim().is_empty() {
            values.push(line);
        }
    }
    Ok(values)
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    TermLogger::init(
        if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    info!("Starting chunkfmt v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    let mode = if cli.duration {
        Mode::Duration {
            template: config
                .duration_template
                .clone()
                .unwrap_or_else(|| DEFAULT_DURATION_TEMPLATE.to_string()),
        }
    } else if let Some(pattern) = cli.pattern.clone() {
        Mode::Pattern(pattern)
    } else {
        Mode::Size {
            kind: if cli.speed {
                SizeKind::Speed
            } else {
                SizeKind::Plain
            },
            zero_to_empty: cli.zero_empty || config.zero_to_empty.unwrap_or(false),
        }
    };
    let delay = cli.delay.or(config.delay_ms).map(Duration::from_millis);

    let values = if cli.values.is_empty() {
        read_stdin_values()?
    } else {
        cli.values.clone()
    };
    debug!("Formatting {} values", values.len());

    let progress = ProgressBar::new(values.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut timers = TimerLoop::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let finished = Rc::new(Cell::new(false));

    let finished_tx = Rc::clone(&finished);
    let handle = run_chunked(
        &mut timers,
        clock,
        values,
        progress,
        move |progress: &mut ProgressBar, line: &String| {
            let rendered = render_value(line, &mode);
            progress.inc(1);
            progress.println(rendered?);
            Ok(())
        },
        delay,
        move |outcome| {
            outcome.context.finish_and_clear();
            for failure in &outcome.failures {
                error!("Value #{}: {:#}", failure.index + 1, failure.error);
            }
            info!(
                "Formatted {} of {} values",
                outcome.items.len() - outcome.failures.len(),
                outcome.items.len()
            );
            finished_tx.set(true);
        },
    );

    let interrupt = handle.clone();
    ctrlc::set_handler(move || interrupt.cancel())
        .context("Failed to install interrupt handler")?;

    timers.run_until_idle();

    if handle.is_cancelled() && !finished.get() {
        warn!("Interrupted, output is incomplete");
    }

    let elapsed = start_time.elapsed();
    info!("Program completed in {:.2}s", elapsed.as_secs_f64());
    Ok(())
}
