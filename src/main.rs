// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

mod app;
mod cli;
mod config;
mod engine;
mod events;
mod history;
mod state;
mod theme;
mod tui;

use app::App;

use std::env;
use std::fs;
use std::io::stdout;
use std::path::PathBuf;

use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;

use ratatui::{backend::CrosstermBackend, Terminal};

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};

use clap::Parser;

const DEFAULT_LOG_FILTER: LevelFilter = LevelFilter::INFO;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse();
    let settings = config::load_settings();

    let base_data_dir = config::get_app_paths()
        .map(|(_, data_dir)| data_dir)
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let log_dir = base_data_dir.join("logs");
    let general_log = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(31)
        .filename_prefix("app")
        .filename_suffix("log")
        .build(&log_dir)
        .expect("Failed to initialize rolling file appender");
    let (non_blocking_general, _guard_general) = tracing_appender::non_blocking(general_log);
    let _subscriber_result = {
        if fs::create_dir_all(&log_dir).is_ok() {
            let level = settings
                .log_filter
                .parse::<LevelFilter>()
                .unwrap_or(DEFAULT_LOG_FILTER);
            let quiet_filter = Targets::new().with_default(level);

            let general_layer = fmt::layer()
                .with_writer(non_blocking_general)
                .with_ansi(false)
                .with_filter(quiet_filter);

            tracing_subscriber::registry()
                .with(general_layer)
                .try_init()
        } else {
            tracing_subscriber::registry().try_init()
        }
    };

    tracing::info!("STARTING DOWNDECK");

    // Output directory is created up front, recursively; per-file
    // subdirectories are the engine's job.
    fs::create_dir_all(&cli.output)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = cleanup_terminal();
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings, cli.transfer, cli.output);
    if let Err(e) = app.run(&mut terminal).await {
        eprintln!("[Error] Application failed: {}", e);
    }

    cleanup_terminal()?;

    Ok(())
}

fn cleanup_terminal() -> Result<(), Box<dyn std::error::Error>> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;

    Ok(())
}
