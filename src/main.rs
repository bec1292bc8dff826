use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mv_people_rs::{
    Config, DecisionSession, SixelRenderer, TerminalKeys, YoloPersonDetector,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::parse();
    let target = config.validate().map_err(|e| {
        if e.is_preflight() {
            anyhow::Error::new(e).context("Pre-flight check failed, no files were touched")
        } else {
            e.into()
        }
    })?;

    let image_paths: Vec<_> = target.walker.images().collect();
    if image_paths.is_empty() {
        println!("{}", "No images found in the specified folder.".yellow());
        return Ok(());
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, quitting after the current file...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install the Ctrl+C handler")?;

    let detector = YoloPersonDetector::new(&config.model_path, config.device_id, config.confidence)
        .context("Failed to load the person detection model")?;
    let renderer = SixelRenderer::new(config.sixel_command.clone(), config.max_width);

    println!(
        "{}",
        format!("Found {} images. Starting scan...", image_paths.len())
            .green()
            .bold()
    );

    let progress_bar = ProgressBar::new(image_paths.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("#>-"),
    );

    let summary = DecisionSession::new(
        &detector,
        &renderer,
        TerminalKeys::new(),
        target.resolver,
        io::stdout(),
    )
    .with_progress(progress_bar)
    .with_interrupt(interrupted)
    .run(image_paths)?;

    println!("{summary}");
    Ok(())
}
