// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Notegraph: an interactive canvas for a dependency graph of notes
//!
//! The canvas core ([`engine::EngineState`]) keeps a flat scene cache in
//! sync with a [`model::NoteModel`], draws it through a
//! [`render::RasterBackend`] with per-family batches that are rebuilt only
//! when their epochs change, and turns pointer input into previews and
//! [`interaction::CommitEvent`]s. The application around it is a single
//! Xilem window hosting that canvas.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use winit::dpi::LogicalSize;
use winit::error::EventLoopError;
use xilem::{EventLoopBuilder, WindowView, Xilem, window};

pub mod camera;
pub mod components;
pub mod config;
pub mod data;
pub mod dependency;
pub mod engine;
pub mod geometry;
pub mod interaction;
pub mod model;
pub mod picking;
pub mod render;
pub mod scene;
pub mod settings;
pub mod theme;
mod views;

use data::AppState;

/// Entry point for the Notegraph application
pub fn run(event_loop: EventLoopBuilder) -> Result<(), EventLoopError> {
    // Initialize tracing subscriber (can be controlled via RUST_LOG env var)
    // Filter out noisy wgpu/naga shader compilation logs
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_filter(
            std::env::var("RUST_LOG").ok(),
        )))
        .init();

    let mut initial_state = AppState::new();

    match parse_args(std::env::args().skip(1)) {
        Ok(args) => apply_args(&mut initial_state, &args),
        Err(e) => {
            tracing::error!("{:#}", e);
            tracing::error!("Usage: notegraph [--config <file.toml>] [model.json]");
        }
    }

    let app = Xilem::new(initial_state, app_logic);
    app.run_in(event_loop)?;
    Ok(())
}

/// Log filter: our default, then the user's directives, then the
/// wgpu/naga suppression
fn log_filter(user: Option<String>) -> String {
    let mut directives = vec!["notegraph=info".to_string()];
    directives.extend(user.filter(|s| !s.trim().is_empty()));
    directives.extend(
        ["wgpu=warn", "naga=warn", "wgpu_core=warn", "wgpu_hal=warn"].map(String::from),
    );
    directives.join(",")
}

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    model: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file argument")?;
                parsed.config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {flag}"),
            _ if parsed.model.is_some() => bail!("More than one model path given: {arg}"),
            _ => parsed.model = Some(PathBuf::from(arg)),
        }
    }
    Ok(parsed)
}

fn apply_args(state: &mut AppState, args: &Args) {
    if let Some(path) = &args.config {
        state.load_config(path);
    }
    if let Some(path) = &args.model {
        if path.exists() {
            state.load_model(path);
        } else {
            tracing::error!("Path does not exist: {}", path.display());
        }
    }
}

/// Build the single-window UI
fn app_logic(state: &mut AppState) -> impl Iterator<Item = WindowView<AppState>> + use<> {
    let window_size = LogicalSize::new(1280.0, 800.0);
    let window_view = window(state.main_window_id, "Notegraph", views::editor(state));
    let window_with_options = window_view.with_options(|options| {
        options
            .with_initial_inner_size(window_size)
            .on_close(|state: &mut AppState| state.running = false)
    });

    std::iter::once(window_with_options)
}
