//! Trigon triangle presenter.
//!
//! Opens an 800x600 window and draws one triangle every frame, rebuilding
//! the swapchain whenever the window is resized and pausing while it is
//! minimized.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p trigon-triangle
//! ```
//!
//! Compiled shaders are read from `shaders/vert.spv` and `shaders/frag.spv`
//! relative to the working directory unless overridden.

use std::process::ExitCode;

use trigon_app::{run_app, AppConfig};

fn main() -> ExitCode {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return ExitCode::SUCCESS;
    }

    match run_app(AppConfig::default().with_env_overrides()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", one_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The error and its causes on a single line.
fn one_line(error: &anyhow::Error) -> String {
    format!("{error:#}").replace('\n', " ")
}

fn print_help() {
    eprintln!(
        "Trigon triangle presenter

USAGE:
    cargo run -p trigon-triangle

CONTROLS:
    Escape                  Quit
    Close button            Quit

OTHER:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)
    TRIGON_VERTEX_SHADER    Vertex shader SPIR-V (default: shaders/vert.spv)
    TRIGON_FRAGMENT_SHADER  Fragment shader SPIR-V (default: shaders/frag.spv)"
    );
}
