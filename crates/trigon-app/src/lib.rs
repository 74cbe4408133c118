//! Application layer for Trigon.
//!
//! Owns the window and event loop and drives the frame scheduler:
//! - Window creation from [`AppConfig`]
//! - GPU context, presenter and frame scheduler initialization
//! - Resize and minimize notifications through the surface event channel
//! - Orderly shutdown on close, Escape or a fatal error
//!
//! # Example
//!
//! ```no_run
//! use trigon_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::default().with_env_overrides())
//! }
//! ```

mod config;
mod context;
mod runner;

pub use config::{AppConfig, FRAGMENT_SHADER_ENV, VERTEX_SHADER_ENV};
pub use context::AppContext;
pub use runner::run_app;

pub use trigon_gpu::{FrameOutcome, GpuError, SkipReason};
