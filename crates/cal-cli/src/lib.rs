//! Calorie logger CLI library.
//!
//! This crate provides the `cal` command: one-shot search and lookup, and an
//! interactive logging session backed by simulated camera devices.

mod cli;
pub mod commands;
mod config;
pub mod devices;
pub mod render;

pub use cli::{Cli, Commands};
pub use config::{CameraConfig, Config};
