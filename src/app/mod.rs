//! Application layer — configuration and the orchestrator that wires the
//! `core` components into a running process.

pub mod config;
mod orchestrator;

pub use config::Config;
pub use orchestrator::{App, StatusReport};
