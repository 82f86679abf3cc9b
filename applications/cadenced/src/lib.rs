//! Cadence daemon library
//!
//! Headless player around the Cadence playback session: layered
//! configuration, a line-oriented command console and log-backed
//! media-session, notification and host surfaces.
//!
//! This library exposes the daemon's components for testing purposes.

pub mod config;
pub mod console;
pub mod error;
pub mod sinks;

pub use config::DaemonConfig;
pub use console::{format_status, parse_line, ConsoleInput};
pub use error::{DaemonError, Result};
pub use sinks::{LogHostService, LogMediaSession, LogNotification};
