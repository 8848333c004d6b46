//! Bootstrap and update-processing core for the bot.
//!
//! Framework-agnostic: Telegram and the completion backend live behind ports
//! (traits) implemented in adapter crates.

pub mod backstop;
pub mod config;
pub mod container;
pub mod controller;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod ports;
pub mod router;
pub mod services;

pub use errors::{Error, Result};
