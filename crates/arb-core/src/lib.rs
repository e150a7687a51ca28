//! Core domain + application logic for the anonymous relay bot.
//!
//! This crate is framework-agnostic. Telegram, Redis and SQLite live behind
//! ports (traits) implemented in adapter crates.

pub mod admin;
pub mod audit;
pub mod broadcast;
pub mod callback;
pub mod config;
pub mod deletion;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod kv;
mod limiter;
pub mod logging;
pub mod messaging;
pub mod notices;
pub mod pairing;
pub mod relay;
pub mod security;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
