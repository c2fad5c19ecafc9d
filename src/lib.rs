//! will-it-blend: bet on a command with a Twitch prediction
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod auth;
pub mod config;
pub mod engine;
pub mod platforms;
pub mod types;
