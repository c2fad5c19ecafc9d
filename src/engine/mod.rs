//! Core engine: command runner, outcome mapping and the orchestrator that
//! ties them to the platform.

pub mod orchestrator;
pub mod outcome;
pub mod runner;
