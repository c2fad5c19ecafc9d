//! Integration tests for will-it-blend.

mod cli;
mod lifecycle;
