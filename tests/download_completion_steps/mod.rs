//! Step definitions for download completion scenarios.

pub mod world;

mod given;
mod then;
mod when;
