//! In-memory integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `repository_tests`: Conditional writes, identifier ownership, lookups
//! - `download_flow_tests`: Chat request through completion and organizing

mod in_memory {
    pub mod helpers;

    mod download_flow_tests;
    mod repository_tests;
}
