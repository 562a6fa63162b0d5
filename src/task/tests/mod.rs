//! Unit tests for the task domain and services.

mod status_mapping_tests;
mod support;
