//! Download task tracking.
//!
//! A task follows one chat request from submission to organized files. The
//! module follows hexagonal architecture:
//!
//! - Domain types and the forward-only status rules in [`domain`]
//! - Port contracts for storage, the download client and chat delivery in
//!   [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services (lifecycle, resolution, reconciliation,
//!   organization, chat intake) in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
