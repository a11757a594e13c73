//! carrier-vet: carrier vetting client with cross-context auth sync.
//!
//! - [`sync`]: page watcher → runtime bus → background relay
//! - [`auth`]: the shared auth store every context reads
//! - [`ui`]: UI roots and their login gates
//! - [`vetting`]: DOT lookups against the vetting backend
//! - [`config`]: `config.toml` loading

pub mod auth;
pub mod config;
pub mod sync;
pub mod ui;
pub mod vetting;
