//! Carrier vetting: the backend client and the panel that drives it.

pub mod client;
pub mod panel;

pub use client::{normalize_dot, DotRequest, VettingClient, VettingError, VettingReport};
pub use panel::{SubmitOutcome, VettingPanel, LOGIN_REQUIRED_ALERT};
