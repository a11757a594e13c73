//! UI roots and the login gate each of them runs.
//!
//! Roots (the popup, an injected panel, ...) are independent: each mounts
//! its own gate against the shared auth store and never coordinates with
//! the others directly.

pub mod gate;
pub mod root;

pub use gate::{AuthGate, GateHandle, GateState};
pub use root::{UiRoot, View};
