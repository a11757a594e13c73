//! Cross-context auth synchronization.
//!
//! One-way pipeline:
//!
//! ```text
//! page storage ──poll──▸ PageTokenWatcher ──RuntimeBus──▸ BackgroundRelay ──▸ AuthStore ──▸ UI roots
//! ```
//!
//! - `watcher`: detects token transitions in page storage
//! - `bus`: at-most-once, fire-and-forget message channel
//! - `relay`: mirrors sync messages into the shared store
//! - `protocol`: message types carried on the bus
//! - `coordinator`: spawns and stops the watcher + relay pair

pub mod bus;
pub mod coordinator;
pub mod protocol;
pub mod relay;
pub mod watcher;

pub use bus::{BusError, BusListener, BusSender, RuntimeBus};
pub use coordinator::SyncCoordinator;
pub use protocol::{RuntimeMessage, SyncMessage};
pub use relay::{BackgroundRelay, RelayAction};
pub use watcher::{
    JsonFilePageStorage, LastForwarded, MemoryPageStorage, PageStorage, PageTokenWatcher,
    SyncOutcome,
};
