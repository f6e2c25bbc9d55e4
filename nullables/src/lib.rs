//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator (clock, ledger, content store, persistence store,
//! notification bus) has a test-friendly implementation here that:
//! - returns deterministic values,
//! - can be scripted to fail with chosen error classes,
//! - never touches the filesystem or network.
//!
//! Usage: swap real gateways for nullables in tests, then assert on the
//! recorded calls.

pub mod bus;
pub mod clock;
pub mod content;
pub mod ledger;
pub mod rails;
pub mod store;

pub use bus::NullBus;
pub use clock::NullClock;
pub use content::NullContentStore;
pub use ledger::NullLedger;
pub use rails::NullRails;
pub use store::NullProjectStore;
