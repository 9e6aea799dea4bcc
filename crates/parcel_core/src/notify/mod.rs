//! Per-package change notification.
//!
//! # Responsibility
//! - Fan out post-mutation package snapshots to live listeners.
//!
//! # Invariants
//! - Delivery is at-most-once and never replayed to late subscribers.
//! - Publishing never blocks or fails the mutation that triggered it.

mod hub;

pub use hub::{ChangeNotifier, Subscription};
