//! Shared value types used by several combat subsystems.
//!
//! - actor: health pool and mana/energy pools

pub mod actor;

pub use actor::*;
