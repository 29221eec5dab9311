//! Domain model for directory, obligation and notification records.
//!
//! # Responsibility
//! - Define canonical data structures used by the scheduling engine.
//! - Own the stable text encodings used for persisted enums.
//!
//! # Invariants
//! - Every stored record is identified by a stable UUID.
//! - The scheduler only moves obligation status `pending -> overdue`;
//!   `completed` is written by whoever closes the obligation.

pub mod directory;
pub mod notification;
pub mod obligation;
