//! Pure scheduling rules: due-date derivation and reminder tiering.
//!
//! Nothing in this module reads the clock or the store; callers pass `today`.

pub mod derivation;
pub mod reminder;
