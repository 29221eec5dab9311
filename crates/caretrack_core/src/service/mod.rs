//! Compliance use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into scheduler-level operations.
//! - Keep the invocation boundary (CLI, HTTP hook) decoupled from storage.

pub mod notification_service;
pub mod run_context;
pub mod scheduler_service;
pub mod scope_service;
pub mod trigger;
