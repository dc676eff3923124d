//! Trace session management.
//!
//! This module provides the session types and the store that owns every
//! trace recording of the process.

use serde::{Deserialize, Serialize};

/// Submodule for session data structures and snapshots.
pub mod session;
/// Submodule for the session store implementation.
pub mod session_manager;

/// Lifecycle of a trace session.
///
/// Variants:
/// - `Created`: registered in memory, capture file not yet initialized.
/// - `Active`: recording events.
/// - `Stopped`: terminal; the file and packets are kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Created,
    Active,
    Stopped,
}
