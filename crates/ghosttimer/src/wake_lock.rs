//! Screen-stay-awake capability port.
//!
//! Holding the screen awake is best-effort. Whatever happens here only
//! changes a status indicator; it never blocks timing.

use serde::Serialize;

/// Outcome of a wake-lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum WakeLockStatus {
    /// The screen will stay awake.
    Active,
    /// The host has no wake-lock capability.
    Unsupported,
    /// The request was refused or failed.
    Failed(String),
}

impl std::fmt::Display for WakeLockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A capability that can keep the screen awake.
pub trait WakeLock: Send + Sync {
    /// Ask the host to keep the screen on.
    fn request(&self) -> WakeLockStatus;

    /// Let the screen sleep again.
    fn release(&self) {}
}

impl std::fmt::Debug for dyn WakeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WakeLock")
    }
}

/// Wake lock for hosts without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn request(&self) -> WakeLockStatus {
        WakeLockStatus::Unsupported
    }
}
