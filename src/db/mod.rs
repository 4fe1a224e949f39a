//! Local persistence (session key-value store).

pub mod session_store;

pub use session_store::SessionStore;

/// Store keys as constants.
pub mod keys {
    /// Logged-in racer record
    pub const RACER: &str = "racer";
}
