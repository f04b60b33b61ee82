//! Leader Election Module
//!
//! Elects at most one holder per named role, cluster-wide, with a
//! check-lock-check sequence against the role's authority node.
//!
//! ## Components
//! - **`LockTable`**: Named locks hosted by an authority. Waiting has no timeout.
//! - **`LeaderSlots`**: Replicated write-once slots (`leader`), one per role.
//! - **`LeaderElector`**: Routes lock and slot operations to the authority,
//!   in-process or over the internal RPC.
//!
//! A slot is never cleared: a holder that leaves keeps the role.

pub mod elector;
pub mod handlers;
pub mod lock;
pub mod protocol;
pub mod slots;

#[cfg(test)]
mod tests;
