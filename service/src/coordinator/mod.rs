//! [`Coordinator`] definition.
//!
//! Every mutation touching the occupancy of [`Listing`] nights goes through
//! a [`Coordinator`] operation: it runs in a single transaction under the
//! lock of the [`Listing`], so either all of its changes are committed, or
//! none of them.
//!
//! [`Listing`]: crate::domain::Listing

pub mod cancel;
pub mod confirm;
pub mod supersede;

/// Consistency coordinator of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Coordinator;

pub use self::{cancel::Cancel, confirm::Confirm, supersede::Supersede};
