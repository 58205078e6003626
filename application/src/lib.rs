//! Application runs the reservation [`Service`] as a daemon.

#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod args;
pub mod config;

use tokio::sync::broadcast;
use tracing as log;
// Used in binary.
use futures as _;
use refinery as _;
use tracing_subscriber as _;

pub use self::{args::Args, config::Config};

/// [`Service`] with filled infrastructure dependencies.
///
/// [`Service`]: service::Service
pub type Service = service::Service<service::infra::Postgres>;

/// Logs every [`Notification`] received from the provided subscription,
/// until the [`Service`] is dropped.
///
/// [`Notification`]: service::Notification
pub async fn log_notifications(
    mut notifications: broadcast::Receiver<service::Notification>,
) {
    loop {
        match notifications.recv().await {
            Ok(n) => log::info!("{n:?}"),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log::warn!("{missed} notifications missed");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
