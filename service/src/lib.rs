//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
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

pub mod command;
pub mod coordinator;
pub mod domain;
pub mod infra;
mod notification;
pub mod query;
pub mod read;
pub mod task;
#[cfg(test)]
mod testing;

use std::error::Error;

use common::operations::{By, Start};
use derive_more::Debug;
use smart_default::SmartDefault;
use tokio::sync::broadcast;
use tracing as log;

#[cfg(doc)]
use infra::Database;

pub use self::{
    command::Command, coordinator::Coordinator, notification::Notification,
    query::Query, task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// [`task::ExpireBookingRequests`] configuration.
    pub expire_booking_requests: task::expire_booking_requests::Config,

    /// Number of [`Notification`]s a lagging subscriber may miss before
    /// losing the oldest ones.
    #[default(64)]
    pub notification_capacity: usize,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// Sender of the [`Notification`]s about committed changes.
    #[debug(skip)]
    notifications: broadcast::Sender<Notification>,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::ExpireBookingRequests<Self>,
                        task::expire_booking_requests::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let (notifications, _) =
            broadcast::channel(config.notification_capacity.max(1));
        let this = Service {
            config,
            database,
            notifications,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("ExpireBookingRequests", async move {
            svc.execute(Start(By::new(svc.config().expire_booking_requests)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Subscribes to the [`Notification`]s of this [`Service`].
    ///
    /// Only [`Notification`]s sent after subscribing are received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Broadcasts the provided [`Notification`] to the current subscribers,
    /// if any.
    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            log::trace!("no subscribers for {notification:?}");
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{domain::booking_request, testing, Notification};

    #[tokio::test]
    async fn notifies_subscribers_after_commit() {
        let (svc, bg) = testing::service();
        assert_eq!(bg.len(), 1);
        let mut notifications = svc.subscribe();

        let listing = testing::listing(&svc, "100USD").await;
        let (request, booking) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-03").await;

        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::RequestSubmitted {
                request_id: request.id,
                listing_id: listing.id,
            },
        );
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::RequestAccepted {
                request_id: request.id,
                booking_id: booking.id,
            },
        );
        assert!(notifications.try_recv().is_err());
        assert_eq!(request.status, booking_request::Status::Accepted);
    }
}
