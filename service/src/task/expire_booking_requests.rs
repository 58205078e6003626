//! [`ExpireBookingRequests`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Select, Start},
    Date,
};
use derive_more::{Display, Error as StdError, From};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{self, ExpireBookingRequest},
    domain::{booking_request, BookingRequest},
    infra::{database, Database},
    read, Command, Service,
};

use super::Task;

/// Configuration for [`ExpireBookingRequests`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between sweeps of pending [`BookingRequest`]s.
    #[default(time::Duration::from_secs(60))]
    pub interval: time::Duration,

    /// Time after which an unanswered [`BookingRequest`] expires.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    pub ttl: time::Duration,
}

/// [`Task`] for expiring pending [`BookingRequest`]s, whose check-in has
/// passed or which were left without an answer for too long.
#[derive(Clone, Copy, Debug)]
pub struct ExpireBookingRequests<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<ExpireBookingRequests<Self>, Config>>> for Service<Db>
where
    ExpireBookingRequests<Service<Db>>:
        Task<Perform<()>, Ok = usize, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireBookingRequests<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireBookingRequests {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("{n} `BookingRequest`s expired"),
                Err(e) => {
                    log::error!("`task::ExpireBookingRequests` failed: {e}");
                }
            }
        }
    }
}

impl<Db> Task<Perform<()>> for ExpireBookingRequests<Service<Db>>
where
    Db: Database<
        Select<By<Vec<booking_request::Id>, read::booking_request::Expirable>>,
        Ok = Vec<booking_request::Id>,
        Err = Traced<database::Error>,
    >,
    Service<Db>: Command<
        ExpireBookingRequest,
        Ok = Option<BookingRequest>,
        Err = Traced<command::expire_booking_request::ExecutionError>,
    >,
{
    type Ok = usize;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        // TTL reaching beyond the supported range means no request is stale.
        let deadline = booking_request::CreationDateTime::now()
            .checked_sub(self.config.ttl);
        let ids = self
            .service
            .database()
            .execute(Select(By::<Vec<booking_request::Id>, _>::new(
                read::booking_request::Expirable {
                    today: Date::today(),
                    created_before: deadline,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;

        let mut expired = 0;
        for request_id in ids {
            // A single broken request must not stall the whole sweep.
            match self
                .service
                .execute(ExpireBookingRequest { request_id })
                .await
            {
                Ok(Some(_)) => expired += 1,
                Ok(None) => {}
                Err(e) => log::warn!(
                    "failed to expire `BookingRequest(id: {request_id})`: {e}",
                ),
            }
        }
        Ok(expired)
    }
}

/// Error of [`ExpireBookingRequests`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}
