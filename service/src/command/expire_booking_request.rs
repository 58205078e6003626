//! [`Command`] for expiring a [`BookingRequest`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking_request, listing, BookingRequest, Listing},
    infra::{database, Database},
    Notification, Service,
};

use super::Command;

/// [`Command`] for expiring a pending [`BookingRequest`] left without an
/// answer.
///
/// Expiring an already resolved [`BookingRequest`] does nothing and returns
/// [`None`], so concurrent sweeps don't fail each other.
#[derive(Clone, Copy, Debug)]
pub struct ExpireBookingRequest {
    /// ID of the [`BookingRequest`] to be expired.
    pub request_id: booking_request::Id,
}

impl<Db> Command<ExpireBookingRequest> for Service<Db>
where
    Db: Database<
            Select<By<Option<BookingRequest>, booking_request::Id>>,
            Ok = Option<BookingRequest>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<BookingRequest>, booking_request::Id>>,
            Ok = Option<BookingRequest>,
            Err = Traced<database::Error>,
        > + Database<Update<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Option<BookingRequest>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ExpireBookingRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ExpireBookingRequest { request_id } = cmd;

        let listing_id = self
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?
            .listing_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid expiring a request being confirmed right now.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut request = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        if request.status != booking_request::Status::Pending {
            log::debug!(
                "`BookingRequest(id: {request_id})` is {} already, \
                 not expiring",
                request.status,
            );
            return Ok(None);
        }
        request
            .expire()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        tx.execute(Update(request.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!("`BookingRequest(id: {request_id})` expired");
        self.notify(Notification::RequestExpired { request_id });

        Ok(Some(request))
    }
}

/// Error of [`ExpireBookingRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`BookingRequest`] cannot be expired.
    #[display("Cannot expire `BookingRequest`: {_0}")]
    #[from]
    InvalidTransition(booking_request::InvalidTransition),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}

#[cfg(test)]
mod spec {
    use crate::{domain::booking_request, testing, Command as _};

    use super::ExpireBookingRequest;

    #[tokio::test]
    async fn expires_pending_request_once() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let request =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-03").await;
        let cmd = ExpireBookingRequest {
            request_id: request.id,
        };

        let expired = svc.execute(cmd).await.unwrap().unwrap();
        assert_eq!(expired.status, booking_request::Status::Expired);
        assert!(expired.resolved_at.is_some());

        assert!(svc.execute(cmd).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaves_accepted_request_untouched() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (request, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-03").await;

        let res = svc
            .execute(ExpireBookingRequest {
                request_id: request.id,
            })
            .await
            .unwrap();

        assert!(res.is_none());
    }
}
