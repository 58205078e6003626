//! [`Command`] for rejecting a [`BookingRequest`] by the host.

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking_request, listing, user, BookingRequest, Listing},
    infra::{database, Database},
    Notification, Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for rejecting a pending [`BookingRequest`] by the owner of
/// the requested [`Listing`].
#[derive(Clone, Copy, Debug)]
pub struct RejectBookingRequest {
    /// ID of the [`BookingRequest`] to be rejected.
    pub request_id: booking_request::Id,

    /// ID of the [`User`] rejecting the [`BookingRequest`].
    pub initiator_id: user::Id,
}

impl<Db> Command<RejectBookingRequest> for Service<Db>
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
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<Update<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = BookingRequest;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectBookingRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectBookingRequest {
            request_id,
            initiator_id,
        } = cmd;

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

        // Avoid racing with the confirmation of the same request.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        if !listing.is_owned_by(initiator_id) {
            return Err(tracerr::new!(E::NotOwner(initiator_id)));
        }

        let mut request = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        request
            .reject()
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

        log::debug!("`BookingRequest(id: {request_id})` rejected");
        self.notify(Notification::RequestRejected { request_id });

        Ok(request)
    }
}

/// Error of [`RejectBookingRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`BookingRequest`] is not pending.
    #[display("Cannot reject `BookingRequest`: {_0}")]
    #[from]
    InvalidTransition(booking_request::InvalidTransition),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`User`] doesn't own the [`Listing`].
    #[display("`User(id: {_0})` is not the `Listing` owner")]
    NotOwner(#[error(not(source))] user::Id),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::AcceptBookingRequest,
        domain::{booking::Pricing, booking_request, calendar::Blocks},
        testing, Command as _,
    };

    use super::{ExecutionError, RejectBookingRequest};

    #[tokio::test]
    async fn rejects_pending_request_once() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let request =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-03").await;
        let cmd = RejectBookingRequest {
            request_id: request.id,
            initiator_id: listing.owner_id,
        };

        let rejected = svc.execute(cmd).await.unwrap();
        assert_eq!(rejected.status, booking_request::Status::Rejected);
        assert!(rejected.resolved_at.is_some());

        let err = svc.execute(cmd).await.unwrap_err().into_inner();
        assert!(
            matches!(err, ExecutionError::InvalidTransition(_)),
            "{err}",
        );

        // Rejected request cannot be accepted anymore.
        assert!(svc
            .execute(AcceptBookingRequest {
                request_id: request.id,
                initiator_id: listing.owner_id,
                pricing: Pricing::Quoted,
                blocks: Blocks::Respect,
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn only_owner_may_reject() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let request =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-03").await;

        let err = svc
            .execute(RejectBookingRequest {
                request_id: request.id,
                initiator_id: request.guest_id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::NotOwner(_)), "{err}");
    }
}
