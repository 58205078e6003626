//! [`Command`] for accepting a [`BookingRequest`] by the host.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    coordinator::{self, Confirm, Coordinator},
    domain::{
        booking::Pricing, booking_request, calendar::Blocks, listing, user,
        Booking, BookingRequest, Listing,
    },
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for accepting a pending [`BookingRequest`] by the owner of
/// the requested [`Listing`], turning it into a [`Booking`].
#[derive(Clone, Copy, Debug)]
pub struct AcceptBookingRequest {
    /// ID of the [`BookingRequest`] to be accepted.
    pub request_id: booking_request::Id,

    /// ID of the [`User`] accepting the [`BookingRequest`].
    pub initiator_id: user::Id,

    /// [`Pricing`] of the created [`Booking`].
    pub pricing: Pricing,

    /// Treatment of the nights blocked by the host.
    pub blocks: Blocks,
}

impl<Db> Command<AcceptBookingRequest> for Service<Db>
where
    Db: Database<
            Select<By<Option<BookingRequest>, booking_request::Id>>,
            Ok = Option<BookingRequest>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Self: Coordinator<
        Confirm,
        Ok = Booking,
        Err = Traced<coordinator::confirm::ExecutionError>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AcceptBookingRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AcceptBookingRequest {
            request_id,
            initiator_id,
            pricing,
            blocks,
        } = cmd;

        let request = self
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(request.listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(request.listing_id))
            .map_err(tracerr::wrap!())?;
        if !listing.is_owned_by(initiator_id) {
            return Err(tracerr::new!(E::NotOwner(initiator_id)));
        }

        self.execute(Confirm {
            request_id,
            pricing,
            blocks,
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`AcceptBookingRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Confirm`]ing the [`BookingRequest`] failed.
    #[display("Failed to confirm `BookingRequest`: {_0}")]
    #[from]
    Confirm(coordinator::confirm::ExecutionError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

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
    use common::operations::{By, Commit, Lock, Select, Transact};

    use crate::{
        coordinator,
        domain::{
            booking::Pricing, booking_request, calendar::Blocks, user,
            BookingRequest,
        },
        infra::Database as _,
        testing, Command as _,
    };

    use super::{AcceptBookingRequest, ExecutionError};

    #[tokio::test]
    async fn only_owner_may_accept() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let request =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-03").await;

        let err = svc
            .execute(AcceptBookingRequest {
                request_id: request.id,
                initiator_id: request.guest_id,
                pricing: Pricing::Quoted,
                blocks: Blocks::Respect,
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(matches!(err, ExecutionError::NotOwner(_)), "{err}");

        let booking = svc
            .execute(AcceptBookingRequest {
                request_id: request.id,
                initiator_id: listing.owner_id,
                pricing: Pricing::Quoted,
                blocks: Blocks::Respect,
            })
            .await
            .unwrap();
        assert_eq!(booking.guest_id, request.guest_id);
    }

    #[tokio::test]
    async fn first_acceptance_wins() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let first =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-05").await;
        let second =
            testing::request(&svc, &listing, "2025-03-04", "2025-03-06").await;
        let accept = |request_id| AcceptBookingRequest {
            request_id,
            initiator_id: listing.owner_id,
            pricing: Pricing::Quoted,
            blocks: Blocks::Respect,
        };

        // Both acceptances queue up on the held `Listing` lock.
        let holder = async {
            let tx = svc.database().execute(Transact).await.unwrap();
            tx.execute(Lock(By::new(listing.id))).await.unwrap();
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            tx.execute(Commit).await.unwrap();
        };
        let ((), won, lost) = tokio::join!(
            holder,
            svc.execute(accept(first.id)),
            svc.execute(accept(second.id)),
        );

        _ = won.unwrap();
        let err = lost.unwrap_err().into_inner();
        assert!(
            matches!(
                err,
                ExecutionError::Confirm(
                    coordinator::confirm::ExecutionError::Conflict(_),
                ),
            ),
            "{err}",
        );
        let second = svc
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(second.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.status, booking_request::Status::Pending);
    }

    #[tokio::test]
    async fn fails_on_unknown_request() {
        let (svc, _bg) = testing::service();

        let err = svc
            .execute(AcceptBookingRequest {
                request_id: booking_request::Id::new(),
                initiator_id: user::Id::new(),
                pricing: Pricing::Quoted,
                blocks: Blocks::Respect,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::RequestNotExists(_)), "{err}");
    }
}
