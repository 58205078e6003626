//! [`Command`] for cancelling a [`Booking`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    coordinator::{self, Cancel, Coordinator},
    domain::{booking, listing, user, Booking, Listing},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for cancelling an accepted [`Booking`] by its guest or by the
/// owner of the booked [`Listing`].
#[derive(Clone, Copy, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to be cancelled.
    pub booking_id: booking::Id,

    /// ID of the [`User`] cancelling the [`Booking`].
    pub initiator_id: user::Id,
}

impl<Db> Command<CancelBooking> for Service<Db>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Self: Coordinator<
        Cancel,
        Ok = Booking,
        Err = Traced<coordinator::cancel::ExecutionError>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CancelBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
            booking_id,
            initiator_id,
        } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.guest_id != initiator_id {
            let listing = self
                .database()
                .execute(Select(By::<Option<Listing>, _>::new(
                    booking.listing_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::ListingNotExists(booking.listing_id))
                .map_err(tracerr::wrap!())?;
            if !listing.is_owned_by(initiator_id) {
                return Err(tracerr::new!(E::Forbidden(initiator_id)));
            }
        }

        self.execute(Cancel { booking_id })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Cancel`]ling the [`Booking`] failed.
    #[display("Failed to cancel `Booking`: {_0}")]
    #[from]
    Cancel(coordinator::cancel::ExecutionError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`User`] is neither the guest nor the host.
    #[display("`User(id: {_0})` cannot cancel the `Booking`")]
    Forbidden(#[error(not(source))] user::Id),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{booking, user},
        testing, Command as _,
    };

    use super::{CancelBooking, ExecutionError};

    #[tokio::test]
    async fn guest_or_host_may_cancel() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (_, by_guest) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let (_, by_host) =
            testing::booked(&svc, &listing, "2025-03-04", "2025-03-06").await;

        let err = svc
            .execute(CancelBooking {
                booking_id: by_guest.id,
                initiator_id: user::Id::new(),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(matches!(err, ExecutionError::Forbidden(_)), "{err}");

        let cancelled = svc
            .execute(CancelBooking {
                booking_id: by_guest.id,
                initiator_id: by_guest.guest_id,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, booking::Status::Cancelled);

        let cancelled = svc
            .execute(CancelBooking {
                booking_id: by_host.id,
                initiator_id: listing.owner_id,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, booking::Status::Cancelled);
    }
}
