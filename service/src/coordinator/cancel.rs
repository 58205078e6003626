//! [`Coordinator`] operation cancelling a [`Booking`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking,
        calendar::{Day, Stay},
        listing, Booking, Calendar, Listing,
    },
    infra::{database, Database},
    Notification, Service,
};

use super::Coordinator;

/// [`Coordinator`] operation cancelling an accepted [`Booking`] and
/// releasing its nights.
#[derive(Clone, Copy, Debug)]
pub struct Cancel {
    /// ID of the [`Booking`] to be cancelled.
    pub booking_id: booking::Id,
}

impl<Db> Coordinator<Cancel> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Day>, (listing::Id, Stay)>>,
            Ok = Vec<Day>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Update<Calendar>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, op: Cancel) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Cancel { booking_id } = op;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let listing_id = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?
            .listing_id;

        // Serialize occupancy changes of the same `Listing`.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        booking
            .cancel()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, booking.stay))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut calendar = Calendar::new(&listing, booking.stay, days);
        let released = calendar.release(booking.stay, booking.id);

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(calendar))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Booking(id: {booking_id})` cancelled, {released} nights released",
        );
        self.notify(Notification::BookingCancelled { booking_id });

        Ok(booking)
    }
}

/// Error of [`Cancel`] [`Coordinator`] operation execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] cannot be cancelled.
    #[display("Cannot cancel `Booking`: {_0}")]
    #[from]
    Cancellation(booking::CancellationError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        domain::{booking, calendar::Day},
        infra::Database as _,
        testing::{self, stay},
        Coordinator as _,
    };

    use super::{Cancel, ExecutionError};

    #[tokio::test]
    async fn releases_nights_of_booking() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (_, booking) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let (_, neighbour) =
            testing::booked(&svc, &listing, "2025-03-04", "2025-03-06").await;

        let cancelled = svc
            .execute(Cancel {
                booking_id: booking.id,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, booking::Status::Cancelled);

        let days = svc
            .database()
            .execute(Select(By::<Vec<Day>, _>::new((
                listing.id,
                stay("2025-03-01", "2025-03-06"),
            ))))
            .await
            .unwrap();
        assert_eq!(days.len(), 5);
        for day in &days[..3] {
            assert!(day.is_available, "{}", day.date);
            assert_eq!(day.booking_id, None, "{}", day.date);
        }
        for day in &days[3..] {
            assert_eq!(day.booking_id, Some(neighbour.id), "{}", day.date);
        }

        // Released nights may be requested again.
        _ = testing::booked(&svc, &listing, "2025-03-02", "2025-03-04").await;
    }

    #[tokio::test]
    async fn is_not_idempotent() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (_, booking) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let op = Cancel {
            booking_id: booking.id,
        };

        _ = svc.execute(op).await.unwrap();
        let err = svc.execute(op).await.unwrap_err().into_inner();

        assert!(
            matches!(
                err,
                ExecutionError::Cancellation(
                    booking::CancellationError::AlreadyTerminated(
                        booking::Status::Cancelled,
                    ),
                ),
            ),
            "{err}",
        );
    }

    #[tokio::test]
    async fn fails_on_unknown_booking() {
        let (svc, _bg) = testing::service();

        let err = svc
            .execute(Cancel {
                booking_id: booking::Id::new(),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::BookingNotExists(_)), "{err}");
    }
}
