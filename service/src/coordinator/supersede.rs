//! [`Coordinator`] operation superseding an accepted [`Booking`] with its
//! alteration.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{self, Approval},
        booking_request,
        calendar::{Blocks, Conflict, Day, Stay},
        listing, Booking, BookingRequest, Calendar, Listing,
    },
    infra::{database, Database},
    Notification, Service,
};

use super::Coordinator;

/// [`Coordinator`] operation accepting an alteration [`BookingRequest`]: the
/// [`Booking`] of the altered [`BookingRequest`] is replaced by a new one
/// holding the altered nights.
#[derive(Clone, Copy, Debug)]
pub struct Supersede {
    /// ID of the alteration [`BookingRequest`] to be accepted.
    pub request_id: booking_request::Id,
}

impl<Db> Coordinator<Supersede> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<BookingRequest>, booking_request::Id>>,
            Ok = Option<BookingRequest>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking_request::Id>>,
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
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Update<Calendar>, Err = Traced<database::Error>>
        + Database<Update<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, op: Supersede) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Supersede { request_id } = op;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let listing_id = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?
            .listing_id;

        // Serialize occupancy changes of the same `Listing`.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut alteration = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        let original_id = alteration
            .alteration_of
            .ok_or(E::RequestNotAlteration(request_id))
            .map_err(tracerr::wrap!())?;
        alteration
            .accept()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let mut original = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(original_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(original_id))
            .map_err(tracerr::wrap!())?;
        original
            .alter()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(original_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(Booking::is_active)
            .ok_or(E::RequestNotBooked(original_id))
            .map_err(tracerr::wrap!())?;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        let range = booking.stay.span(&alteration.stay);
        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, range))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut calendar = Calendar::new(&listing, range, days);

        let released = calendar.release(booking.stay, booking.id);
        let replacement = Booking::new(
            listing_id,
            alteration.guest_id,
            alteration.stay,
            alteration.total_price,
            Some(alteration.id),
            Approval::Instant,
        );
        calendar
            .reserve(alteration.stay, replacement.id, Blocks::Respect)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;
        booking
            .cancel()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        tx.execute(Insert(replacement.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(calendar))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(alteration))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(original))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Booking(id: {})` superseded by `Booking(id: {})`: \
             {released} nights released, {} reserved",
            booking.id,
            replacement.id,
            replacement.stay,
        );
        self.notify(Notification::AlterationAccepted {
            request_id,
            original_id,
            booking_id: replacement.id,
        });

        Ok(replacement)
    }
}

/// Error of [`Supersede`] [`Coordinator`] operation execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Original [`Booking`] cannot be cancelled.
    #[display("Cannot cancel the original `Booking`: {_0}")]
    #[from]
    Cancellation(booking::CancellationError),

    /// Some of the altered nights are not available.
    #[display("Nights are not available: {_0}")]
    #[from]
    Conflict(Conflict),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Alteration is not pending, or the original is not accepted.
    #[display("Cannot supersede `BookingRequest`: {_0}")]
    #[from]
    InvalidTransition(booking_request::InvalidTransition),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`BookingRequest`] doesn't alter any other one.
    #[display("`BookingRequest(id: {_0})` is not an alteration")]
    RequestNotAlteration(#[error(not(source))] booking_request::Id),

    /// Altered [`BookingRequest`] has no accepted [`Booking`].
    #[display("`BookingRequest(id: {_0})` has no accepted `Booking`")]
    RequestNotBooked(#[error(not(source))] booking_request::Id),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}
