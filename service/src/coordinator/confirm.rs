//! [`Coordinator`] operation confirming a [`BookingRequest`] into a
//! [`Booking`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{self, Approval, Pricing},
        booking_request,
        calendar::{Blocks, Conflict, Day, Stay},
        listing, Booking, BookingRequest, Calendar, Listing,
    },
    infra::{database, Database},
    Notification, Service,
};

use super::Coordinator;

/// [`Coordinator`] operation confirming a [`BookingRequest`] into an
/// accepted [`Booking`].
#[derive(Clone, Copy, Debug)]
pub struct Confirm {
    /// ID of the [`BookingRequest`] to be confirmed.
    pub request_id: booking_request::Id,

    /// [`Pricing`] of the created [`Booking`].
    pub pricing: Pricing,

    /// Treatment of the nights blocked by the [`Listing`] owner.
    pub blocks: Blocks,
}

impl<Db> Coordinator<Confirm> for Service<Db>
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
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Day>, (listing::Id, Stay)>>,
            Ok = Vec<Day>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Update<Calendar>, Err = Traced<database::Error>>
        + Database<Update<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, op: Confirm) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Confirm {
            request_id,
            pricing,
            blocks,
        } = op;

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

        let mut request = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        if request.alteration_of.is_some() {
            return Err(tracerr::new!(E::RequestIsAlteration(request_id)));
        }
        request
            .accept()
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, request.stay))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut calendar = Calendar::new(&listing, request.stay, days);

        let total_price = match pricing {
            Pricing::Quoted => request.total_price,
            Pricing::Current => calendar
                .total_price(request.stay)
                .ok_or(E::PriceMismatch(listing_id))
                .map_err(tracerr::wrap!())?,
        };
        let booking = Booking::new(
            listing_id,
            request.guest_id,
            request.stay,
            total_price,
            Some(request.id),
            Approval::Instant,
        );
        calendar
            .reserve(request.stay, booking.id, blocks)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(calendar))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(request))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`BookingRequest(id: {request_id})` confirmed as \
             `Booking(id: {})` for {}",
            booking.id,
            booking.stay,
        );
        self.notify(Notification::RequestAccepted {
            request_id,
            booking_id: booking.id,
        });

        Ok(booking)
    }
}

/// Error of [`Confirm`] [`Coordinator`] operation execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Some of the requested nights are not available.
    #[display("Nights are not available: {_0}")]
    #[from]
    Conflict(Conflict),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`BookingRequest`] is not pending.
    #[display("Cannot confirm `BookingRequest`: {_0}")]
    #[from]
    InvalidTransition(booking_request::InvalidTransition),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Night prices of the [`Listing`] cannot be summed up.
    #[display("`Listing(id: {_0})` has nights priced in different currencies")]
    PriceMismatch(#[error(not(source))] listing::Id),

    /// [`BookingRequest`] is an alteration, which is superseded instead.
    #[display("`BookingRequest(id: {_0})` is an alteration")]
    RequestIsAlteration(#[error(not(source))] booking_request::Id),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}
