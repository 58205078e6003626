//! [`Command`] for creating a new [`Listing`].

use common::{operations::Insert, Money};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        listing::{self, MaximumGuests, MinimumStay},
        user, Listing,
    },
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::{command::PublishListing, domain::User};

use super::Command;

/// [`Command`] for creating a new unpublished [`Listing`].
///
/// The [`Listing`] doesn't accept booking requests until it's published with
/// a [`PublishListing`] [`Command`].
#[derive(Clone, Copy, Debug)]
pub struct CreateListing {
    /// ID of the [`User`] owning the new [`Listing`].
    pub owner_id: user::Id,

    /// Default price of a single night.
    pub price_per_night: Money,

    /// Minimum number of nights of a stay.
    pub minimum_stay: u16,

    /// Maximum number of guests.
    pub maximum_guests: u16,

    /// Indicator whether pets are allowed.
    pub pets_allowed: bool,
}

impl<Db> Command<CreateListing> for Service<Db>
where
    Db: Database<Insert<Listing>, Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateListing) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateListing {
            owner_id,
            price_per_night,
            minimum_stay,
            maximum_guests,
            pets_allowed,
        } = cmd;

        if !price_per_night.is_positive() {
            return Err(tracerr::new!(E::InvalidPrice(price_per_night)));
        }
        let minimum_stay = MinimumStay::new(minimum_stay)
            .ok_or(E::InvalidMinimumStay(minimum_stay))
            .map_err(tracerr::wrap!())?;
        let maximum_guests = MaximumGuests::new(maximum_guests)
            .ok_or(E::InvalidMaximumGuests(maximum_guests))
            .map_err(tracerr::wrap!())?;

        let listing = Listing {
            id: listing::Id::new(),
            owner_id,
            price_per_night,
            minimum_stay,
            maximum_guests,
            pets_allowed,
            is_published: false,
            created_at: listing::CreationDateTime::now(),
        };
        self.database()
            .execute(Insert(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!("`Listing(id: {})` created", listing.id);

        Ok(listing)
    }
}

/// Error of [`CreateListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Maximum number of guests is not positive.
    #[display("Invalid maximum number of guests: {_0}")]
    #[from(ignore)]
    InvalidMaximumGuests(#[error(not(source))] u16),

    /// Minimum stay is not positive.
    #[display("Invalid minimum stay: {_0} nights")]
    #[from(ignore)]
    InvalidMinimumStay(#[error(not(source))] u16),

    /// Price of a night is not positive.
    #[display("Invalid price per night: {_0}")]
    #[from(ignore)]
    InvalidPrice(#[error(not(source))] Money),
}
