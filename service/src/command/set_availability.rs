//! [`Command`] for blocking, unblocking or repricing a night of a
//! [`Listing`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        calendar::{AvailabilityError, Day, Stay},
        listing, user, Calendar, Listing,
    },
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::{Booking, User};

use super::Command;

/// [`Command`] for changing the availability or the price of a single night
/// of a [`Listing`] by its owner.
///
/// Availability of a night held by a [`Booking`] cannot be changed, only its
/// price.
#[derive(Clone, Copy, Debug)]
pub struct SetAvailability {
    /// ID of the [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the [`User`] changing the night.
    pub initiator_id: user::Id,

    /// [`Date`] of the night.
    pub date: Date,

    /// Indicator whether the night may be booked.
    pub available: bool,

    /// New price of the night, if it should be changed.
    pub price: Option<Money>,
}

impl<Db> Command<SetAvailability> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Day>, (listing::Id, Stay)>>,
            Ok = Vec<Day>,
            Err = Traced<database::Error>,
        > + Database<Update<Calendar>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Day;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SetAvailability,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetAvailability {
            listing_id,
            initiator_id,
            date,
            available,
            price,
        } = cmd;

        let night = date
            .next()
            .and_then(|next| Stay::new(date, next))
            .ok_or(E::Availability(AvailabilityError::OutOfRange(date)))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize occupancy changes of the same `Listing`.
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

        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, night))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut calendar = Calendar::new(&listing, night, days);
        calendar
            .set_availability(date, available, price)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;
        let day = calendar
            .day(date)
            .cloned()
            .ok_or(E::Availability(AvailabilityError::OutOfRange(date)))
            .map_err(tracerr::wrap!())?;

        tx.execute(Update(calendar))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`Listing(id: {listing_id})` night of {date} set {} for {}",
            if day.is_available { "available" } else { "blocked" },
            day.price,
        );

        Ok(day)
    }
}

/// Error of [`SetAvailability`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Night cannot be changed.
    #[display("Cannot change the night: {_0}")]
    #[from]
    Availability(AvailabilityError),

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
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::Money;

    use crate::{
        domain::{calendar::AvailabilityError, user},
        testing::{self, date},
        Command as _,
    };

    use super::{ExecutionError, SetAvailability};

    #[tokio::test]
    async fn blocks_and_reprices_nights() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;

        let day = svc
            .execute(SetAvailability {
                listing_id: listing.id,
                initiator_id: listing.owner_id,
                date: date("2025-03-01"),
                available: false,
                price: Some(Money::from_str("120USD").unwrap()),
            })
            .await
            .unwrap();

        assert!(day.is_blocked());
        assert_eq!(day.price.to_string(), "120USD");

        let day = svc
            .execute(SetAvailability {
                listing_id: listing.id,
                initiator_id: listing.owner_id,
                date: date("2025-03-01"),
                available: true,
                price: None,
            })
            .await
            .unwrap();

        assert!(day.is_available);
        assert_eq!(day.price.to_string(), "120USD");
    }

    #[tokio::test]
    async fn cannot_unblock_booked_night() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (_, booking) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-03").await;
        let cmd = SetAvailability {
            listing_id: listing.id,
            initiator_id: listing.owner_id,
            date: date("2025-03-02"),
            available: true,
            price: None,
        };

        let err = svc.execute(cmd).await.unwrap_err().into_inner();
        assert!(
            matches!(
                err,
                ExecutionError::Availability(AvailabilityError::Held {
                    booking_id,
                    ..
                }) if booking_id == booking.id,
            ),
            "{err}",
        );

        // Repricing a held night is fine.
        let day = svc
            .execute(SetAvailability {
                available: false,
                price: Some(Money::from_str("90USD").unwrap()),
                ..cmd
            })
            .await
            .unwrap();
        assert_eq!(day.booking_id, Some(booking.id));
        assert_eq!(day.price.to_string(), "90USD");
    }

    #[tokio::test]
    async fn only_owner_may_change_nights() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;

        let err = svc
            .execute(SetAvailability {
                listing_id: listing.id,
                initiator_id: user::Id::new(),
                date: date("2025-03-01"),
                available: false,
                price: None,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::NotOwner(_)), "{err}");
    }
}
