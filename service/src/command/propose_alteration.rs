//! [`Command`] for proposing an alteration of an accepted
//! [`BookingRequest`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking_request::{self, Proposal, ValidationError},
        calendar::{Blocks, Conflict, Day, Stay},
        listing, user, Booking, BookingRequest, Calendar, Listing,
    },
    infra::{database, Database},
    Notification, Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for proposing new terms of an accepted [`BookingRequest`] by
/// its guest.
///
/// The altered [`BookingRequest`] and its [`Booking`] stay untouched until
/// the alteration is accepted by the host.
#[derive(Clone, Debug)]
pub struct ProposeAlteration {
    /// ID of the [`BookingRequest`] to be altered.
    pub original_id: booking_request::Id,

    /// ID of the [`User`] proposing the alteration.
    pub initiator_id: user::Id,

    /// Proposed terms.
    pub proposal: Proposal,
}

impl<Db> Command<ProposeAlteration> for Service<Db>
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
        > + Database<Insert<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = BookingRequest;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ProposeAlteration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ProposeAlteration {
            original_id,
            initiator_id,
            proposal,
        } = cmd;

        let listing_id = self
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(original_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(original_id))
            .map_err(tracerr::wrap!())?
            .listing_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let original = tx
            .execute(Select(By::<Option<BookingRequest>, _>::new(original_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(original_id))
            .map_err(tracerr::wrap!())?;
        if original.guest_id != initiator_id {
            return Err(tracerr::new!(E::NotGuest(initiator_id)));
        }
        if original.status != booking_request::Status::Accepted {
            return Err(tracerr::new!(E::NotAlterable(original.status)));
        }
        // Nights held by the altered booking are free for its alteration.
        let booking_id = tx
            .execute(Select(By::<Option<Booking>, _>::new(original_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(Booking::is_active)
            .ok_or(E::OriginalNotBooked(original_id))
            .map_err(tracerr::wrap!())?
            .id;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        let terms = proposal
            .validate(&listing, initiator_id)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, terms.stay))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let calendar = Calendar::new(&listing, terms.stay, days);
        let unavailable =
            calendar.unavailable(terms.stay, Some(booking_id), Blocks::Respect);
        if !unavailable.is_empty() {
            return Err(tracerr::new!(E::Invalid(ValidationError::Unavailable(
                Conflict {
                    listing_id,
                    dates: unavailable,
                },
            ))));
        }
        let total_price = calendar
            .total_price(terms.stay)
            .ok_or(E::PriceMismatch(listing_id))
            .map_err(tracerr::wrap!())?;

        let alteration = BookingRequest::new(
            listing_id,
            initiator_id,
            terms,
            total_price,
            Some(original_id),
        );
        tx.execute(Insert(alteration.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`BookingRequest(id: {})` proposed as alteration of \
             `BookingRequest(id: {original_id})` on {}",
            alteration.id,
            alteration.stay,
        );
        self.notify(Notification::AlterationProposed {
            request_id: alteration.id,
            original_id,
        });

        Ok(alteration)
    }
}

/// Error of [`ProposeAlteration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Proposed terms are invalid.
    #[display("Invalid alteration: {_0}")]
    #[from]
    Invalid(ValidationError),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Only accepted [`BookingRequest`]s may be altered.
    #[display("`BookingRequest` in `{_0}` status cannot be altered")]
    NotAlterable(#[error(not(source))] booking_request::Status),

    /// [`User`] is not the guest of the [`BookingRequest`].
    #[display("`User(id: {_0})` is not the `BookingRequest` guest")]
    NotGuest(#[error(not(source))] user::Id),

    /// Altered [`BookingRequest`] has no active [`Booking`] anymore.
    #[display("`BookingRequest(id: {_0})` has no accepted `Booking`")]
    OriginalNotBooked(#[error(not(source))] booking_request::Id),

    /// Night prices of the [`Listing`] cannot be summed up.
    #[display("`Listing(id: {_0})` has nights priced in different currencies")]
    PriceMismatch(#[error(not(source))] listing::Id),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{
            booking_request::{self, Proposal, ValidationError},
            user,
        },
        command::CancelBooking,
        testing::{self, date, stay},
        Command as _,
    };

    use super::{ExecutionError, ProposeAlteration};

    fn proposal(check_in: &str, check_out: &str) -> Proposal {
        Proposal {
            check_in: date(check_in),
            check_out: date(check_out),
            guests: 1,
            pets: false,
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn counts_own_nights_as_available() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (original, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;

        let alteration = svc
            .execute(ProposeAlteration {
                original_id: original.id,
                initiator_id: original.guest_id,
                proposal: proposal("2025-03-02", "2025-03-05"),
            })
            .await
            .unwrap();

        assert_eq!(alteration.alteration_of, Some(original.id));
        assert_eq!(alteration.status, booking_request::Status::Pending);
        assert_eq!(alteration.stay, stay("2025-03-02", "2025-03-05"));
        assert_eq!(alteration.total_price.to_string(), "300USD");
    }

    #[tokio::test]
    async fn rejects_nights_of_others() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (original, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        _ = testing::booked(&svc, &listing, "2025-03-04", "2025-03-06").await;

        let err = svc
            .execute(ProposeAlteration {
                original_id: original.id,
                initiator_id: original.guest_id,
                proposal: proposal("2025-03-01", "2025-03-05"),
            })
            .await
            .unwrap_err()
            .into_inner();

        let ExecutionError::Invalid(ValidationError::Unavailable(conflict)) =
            &err
        else {
            panic!("expected `Unavailable`, got: {err}");
        };
        assert_eq!(conflict.dates, [date("2025-03-04")]);
    }

    #[tokio::test]
    async fn alters_only_accepted_requests_of_own() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let pending =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-04").await;

        let err = svc
            .execute(ProposeAlteration {
                original_id: pending.id,
                initiator_id: pending.guest_id,
                proposal: proposal("2025-03-01", "2025-03-05"),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(
            matches!(
                err,
                ExecutionError::NotAlterable(booking_request::Status::Pending),
            ),
            "{err}",
        );

        let (original, _) =
            testing::booked(&svc, &listing, "2025-04-01", "2025-04-04").await;
        let err = svc
            .execute(ProposeAlteration {
                original_id: original.id,
                initiator_id: user::Id::new(),
                proposal: proposal("2025-04-01", "2025-04-05"),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(matches!(err, ExecutionError::NotGuest(_)), "{err}");
    }

    #[tokio::test]
    async fn requires_active_booking() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (original, booking) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        _ = svc
            .execute(CancelBooking {
                booking_id: booking.id,
                initiator_id: original.guest_id,
            })
            .await
            .unwrap();

        let err = svc
            .execute(ProposeAlteration {
                original_id: original.id,
                initiator_id: original.guest_id,
                proposal: proposal("2025-03-02", "2025-03-05"),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(
            matches!(
                err,
                ExecutionError::OriginalNotBooked(id) if id == original.id,
            ),
            "{err}",
        );
    }
}
