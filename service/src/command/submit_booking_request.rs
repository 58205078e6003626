//! [`Command`] for submitting a new [`BookingRequest`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking_request::{Proposal, ValidationError},
        calendar::{Blocks, Conflict, Day, Stay},
        listing, user, BookingRequest, Calendar, Listing,
    },
    infra::{database, Database},
    Notification, Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for submitting a new [`BookingRequest`] by a guest.
#[derive(Clone, Debug)]
pub struct SubmitBookingRequest {
    /// ID of the requested [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the guest [`User`].
    pub guest_id: user::Id,

    /// Requested terms.
    pub proposal: Proposal,
}

impl<Db> Command<SubmitBookingRequest> for Service<Db>
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
        > + Database<Insert<BookingRequest>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = BookingRequest;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitBookingRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitBookingRequest {
            listing_id,
            guest_id,
            proposal,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid pre-checking against half-confirmed nights.
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
        let terms = proposal
            .validate(&listing, guest_id)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;

        let days = tx
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, terms.stay))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let calendar = Calendar::new(&listing, terms.stay, days);
        let unavailable = calendar.unavailable(terms.stay, None, Blocks::Respect);
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

        let request =
            BookingRequest::new(listing_id, guest_id, terms, total_price, None);
        tx.execute(Insert(request.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`BookingRequest(id: {})` submitted for `Listing(id: {listing_id})` \
             on {}",
            request.id,
            request.stay,
        );
        self.notify(Notification::RequestSubmitted {
            request_id: request.id,
            listing_id,
        });

        Ok(request)
    }
}

/// Error of [`SubmitBookingRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested terms are invalid.
    #[display("Invalid `BookingRequest`: {_0}")]
    #[from]
    Invalid(ValidationError),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Night prices of the [`Listing`] cannot be summed up.
    #[display("`Listing(id: {_0})` has nights priced in different currencies")]
    PriceMismatch(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{
            booking_request::{self, Proposal, ValidationError},
            user,
        },
        testing::{self, date},
        Command as _,
    };

    use super::{ExecutionError, SubmitBookingRequest};

    fn proposal(check_in: &str, check_out: &str) -> Proposal {
        Proposal {
            check_in: date(check_in),
            check_out: date(check_out),
            guests: 2,
            pets: false,
            message: "Hi!".into(),
        }
    }

    #[tokio::test]
    async fn quotes_sum_of_night_prices() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        testing::reprice(&svc, &listing, "2025-03-02", "130USD").await;

        let request = svc
            .execute(SubmitBookingRequest {
                listing_id: listing.id,
                guest_id: user::Id::new(),
                proposal: proposal("2025-03-01", "2025-03-04"),
            })
            .await
            .unwrap();

        assert_eq!(request.status, booking_request::Status::Pending);
        assert_eq!(request.total_price.to_string(), "330USD");
        assert_eq!(request.guests.get(), 2);
        assert_eq!(request.alteration_of, None);
        assert!(request.resolved_at.is_none());
    }

    #[tokio::test]
    async fn rejects_booked_nights() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        _ = testing::booked(&svc, &listing, "2025-03-03", "2025-03-05").await;

        let err = svc
            .execute(SubmitBookingRequest {
                listing_id: listing.id,
                guest_id: user::Id::new(),
                proposal: proposal("2025-03-01", "2025-03-04"),
            })
            .await
            .unwrap_err()
            .into_inner();

        let ExecutionError::Invalid(ValidationError::Unavailable(conflict)) =
            &err
        else {
            panic!("expected `Unavailable`, got: {err}");
        };
        assert_eq!(conflict.dates, [date("2025-03-03")]);

        // Back-to-back stays share no night.
        _ = svc
            .execute(SubmitBookingRequest {
                listing_id: listing.id,
                guest_id: user::Id::new(),
                proposal: proposal("2025-03-01", "2025-03-03"),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_terms() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;

        let err = svc
            .execute(SubmitBookingRequest {
                listing_id: listing.id,
                guest_id: listing.owner_id,
                proposal: proposal("2025-03-01", "2025-03-04"),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(
            matches!(err, ExecutionError::Invalid(ValidationError::OwnListing)),
            "{err}",
        );

        let err = svc
            .execute(SubmitBookingRequest {
                listing_id: listing.id,
                guest_id: user::Id::new(),
                proposal: proposal("2025-03-04", "2025-03-04"),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(
            matches!(
                err,
                ExecutionError::Invalid(ValidationError::EmptyStay { .. }),
            ),
            "{err}",
        );
    }
}
