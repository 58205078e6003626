//! [`Command`] for accepting an alteration [`BookingRequest`] by the host.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    coordinator::{self, Coordinator, Supersede},
    domain::{booking_request, listing, user, Booking, BookingRequest, Listing},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for accepting an alteration [`BookingRequest`] by the owner
/// of the [`Listing`], superseding the [`Booking`] of the altered one.
#[derive(Clone, Copy, Debug)]
pub struct AcceptAlteration {
    /// ID of the alteration [`BookingRequest`].
    pub request_id: booking_request::Id,

    /// ID of the [`User`] accepting the alteration.
    pub initiator_id: user::Id,
}

impl<Db> Command<AcceptAlteration> for Service<Db>
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
        Supersede,
        Ok = Booking,
        Err = Traced<coordinator::supersede::ExecutionError>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AcceptAlteration,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AcceptAlteration {
            request_id,
            initiator_id,
        } = cmd;

        let request = self
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(request_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(request_id))
            .map_err(tracerr::wrap!())?;
        if request.alteration_of.is_none() {
            return Err(tracerr::new!(E::RequestNotAlteration(request_id)));
        }
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

        self.execute(Supersede { request_id })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`AcceptAlteration`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
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

    /// [`BookingRequest`] doesn't alter any other one.
    #[display("`BookingRequest(id: {_0})` is not an alteration")]
    RequestNotAlteration(#[error(not(source))] booking_request::Id),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),

    /// [`Supersede`]ing the original [`Booking`] failed.
    #[display("Failed to supersede `Booking`: {_0}")]
    #[from]
    Supersede(coordinator::supersede::ExecutionError),
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{booking, user},
        testing::{self, stay},
        Command as _,
    };

    use super::{AcceptAlteration, ExecutionError};

    #[tokio::test]
    async fn supersedes_booking_by_owner_only() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (original, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let alteration =
            testing::alteration(&svc, &original, "2025-03-01", "2025-03-06")
                .await;

        let err = svc
            .execute(AcceptAlteration {
                request_id: alteration.id,
                initiator_id: user::Id::new(),
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(matches!(err, ExecutionError::NotOwner(_)), "{err}");

        let booking = svc
            .execute(AcceptAlteration {
                request_id: alteration.id,
                initiator_id: listing.owner_id,
            })
            .await
            .unwrap();
        assert_eq!(booking.stay, stay("2025-03-01", "2025-03-06"));
        assert_eq!(booking.status, booking::Status::Accepted);
    }

    #[tokio::test]
    async fn accepts_only_alterations() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let request =
            testing::request(&svc, &listing, "2025-03-01", "2025-03-04").await;

        let err = svc
            .execute(AcceptAlteration {
                request_id: request.id,
                initiator_id: listing.owner_id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(
            matches!(err, ExecutionError::RequestNotAlteration(_)),
            "{err}",
        );
    }
}
