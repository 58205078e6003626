//! [`Command`] for publishing or unpublishing a [`Listing`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{listing, user, Listing},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::{BookingRequest, User};

use super::Command;

/// [`Command`] for toggling whether a [`Listing`] accepts new
/// [`BookingRequest`]s.
///
/// Existing [`BookingRequest`]s and bookings are not affected.
#[derive(Clone, Copy, Debug)]
pub struct PublishListing {
    /// ID of the [`Listing`] to be (un)published.
    pub listing_id: listing::Id,

    /// ID of the [`User`] (un)publishing the [`Listing`].
    pub initiator_id: user::Id,

    /// Indicator whether the [`Listing`] should be published.
    pub publish: bool,
}

impl<Db> Command<PublishListing> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<Update<Listing>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: PublishListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let PublishListing {
            listing_id,
            initiator_id,
            publish,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        if !listing.is_owned_by(initiator_id) {
            return Err(tracerr::new!(E::NotOwner(initiator_id)));
        }
        if listing.is_published == publish {
            return Ok(listing);
        }

        listing.is_published = publish;
        tx.execute(Update(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!(
            "`Listing(id: {listing_id})` {}",
            if publish { "published" } else { "unpublished" },
        );

        Ok(listing)
    }
}

/// Error of [`PublishListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`User`] doesn't own the [`Listing`].
    #[display("`User(id: {_0})` is not the `Listing` owner")]
    #[from(ignore)]
    NotOwner(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use crate::{domain::user, testing, Command as _};

    use super::{ExecutionError, PublishListing};

    #[tokio::test]
    async fn toggles_publication_by_owner_only() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        assert!(listing.is_published);

        let err = svc
            .execute(PublishListing {
                listing_id: listing.id,
                initiator_id: user::Id::new(),
                publish: false,
            })
            .await
            .unwrap_err()
            .into_inner();
        assert!(matches!(err, ExecutionError::NotOwner(_)), "{err}");

        let listing = svc
            .execute(PublishListing {
                listing_id: listing.id,
                initiator_id: listing.owner_id,
                publish: false,
            })
            .await
            .unwrap();
        assert!(!listing.is_published);
    }
}
