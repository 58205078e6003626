//! [`Query`] of a [`Calendar`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        calendar::{Day, Stay},
        listing, Calendar, Listing,
    },
    infra::{database, Database},
    Service,
};

use super::Query;

/// Queries the [`Calendar`] of a [`Listing`] within the provided range.
///
/// Nights without stored inventory are available at the default price of
/// the [`Listing`].
#[derive(Clone, Copy, Debug)]
pub struct Range {
    /// ID of the [`Listing`].
    pub listing_id: listing::Id,

    /// Queried range of nights.
    pub range: Stay,
}

impl<Db> Query<Range> for Service<Db>
where
    Db: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Day>, (listing::Id, Stay)>>,
            Ok = Vec<Day>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Calendar;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: Range) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Range { listing_id, range } = query;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        let days = self
            .database()
            .execute(Select(By::<Vec<Day>, _>::new((listing_id, range))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(Calendar::new(&listing, range, days))
    }
}

/// Error of [`Range`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    #[from(ignore)]
    ListingNotExists(#[error(not(source))] listing::Id),
}
