//! [`Query`] collection related to [`BookingRequest`]s.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking_request::{self, Chain, ChainError},
        BookingRequest,
    },
    infra::{database, Database},
    read, Service,
};

use super::{DatabaseQuery, Query};

/// Queries a [`BookingRequest`] by its [`booking_request::Id`].
pub type ById = DatabaseQuery<By<Option<BookingRequest>, booking_request::Id>>;

/// Queries the direct alterations of a [`BookingRequest`], the oldest first.
pub type AlterationsOf = DatabaseQuery<
    By<Vec<BookingRequest>, read::booking_request::AlterationsOf>,
>;

/// Queries the alteration [`Chain`] of a [`BookingRequest`], following its
/// originals back to the first submitted one.
#[derive(Clone, Copy, Debug)]
pub struct AlterationChain(pub booking_request::Id);

impl<Db> Query<AlterationChain> for Service<Db>
where
    Db: Database<
        Select<By<Option<BookingRequest>, booking_request::Id>>,
        Ok = Option<BookingRequest>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Chain;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        AlterationChain(id): AlterationChain,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let start = self
            .database()
            .execute(Select(By::<Option<BookingRequest>, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RequestNotExists(id))
            .map_err(tracerr::wrap!())?;

        let mut chain = Chain::new(start);
        while let Some(original_id) = chain.next_original() {
            let original = self
                .database()
                .execute(Select(By::<Option<BookingRequest>, _>::new(
                    original_id,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::RequestNotExists(original_id))
                .map_err(tracerr::wrap!())?;
            chain
                .push(original)
                .map_err(E::from)
                .map_err(tracerr::wrap!())?;
        }
        Ok(chain)
    }
}

/// Error of [`AlterationChain`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Alteration chain is malformed.
    #[display("Malformed alteration chain: {_0}")]
    #[from]
    Chain(ChainError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`BookingRequest`] with the provided ID does not exist.
    #[display("`BookingRequest(id: {_0})` does not exist")]
    RequestNotExists(#[error(not(source))] booking_request::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::Update;

    use crate::{
        command::AcceptAlteration,
        domain::booking_request::{self, ChainError},
        infra::Database as _,
        read,
        testing::{self, stay},
        Command as _, Query as _,
    };

    use super::{AlterationChain, AlterationsOf, ById, ExecutionError};

    #[tokio::test]
    async fn follows_originals_to_first_request() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (first, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let second =
            testing::alteration(&svc, &first, "2025-03-01", "2025-03-05")
                .await;
        _ = svc
            .execute(AcceptAlteration {
                request_id: second.id,
                initiator_id: listing.owner_id,
            })
            .await
            .unwrap();
        let third =
            testing::alteration(&svc, &second, "2025-03-02", "2025-03-05")
                .await;

        let chain = svc.execute(AlterationChain(third.id)).await.unwrap();

        assert!(chain.is_complete());
        let ids = chain.requests().iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, [third.id, second.id, first.id]);
        assert_eq!(chain.root().status, booking_request::Status::Altered);
        assert_eq!(chain.requests()[1].status, booking_request::Status::Accepted);
        assert_eq!(chain.start().stay, stay("2025-03-02", "2025-03-05"));

        let alterations = svc
            .execute(AlterationsOf::by(read::booking_request::AlterationsOf(
                first.id,
            )))
            .await
            .unwrap();
        assert_eq!(alterations.len(), 1);
        assert_eq!(alterations[0].id, second.id);

        let found = svc
            .execute(ById::by(first.id))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn detects_cycles() {
        let (svc, _bg) = testing::service();
        let listing = testing::listing(&svc, "100USD").await;
        let (first, _) =
            testing::booked(&svc, &listing, "2025-03-01", "2025-03-04").await;
        let second =
            testing::alteration(&svc, &first, "2025-03-01", "2025-03-05")
                .await;
        let mut first = first;
        first.alteration_of = Some(second.id);
        svc.database().execute(Update(first.clone())).await.unwrap();

        let err = svc
            .execute(AlterationChain(second.id))
            .await
            .unwrap_err()
            .into_inner();

        assert!(
            matches!(err, ExecutionError::Chain(ChainError::Cycle(id)) if id == second.id),
            "{err}",
        );
    }
}
