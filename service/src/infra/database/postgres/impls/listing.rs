//! [`Listing`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{listing, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Builds a [`Listing`] out of the provided [`Row`] of `listings` table.
fn from_row(row: &Row) -> Listing {
    Listing {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        price_per_night: Money {
            amount: row.get("price_amount"),
            currency: row.get("price_currency"),
        },
        minimum_stay: row.get("minimum_stay"),
        maximum_guests: row.get("maximum_guests"),
        pets_allowed: row.get("pets_allowed"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, owner_id, \
                   price_amount, price_currency, \
                   minimum_stay, maximum_guests, \
                   pets_allowed, is_published, \
                   created_at \
            FROM listings \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Listing>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(listing)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            owner_id,
            price_per_night,
            minimum_stay,
            maximum_guests,
            pets_allowed,
            is_published,
            created_at,
        } = listing;

        const SQL: &str = "\
            INSERT INTO listings (\
                id, owner_id, \
                price_amount, price_currency, \
                minimum_stay, maximum_guests, \
                pets_allowed, is_published, \
                created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, \
                $3::NUMERIC, $4::INT2, \
                $5::INT2, $6::INT2, \
                $7::BOOLEAN, $8::BOOLEAN, \
                $9::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET owner_id = EXCLUDED.owner_id, \
                price_amount = EXCLUDED.price_amount, \
                price_currency = EXCLUDED.price_currency, \
                minimum_stay = EXCLUDED.minimum_stay, \
                maximum_guests = EXCLUDED.maximum_guests, \
                pets_allowed = EXCLUDED.pets_allowed, \
                is_published = EXCLUDED.is_published, \
                created_at = EXCLUDED.created_at";
        self.exec(
            SQL,
            &[
                &id,
                &owner_id,
                &price_per_night.amount,
                &price_per_night.currency,
                &minimum_stay,
                &maximum_guests,
                &pets_allowed,
                &is_published,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Listing, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        // Row lock, so concurrent transactions of the same `Listing` queue up,
        // while the ones of other `Listing`s proceed.
        const SQL: &str = "\
            SELECT id \
            FROM listings \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
