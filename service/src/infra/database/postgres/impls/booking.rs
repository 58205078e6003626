//! [`Booking`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, booking_request, calendar::Stay, listing, Booking},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of `bookings` table, in the order [`from_row()`] expects them.
const COLUMNS: &str = "\
    id, listing_id, guest_id, request_id, \
    check_in, check_out, \
    total_amount, total_currency, \
    status, created_at";

/// Builds a [`Booking`] out of the provided [`Row`] of `bookings` table.
fn from_row(row: &Row) -> Booking {
    Booking {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        guest_id: row.get("guest_id"),
        request_id: row.get("request_id"),
        stay: Stay::new(row.get("check_in"), row.get("check_out"))
            .expect("`bookings_stay_check` constraint"),
        total_price: Money {
            amount: row.get("total_amount"),
            currency: row.get("total_currency"),
        },
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<Booking>, booking_request::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking_request::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let request_id: booking_request::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE request_id = $1::UUID \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&request_id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Booking>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let listing_id: listing::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE listing_id = $1::UUID \
             ORDER BY check_in ASC, created_at ASC",
        );
        Ok(self
            .query(&sql, &[&listing_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Booking>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(booking)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            listing_id,
            guest_id,
            request_id,
            stay,
            total_price,
            status,
            created_at,
        } = booking;
        let (check_in, check_out) = (stay.check_in(), stay.check_out());

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, listing_id, guest_id, request_id, \
                check_in, check_out, \
                total_amount, total_currency, \
                status, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::DATE, $6::DATE, \
                $7::NUMERIC, $8::INT2, \
                $9::INT2, $10::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET check_in = EXCLUDED.check_in, \
                check_out = EXCLUDED.check_out, \
                total_amount = EXCLUDED.total_amount, \
                total_currency = EXCLUDED.total_currency, \
                status = EXCLUDED.status";
        self.exec(
            SQL,
            &[
                &id,
                &listing_id,
                &guest_id,
                &request_id,
                &check_in,
                &check_out,
                &total_price.amount,
                &total_price.currency,
                &status,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
