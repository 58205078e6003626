//! [`BookingRequest`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking_request, calendar::Stay, BookingRequest},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of `booking_requests` table, in the order [`from_row()`] expects
/// them.
const COLUMNS: &str = "\
    id, listing_id, guest_id, message, \
    check_in, check_out, guests, pets, \
    total_amount, total_currency, \
    status, alteration_of, \
    created_at, resolved_at";

/// Builds a [`BookingRequest`] out of the provided [`Row`] of
/// `booking_requests` table.
fn from_row(row: &Row) -> BookingRequest {
    BookingRequest {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        guest_id: row.get("guest_id"),
        message: row.get("message"),
        stay: Stay::new(row.get("check_in"), row.get("check_out"))
            .expect("`booking_requests_stay_check` constraint"),
        guests: row.get("guests"),
        pets: row.get("pets"),
        total_price: Money {
            amount: row.get("total_amount"),
            currency: row.get("total_currency"),
        },
        status: row.get("status"),
        alteration_of: row.get("alteration_of"),
        created_at: row.get("created_at"),
        resolved_at: row.get("resolved_at"),
    }
}

impl<C> Database<Select<By<Option<BookingRequest>, booking_request::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<BookingRequest>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<BookingRequest>, booking_request::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking_request::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM booking_requests \
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

impl<C>
    Database<
        Select<By<Vec<BookingRequest>, read::booking_request::AlterationsOf>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<BookingRequest>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<BookingRequest>, read::booking_request::AlterationsOf>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking_request::AlterationsOf(original) = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM booking_requests \
             WHERE alteration_of = $1::UUID \
             ORDER BY created_at ASC",
        );
        Ok(self
            .query(&sql, &[&original])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C>
    Database<
        Select<By<Vec<booking_request::Id>, read::booking_request::Expirable>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking_request::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<booking_request::Id>, read::booking_request::Expirable>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking_request::Expirable {
            today,
            created_before,
        } = by.into_inner();

        // `NULL` deadline never matches, leaving only the check-in condition.
        const SQL: &str = "\
            SELECT id \
            FROM booking_requests \
            WHERE status = $1::INT2 \
              AND (check_in < $2::DATE \
                   OR created_at <= $3::TIMESTAMPTZ) \
            ORDER BY created_at ASC";
        Ok(self
            .query(
                SQL,
                &[&booking_request::Status::Pending, &today, &created_before],
            )
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C> Database<Insert<BookingRequest>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Update<BookingRequest>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(request): Insert<BookingRequest>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(request)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<BookingRequest>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(request): Update<BookingRequest>,
    ) -> Result<Self::Ok, Self::Err> {
        let BookingRequest {
            id,
            listing_id,
            guest_id,
            message,
            stay,
            guests,
            pets,
            total_price,
            status,
            alteration_of,
            created_at,
            resolved_at,
        } = request;
        let (check_in, check_out) = (stay.check_in(), stay.check_out());

        const SQL: &str = "\
            INSERT INTO booking_requests (\
                id, listing_id, guest_id, message, \
                check_in, check_out, guests, pets, \
                total_amount, total_currency, \
                status, alteration_of, \
                created_at, resolved_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::VARCHAR, \
                $5::DATE, $6::DATE, $7::INT2, $8::BOOLEAN, \
                $9::NUMERIC, $10::INT2, \
                $11::INT2, $12::UUID, \
                $13::TIMESTAMPTZ, $14::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                resolved_at = EXCLUDED.resolved_at";
        self.exec(
            SQL,
            &[
                &id,
                &listing_id,
                &guest_id,
                &message,
                &check_in,
                &check_out,
                &guests,
                &pets,
                &total_price.amount,
                &total_price.currency,
                &status,
                &alteration_of,
                &created_at,
                &resolved_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
