//! [`Calendar`]-related [`Database`] implementations.

use common::{
    operations::{By, Select, Update},
    Money,
};
use itertools::multiunzip;
use tracerr::Traced;

use crate::{
    domain::{
        calendar::{Day, Stay},
        listing, Calendar,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Vec<Day>, (listing::Id, Stay)>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Day>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Day>, (listing::Id, Stay)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (listing_id, range) = by.into_inner();
        let (from, until) = (range.check_in(), range.check_out());

        const SQL: &str = "\
            SELECT listing_id, date, is_available, \
                   price_amount, price_currency, \
                   booking_id \
            FROM listing_inventory \
            WHERE listing_id = $1::UUID \
              AND date >= $2::DATE \
              AND date < $3::DATE \
            ORDER BY date ASC";
        Ok(self
            .query(SQL, &[&listing_id, &from, &until])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Day {
                listing_id: row.get("listing_id"),
                date: row.get("date"),
                is_available: row.get("is_available"),
                price: Money {
                    amount: row.get("price_amount"),
                    currency: row.get("price_currency"),
                },
                booking_id: row.get("booking_id"),
            })
            .collect())
    }
}

impl<C> Database<Update<Calendar>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(calendar): Update<Calendar>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = calendar.listing_id();
        let days = calendar.into_days();
        if days.is_empty() {
            return Ok(());
        }

        let (dates, availability, amounts, currencies, bookings): (
            Vec<_>,
            Vec<_>,
            Vec<_>,
            Vec<_>,
            Vec<_>,
        ) = multiunzip(days.into_iter().map(|d| {
            (
                d.date,
                d.is_available,
                d.price.amount,
                d.price.currency,
                d.booking_id,
            )
        }));

        const SQL: &str = "\
            INSERT INTO listing_inventory (\
                listing_id, date, is_available, \
                price_amount, price_currency, \
                booking_id \
            ) \
            SELECT $1::UUID, d.* \
            FROM unnest(\
                $2::DATE[], $3::BOOLEAN[], \
                $4::NUMERIC[], $5::INT2[], \
                $6::UUID[] \
            ) AS d \
            ON CONFLICT (listing_id, date) DO UPDATE \
            SET is_available = EXCLUDED.is_available, \
                price_amount = EXCLUDED.price_amount, \
                price_currency = EXCLUDED.price_currency, \
                booking_id = EXCLUDED.booking_id";
        self.exec(
            SQL,
            &[
                &listing_id,
                &dates,
                &availability,
                &amounts,
                &currencies,
                &bookings,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
