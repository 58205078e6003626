//! [`Database`] implementations.

use common::operations::{By, Commit, Insert, Lock, Select, Transact, Update};
use tracerr::Traced;

use crate::{
    domain::{
        booking, booking_request, calendar, listing, Booking, BookingRequest,
        Calendar, Listing,
    },
    infra::{database, Database},
    read,
};

use super::{Connection, Memory, NonTx, Tx};

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx::from_non_tx(&self.0)))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.commit();
        Ok(())
    }
}

impl Database<Lock<By<Listing, listing::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(by.into_inner()).await;
        Ok(())
    }
}

impl<C: Connection> Database<Select<By<Option<Listing>, listing::Id>>>
    for Memory<C>
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.listing(id).cloned()))
    }
}

impl<C: Connection> Database<Insert<Listing>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(listing)).await
    }
}

impl<C: Connection> Database<Update<Listing>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| {
            _ = s.listings.insert(listing.id, listing);
        });
        Ok(())
    }
}

impl<C: Connection>
    Database<Select<By<Vec<calendar::Day>, (listing::Id, calendar::Stay)>>>
    for Memory<C>
{
    type Ok = Vec<calendar::Day>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<calendar::Day>, (listing::Id, calendar::Stay)>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let (listing_id, range) = by.into_inner();
        Ok(self.read(|v| v.days(listing_id, range)))
    }
}

impl<C: Connection> Database<Update<Calendar>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(calendar): Update<Calendar>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| {
            s.days.extend(
                calendar
                    .into_days()
                    .into_iter()
                    .map(|day| ((day.listing_id, day.date), day)),
            );
        });
        Ok(())
    }
}

impl<C: Connection> Database<Select<By<Option<Booking>, booking::Id>>>
    for Memory<C>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.booking(id).cloned()))
    }
}

impl<C: Connection> Database<Select<By<Option<Booking>, booking_request::Id>>>
    for Memory<C>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking_request::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let request_id = by.into_inner();
        Ok(self.read(|v| {
            v.bookings()
                .find(|b| b.request_id == Some(request_id))
                .cloned()
        }))
    }
}

impl<C: Connection> Database<Select<By<Vec<Booking>, listing::Id>>>
    for Memory<C>
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = by.into_inner();
        let mut bookings = self.read(|v| {
            v.bookings()
                .filter(|b| b.listing_id == listing_id)
                .cloned()
                .collect::<Vec<_>>()
        });
        bookings.sort_by_key(|b| (b.stay.check_in(), b.created_at));
        Ok(bookings)
    }
}

impl<C: Connection> Database<Insert<Booking>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(booking)).await
    }
}

impl<C: Connection> Database<Update<Booking>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| {
            _ = s.bookings.insert(booking.id, booking);
        });
        Ok(())
    }
}

impl<C: Connection>
    Database<Select<By<Option<BookingRequest>, booking_request::Id>>>
    for Memory<C>
{
    type Ok = Option<BookingRequest>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<BookingRequest>, booking_request::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.read(|v| v.request(id).cloned()))
    }
}

impl<C: Connection>
    Database<
        Select<By<Vec<BookingRequest>, read::booking_request::AlterationsOf>>,
    > for Memory<C>
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
        let mut requests = self.read(|v| {
            v.requests()
                .filter(|r| r.alteration_of == Some(original))
                .cloned()
                .collect::<Vec<_>>()
        });
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }
}

impl<C: Connection>
    Database<
        Select<By<Vec<booking_request::Id>, read::booking_request::Expirable>>,
    > for Memory<C>
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
        let mut expirable = self.read(|v| {
            v.requests()
                .filter(|r| r.is_expirable(today, created_before))
                .map(|r| (r.created_at, r.id))
                .collect::<Vec<_>>()
        });
        expirable.sort_unstable();
        Ok(expirable.into_iter().map(|(_, id)| id).collect())
    }
}

impl<C: Connection> Database<Insert<BookingRequest>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(request): Insert<BookingRequest>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(request)).await
    }
}

impl<C: Connection> Database<Update<BookingRequest>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(request): Update<BookingRequest>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| {
            _ = s.requests.insert(request.id, request);
        });
        Ok(())
    }
}
