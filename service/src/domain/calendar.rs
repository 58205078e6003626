//! [`Calendar`] definitions: per-date availability and price of a [`Listing`].

use std::{fmt, iter};

use common::{Date, Money};
use derive_more::{Display, Error};

use crate::domain::{booking, listing, Listing};

/// Stay in a [`Listing`]: the nights from `check_in` (inclusive) until
/// `check_out` (exclusive).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Stay {
    /// [`Date`] of the first night.
    check_in: Date,

    /// [`Date`] of the departure, the day after the last night.
    check_out: Date,
}

impl Stay {
    /// Creates a new [`Stay`] if `check_out` is after `check_in`.
    #[must_use]
    pub fn new(check_in: Date, check_out: Date) -> Option<Self> {
        (check_out > check_in).then_some(Self {
            check_in,
            check_out,
        })
    }

    /// Returns [`Date`] of the first night of this [`Stay`].
    #[must_use]
    pub fn check_in(&self) -> Date {
        self.check_in
    }

    /// Returns [`Date`] of the departure from this [`Stay`].
    #[must_use]
    pub fn check_out(&self) -> Date {
        self.check_out
    }

    /// Returns number of nights in this [`Stay`].
    #[must_use]
    pub fn nights(&self) -> u32 {
        u32::try_from(self.check_in.days_until(self.check_out))
            .unwrap_or(u32::MAX)
    }

    /// Iterates over the [`Date`]s of all the nights of this [`Stay`].
    pub fn dates(&self) -> impl Iterator<Item = Date> {
        self.check_in.until(self.check_out)
    }

    /// Indicates whether the night of the provided [`Date`] belongs to this
    /// [`Stay`].
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Indicates whether this [`Stay`] shares at least one night with the
    /// `other` one.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Returns the smallest [`Stay`] covering both this and the `other` one.
    #[must_use]
    pub fn span(&self, other: &Self) -> Self {
        Self {
            check_in: self.check_in.min(other.check_in),
            check_out: self.check_out.max(other.check_out),
        }
    }
}

impl fmt::Display for Stay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Inventory of a single night in a [`Listing`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Day {
    /// ID of the [`Listing`] this [`Day`] belongs to.
    pub listing_id: listing::Id,

    /// [`Date`] of this [`Day`].
    pub date: Date,

    /// Indicator whether this [`Day`] may be booked.
    pub is_available: bool,

    /// Price of this night.
    pub price: Money,

    /// ID of the [`Booking`] holding this [`Day`], if any.
    ///
    /// Set if and only if this [`Day`] is unavailable because of a
    /// [`Booking`]. A [`Day`] blocked by the owner has no [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    pub booking_id: Option<booking::Id>,
}

impl Day {
    /// Creates an available [`Day`] priced by default for the provided
    /// [`Listing`].
    #[must_use]
    pub fn vacant(listing: &Listing, date: Date) -> Self {
        Self {
            listing_id: listing.id,
            date,
            is_available: true,
            price: listing.price_per_night,
            booking_id: None,
        }
    }

    /// Indicates whether this [`Day`] is blocked by the [`Listing`] owner.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.is_available && self.booking_id.is_none()
    }
}

/// Permission to reserve [`Day`]s blocked by the [`Listing`] owner.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Blocks {
    /// Blocked [`Day`]s are conflicting.
    #[default]
    Respect,

    /// Blocked [`Day`]s may be reserved.
    Override,
}

/// Ordered [`Day`]s of a [`Listing`] within some [`Stay`].
///
/// Every night of the [`Stay`] has exactly one [`Day`], the ones missing in
/// the storage are synthesized as available with the [`Listing`]'s default
/// price.
#[derive(Clone, Debug)]
pub struct Calendar {
    /// ID of the [`Listing`] this [`Calendar`] belongs to.
    listing_id: listing::Id,

    /// Range covered by this [`Calendar`].
    range: Stay,

    /// [`Day`]s of this [`Calendar`], ordered by their [`Date`]s.
    days: Vec<Day>,
}

impl Calendar {
    /// Creates a new [`Calendar`] of the provided [`Listing`] covering the
    /// `range` out of the stored `rows`.
    ///
    /// Rows of other [`Listing`]s or outside the `range` are ignored.
    #[must_use]
    pub fn new(
        listing: &Listing,
        range: Stay,
        rows: impl IntoIterator<Item = Day>,
    ) -> Self {
        let mut rows = rows
            .into_iter()
            .filter(|d| d.listing_id == listing.id && range.contains(d.date))
            .collect::<Vec<_>>();
        rows.sort_by_key(|d| d.date);
        rows.dedup_by_key(|d| d.date);

        let mut rows = rows.into_iter().peekable();
        let days = range
            .dates()
            .map(|date| {
                rows.next_if(|d| d.date == date)
                    .unwrap_or_else(|| Day::vacant(listing, date))
            })
            .collect();

        Self {
            listing_id: listing.id,
            range,
            days,
        }
    }

    /// Returns ID of the [`Listing`] this [`Calendar`] belongs to.
    #[must_use]
    pub fn listing_id(&self) -> listing::Id {
        self.listing_id
    }

    /// Returns the range covered by this [`Calendar`].
    #[must_use]
    pub fn range(&self) -> Stay {
        self.range
    }

    /// Returns all the [`Day`]s of this [`Calendar`].
    #[must_use]
    pub fn days(&self) -> &[Day] {
        &self.days
    }

    /// Consumes this [`Calendar`] returning its [`Day`]s.
    #[must_use]
    pub fn into_days(self) -> Vec<Day> {
        self.days
    }

    /// Returns the [`Day`] of the provided [`Date`], if it's covered.
    #[must_use]
    pub fn day(&self, date: Date) -> Option<&Day> {
        self.position(date).map(|i| &self.days[i])
    }

    /// Returns index of the [`Day`] of the provided [`Date`].
    fn position(&self, date: Date) -> Option<usize> {
        self.days.binary_search_by_key(&date, |d| d.date).ok()
    }

    /// Sums prices of all the nights of the provided [`Stay`].
    ///
    /// [`None`] is returned if the [`Stay`] is not covered by this
    /// [`Calendar`], or the prices cannot be summed up.
    #[must_use]
    pub fn total_price(&self, stay: Stay) -> Option<Money> {
        stay.dates().try_fold(None, |total: Option<Money>, date| {
            let price = self.day(date)?.price;
            Some(Some(match total {
                Some(total) => total.checked_add(price)?,
                None => price,
            }))
        })?
    }

    /// Returns [`Date`]s of the nights of the provided [`Stay`] which cannot
    /// be reserved for the `booking_id`.
    ///
    /// Nights outside this [`Calendar`] are never available.
    #[must_use]
    pub fn unavailable(
        &self,
        stay: Stay,
        booking_id: Option<booking::Id>,
        blocks: Blocks,
    ) -> Vec<Date> {
        stay.dates()
            .filter(|date| {
                self.day(*date).is_none_or(|day| {
                    if day.is_available {
                        return false;
                    }
                    match day.booking_id {
                        Some(id) => Some(id) != booking_id,
                        None => blocks == Blocks::Respect,
                    }
                })
            })
            .collect()
    }

    /// Holds all the nights of the provided [`Stay`] for the [`Booking`].
    ///
    /// Either all the nights are held, or none of them.
    ///
    /// # Errors
    ///
    /// With a [`Conflict`] naming every night held by another [`Booking`]
    /// (or blocked, unless [`Blocks::Override`] is given).
    ///
    /// [`Booking`]: crate::domain::Booking
    pub fn reserve(
        &mut self,
        stay: Stay,
        booking_id: booking::Id,
        blocks: Blocks,
    ) -> Result<(), Conflict> {
        let dates = self.unavailable(stay, Some(booking_id), blocks);
        if !dates.is_empty() {
            return Err(Conflict {
                listing_id: self.listing_id,
                dates,
            });
        }

        for date in stay.dates() {
            if let Some(i) = self.position(date) {
                let day = &mut self.days[i];
                day.is_available = false;
                day.booking_id = Some(booking_id);
            }
        }
        Ok(())
    }

    /// Frees the nights of the provided [`Stay`] held by the [`Booking`].
    ///
    /// Nights held by other [`Booking`]s are left untouched, so releasing
    /// twice is harmless. Returns the number of freed nights.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub fn release(&mut self, stay: Stay, booking_id: booking::Id) -> usize {
        self.days
            .iter_mut()
            .filter(|d| stay.contains(d.date))
            .filter(|d| d.booking_id == Some(booking_id))
            .map(|day| {
                day.is_available = true;
                day.booking_id = None;
            })
            .count()
    }

    /// Blocks or unblocks the night of the provided [`Date`], optionally
    /// overriding its price.
    ///
    /// # Errors
    ///
    /// - If the [`Date`] is not covered by this [`Calendar`].
    /// - If the `price` is not positive or in another currency.
    /// - If the night is held by a [`Booking`] and its availability would
    ///   change.
    ///
    /// [`Booking`]: crate::domain::Booking
    pub fn set_availability(
        &mut self,
        date: Date,
        available: bool,
        price: Option<Money>,
    ) -> Result<(), AvailabilityError> {
        use AvailabilityError as E;

        let i = self.position(date).ok_or(E::OutOfRange(date))?;
        let day = &mut self.days[i];

        if let Some(price) = price {
            if !price.is_positive() || price.currency != day.price.currency {
                return Err(E::InvalidPrice(price));
            }
        }
        if let Some(booking_id) = day.booking_id {
            // Only the booking lifecycle may change a held night.
            if available != day.is_available {
                return Err(E::Held { date, booking_id });
            }
        }

        day.is_available = available;
        if let Some(price) = price {
            day.price = price;
        }
        Ok(())
    }
}

/// Error of reserving [`Day`]s which are not available.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Conflict {
    /// ID of the [`Listing`] the [`Conflict`] happened in.
    pub listing_id: listing::Id,

    /// Ordered [`Date`]s of the conflicting nights.
    pub dates: Vec<Date>,
}

impl Conflict {
    /// Returns the first conflicting [`Date`].
    #[must_use]
    pub fn first(&self) -> Option<Date> {
        self.dates.first().copied()
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`Listing(id: {})` is unavailable on ", self.listing_id)?;
        for (sep, date) in iter::once("").chain(iter::repeat(", ")).zip(&self.dates)
        {
            write!(f, "{sep}{date}")?;
        }
        Ok(())
    }
}

/// Error of [`Calendar::set_availability()`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum AvailabilityError {
    /// Night is held by a [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    #[display("night of {date} is held by `Booking(id: {booking_id})`")]
    Held {
        /// [`Date`] of the held night.
        #[error(not(source))]
        date: Date,

        /// ID of the [`Booking`] holding the night.
        ///
        /// [`Booking`]: crate::domain::Booking
        #[error(not(source))]
        booking_id: booking::Id,
    },

    /// Price is not positive or in a wrong currency.
    #[display("invalid night price: {_0}")]
    InvalidPrice(#[error(not(source))] Money),

    /// [`Date`] is not covered by the [`Calendar`].
    #[display("{_0} is out of the `Calendar` range")]
    OutOfRange(#[error(not(source))] Date),
}

#[cfg(test)]
mod spec {
    use std::{collections::HashMap, str::FromStr as _};

    use common::{money::Currency, Date, Money};
    use proptest::prelude::*;

    use crate::domain::{
        booking,
        listing::{self, MaximumGuests, MinimumStay},
        Listing,
    };

    use super::{AvailabilityError, Blocks, Calendar, Day, Stay};

    fn date(s: &str) -> Date {
        Date::from_str(s).unwrap()
    }

    fn stay(from: &str, to: &str) -> Stay {
        Stay::new(date(from), date(to)).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn listing() -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id: crate::domain::user::Id::new(),
            price_per_night: money("100USD"),
            minimum_stay: MinimumStay::new(1).unwrap(),
            maximum_guests: MaximumGuests::new(4).unwrap(),
            pets_allowed: false,
            is_published: true,
            created_at: listing::CreationDateTime::now(),
        }
    }

    #[test]
    fn stay_requires_checkout_after_checkin() {
        assert!(Stay::new(date("2024-06-02"), date("2024-06-01")).is_none());
        assert!(Stay::new(date("2024-06-01"), date("2024-06-01")).is_none());
        assert_eq!(stay("2024-06-01", "2024-06-04").nights(), 3);
    }

    #[test]
    fn stays_overlap_on_shared_nights_only() {
        let june = stay("2024-06-01", "2024-06-04");

        assert!(june.overlaps(&stay("2024-06-03", "2024-06-05")));
        assert!(!june.overlaps(&stay("2024-06-04", "2024-06-05")));
        assert_eq!(
            june.span(&stay("2024-06-10", "2024-06-12")),
            stay("2024-06-01", "2024-06-12"),
        );
    }

    #[test]
    fn synthesizes_missing_days() {
        let listing = listing();
        let stored = Day {
            price: money("150USD"),
            ..Day::vacant(&listing, date("2024-06-02"))
        };
        let foreign = Day::vacant(
            &Listing {
                id: listing::Id::new(),
                ..listing.clone()
            },
            date("2024-06-03"),
        );

        let calendar = Calendar::new(
            &listing,
            stay("2024-06-01", "2024-06-04"),
            [stored.clone(), foreign],
        );

        assert_eq!(calendar.days().len(), 3);
        assert_eq!(calendar.days()[1], stored);
        assert!(calendar.days().iter().all(|d| d.listing_id == listing.id));
        assert_eq!(
            calendar.total_price(stay("2024-06-01", "2024-06-04")),
            Some(money("350USD")),
        );
        assert_eq!(calendar.total_price(stay("2024-06-01", "2024-06-05")), None);
    }

    #[test]
    fn reserves_all_or_nothing() {
        let listing = listing();
        let (first, second) = (booking::Id::new(), booking::Id::new());
        let mut calendar =
            Calendar::new(&listing, stay("2024-06-01", "2024-06-06"), []);

        calendar
            .reserve(stay("2024-06-01", "2024-06-04"), first, Blocks::Respect)
            .unwrap();
        let err = calendar
            .reserve(stay("2024-06-02", "2024-06-05"), second, Blocks::Respect)
            .unwrap_err();

        assert_eq!(err.dates, [date("2024-06-02"), date("2024-06-03")]);
        assert_eq!(err.first(), Some(date("2024-06-02")));
        assert!(err.to_string().ends_with("2024-06-02, 2024-06-03"));
        let held = calendar.day(date("2024-06-04")).unwrap();
        assert!(held.is_available);
        assert_eq!(held.booking_id, None);

        // Reserving the same nights again for the same booking is a no-op.
        calendar
            .reserve(stay("2024-06-01", "2024-06-04"), first, Blocks::Respect)
            .unwrap();
    }

    #[test]
    fn blocked_days_need_override() {
        let listing = listing();
        let mut calendar =
            Calendar::new(&listing, stay("2024-06-01", "2024-06-04"), []);
        calendar
            .set_availability(date("2024-06-02"), false, None)
            .unwrap();
        assert!(calendar.day(date("2024-06-02")).unwrap().is_blocked());

        let id = booking::Id::new();
        let err = calendar
            .reserve(stay("2024-06-01", "2024-06-04"), id, Blocks::Respect)
            .unwrap_err();
        assert_eq!(err.dates, [date("2024-06-02")]);

        calendar
            .reserve(stay("2024-06-01", "2024-06-04"), id, Blocks::Override)
            .unwrap();
        assert_eq!(calendar.day(date("2024-06-02")).unwrap().booking_id, Some(id));
    }

    #[test]
    fn releases_only_own_nights_idempotently() {
        let listing = listing();
        let (first, second) = (booking::Id::new(), booking::Id::new());
        let mut calendar =
            Calendar::new(&listing, stay("2024-06-01", "2024-06-06"), []);
        calendar
            .reserve(stay("2024-06-01", "2024-06-03"), first, Blocks::Respect)
            .unwrap();
        calendar
            .reserve(stay("2024-06-03", "2024-06-06"), second, Blocks::Respect)
            .unwrap();

        assert_eq!(
            calendar.release(stay("2024-06-01", "2024-06-06"), first),
            2,
        );
        assert_eq!(
            calendar.release(stay("2024-06-01", "2024-06-06"), first),
            0,
        );

        assert!(calendar.days()[..2].iter().all(|d| d.is_available));
        assert!(calendar.days()[2..]
            .iter()
            .all(|d| d.booking_id == Some(second) && !d.is_available));
    }

    #[test]
    fn held_days_keep_their_availability() {
        let listing = listing();
        let id = booking::Id::new();
        let mut calendar =
            Calendar::new(&listing, stay("2024-06-01", "2024-06-03"), []);
        calendar
            .reserve(stay("2024-06-01", "2024-06-02"), id, Blocks::Respect)
            .unwrap();

        assert_eq!(
            calendar.set_availability(date("2024-06-01"), true, None),
            Err(AvailabilityError::Held {
                date: date("2024-06-01"),
                booking_id: id,
            }),
        );
        calendar
            .set_availability(date("2024-06-01"), false, Some(money("90USD")))
            .unwrap();
        assert_eq!(calendar.days()[0].price, money("90USD"));

        assert_eq!(
            calendar.set_availability(date("2024-06-02"), true, Some(money("9EUR"))),
            Err(AvailabilityError::InvalidPrice(money("9EUR"))),
        );
        assert_eq!(
            calendar.set_availability(date("2024-06-03"), true, None),
            Err(AvailabilityError::OutOfRange(date("2024-06-03"))),
        );
        assert_eq!(
            calendar.days()[1].price,
            Money::zero(Currency::Usd).checked_add(money("100USD")).unwrap(),
        );
    }

    #[derive(Clone, Debug)]
    enum Op {
        Reserve { booking: usize, from: u8, nights: u8 },
        Release { booking: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4_usize, 0..20_u8, 1..6_u8).prop_map(|(booking, from, nights)| {
                Op::Reserve {
                    booking,
                    from,
                    nights,
                }
            }),
            (0..4_usize).prop_map(|booking| Op::Release { booking }),
        ]
    }

    proptest! {
        #[test]
        fn held_stays_never_overlap(ops in proptest::collection::vec(op(), 1..40)) {
            let listing = listing();
            let start = date("2024-06-01");
            let nth = |n: u8| start.until(date("2024-12-31")).nth(usize::from(n)).unwrap();
            let range = Stay::new(start, nth(30)).unwrap();
            let ids = [(); 4].map(|()| booking::Id::new());

            let mut calendar = Calendar::new(&listing, range, []);
            let mut held = HashMap::<usize, Stay>::new();

            for op in ops {
                match op {
                    Op::Reserve { booking, from, nights } => {
                        if held.contains_key(&booking) {
                            continue;
                        }
                        let stay = Stay::new(nth(from), nth(from + nights)).unwrap();
                        let overlaps = held.values().any(|s| s.overlaps(&stay));
                        let res = calendar.reserve(stay, ids[booking], Blocks::Respect);
                        prop_assert_eq!(res.is_err(), overlaps);
                        if res.is_ok() {
                            _ = held.insert(booking, stay);
                        }
                    }
                    Op::Release { booking } => {
                        let released = calendar.release(range, ids[booking]);
                        let expected = held.remove(&booking).map_or(0, |s| s.nights());
                        prop_assert_eq!(u32::try_from(released).unwrap(), expected);
                        prop_assert_eq!(calendar.release(range, ids[booking]), 0);
                    }
                }
            }

            for day in calendar.days() {
                let owner = held
                    .iter()
                    .find(|(_, s)| s.contains(day.date))
                    .map(|(b, _)| ids[*b]);
                prop_assert_eq!(day.booking_id, owner);
                prop_assert_eq!(day.is_available, owner.is_none());
            }
        }
    }
}
