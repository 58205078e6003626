//! [`Listing`] definitions.

use common::{unit, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;
#[cfg(doc)]
use crate::domain::User;

/// Rentable unit published by its owner.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the [`User`] owning this [`Listing`].
    pub owner_id: user::Id,

    /// Default price of a single night in this [`Listing`].
    ///
    /// Always positive.
    pub price_per_night: Money,

    /// Minimum number of nights a stay in this [`Listing`] may last.
    pub minimum_stay: MinimumStay,

    /// Maximum number of guests this [`Listing`] accommodates.
    pub maximum_guests: MaximumGuests,

    /// Indicator whether pets are allowed in this [`Listing`].
    pub pets_allowed: bool,

    /// Indicator whether this [`Listing`] accepts new booking requests.
    pub is_published: bool,

    /// [`DateTime`] when this [`Listing`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

impl Listing {
    /// Indicates whether the provided [`User`] owns this [`Listing`].
    #[must_use]
    pub fn is_owned_by(&self, user_id: user::Id) -> bool {
        self.owner_id == user_id
    }
}

/// ID of a [`Listing`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Minimum number of nights of a stay in a [`Listing`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct MinimumStay(i16);

impl MinimumStay {
    /// Creates a new [`MinimumStay`] if the provided number of `nights` is
    /// positive.
    #[must_use]
    pub fn new(nights: u16) -> Option<Self> {
        i16::try_from(nights).ok().filter(|n| *n > 0).map(Self)
    }

    /// Returns the number of nights.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0.unsigned_abs()
    }
}

/// Maximum number of guests a [`Listing`] accommodates.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct MaximumGuests(i16);

impl MaximumGuests {
    /// Creates a new [`MaximumGuests`] if the provided number of `guests` is
    /// positive.
    #[must_use]
    pub fn new(guests: u16) -> Option<Self> {
        i16::try_from(guests).ok().filter(|n| *n > 0).map(Self)
    }

    /// Returns the number of guests.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0.unsigned_abs()
    }
}

/// [`DateTime`] when a [`Listing`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;
