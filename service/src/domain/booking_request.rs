//! [`BookingRequest`] definitions.

use std::collections::HashSet;

use common::{define_kind, unit, Date, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    calendar::{Conflict, Stay},
    listing, user, Listing,
};
#[cfg(doc)]
use crate::domain::{Booking, User};

/// Guest's proposal to stay in a [`Listing`], possibly altering a previously
/// accepted one.
#[derive(Clone, Debug)]
pub struct BookingRequest {
    /// ID of this [`BookingRequest`].
    pub id: Id,

    /// ID of the requested [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the guest [`User`].
    pub guest_id: user::Id,

    /// [`Message`] to the host.
    pub message: Message,

    /// Requested [`Stay`].
    pub stay: Stay,

    /// Number of guests.
    pub guests: Guests,

    /// Indicator whether the guests bring pets.
    pub pets: bool,

    /// Total price quoted for the [`Stay`].
    pub total_price: Money,

    /// [`Status`] of this [`BookingRequest`].
    pub status: Status,

    /// ID of the [`BookingRequest`] altered by this one, if any.
    ///
    /// Always belongs to the same [`Listing`] and guest.
    pub alteration_of: Option<Id>,

    /// [`DateTime`] when this [`BookingRequest`] was submitted.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`BookingRequest`] left [`Status::Pending`].
    ///
    /// [`DateTime`]: common::DateTime
    pub resolved_at: Option<ResolutionDateTime>,
}

impl BookingRequest {
    /// Creates a new [`Status::Pending`] [`BookingRequest`] out of the
    /// validated [`Terms`].
    #[must_use]
    pub fn new(
        listing_id: listing::Id,
        guest_id: user::Id,
        terms: Terms,
        total_price: Money,
        alteration_of: Option<Id>,
    ) -> Self {
        let Terms {
            stay,
            guests,
            pets,
            message,
        } = terms;
        Self {
            id: Id::new(),
            listing_id,
            guest_id,
            message,
            stay,
            guests,
            pets,
            total_price,
            status: Status::Pending,
            alteration_of,
            created_at: CreationDateTime::now(),
            resolved_at: None,
        }
    }

    /// Accepts this [`BookingRequest`].
    ///
    /// # Errors
    ///
    /// If this [`BookingRequest`] is not [`Status::Pending`].
    pub fn accept(&mut self) -> Result<(), InvalidTransition> {
        self.resolve(Status::Accepted)
    }

    /// Rejects this [`BookingRequest`].
    ///
    /// # Errors
    ///
    /// If this [`BookingRequest`] is not [`Status::Pending`].
    pub fn reject(&mut self) -> Result<(), InvalidTransition> {
        self.resolve(Status::Rejected)
    }

    /// Expires this [`BookingRequest`].
    ///
    /// # Errors
    ///
    /// If this [`BookingRequest`] is not [`Status::Pending`].
    pub fn expire(&mut self) -> Result<(), InvalidTransition> {
        self.resolve(Status::Expired)
    }

    /// Marks this [`BookingRequest`] as superseded by an accepted alteration.
    ///
    /// # Errors
    ///
    /// If this [`BookingRequest`] is not [`Status::Accepted`].
    pub fn alter(&mut self) -> Result<(), InvalidTransition> {
        self.resolve(Status::Altered)
    }

    /// Transitions this [`BookingRequest`] into the provided [`Status`].
    fn resolve(&mut self, to: Status) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(to)?;
        if self.resolved_at.is_none() {
            self.resolved_at = Some(ResolutionDateTime::now());
        }
        Ok(())
    }

    /// Indicates whether this [`BookingRequest`] should be expired: it's still
    /// [`Status::Pending`] while its check-in has passed `today`, or it was
    /// submitted not after the `deadline` (if any).
    #[must_use]
    pub fn is_expirable(
        &self,
        today: Date,
        deadline: Option<CreationDateTime>,
    ) -> bool {
        self.status == Status::Pending
            && (self.stay.check_in() < today
                || deadline.is_some_and(|d| self.created_at <= d))
    }
}

/// ID of a [`BookingRequest`].
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

/// Message of a guest to a host.
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Message(String);

impl Message {
    /// Maximum number of characters in a [`Message`].
    pub const MAX_LEN: usize = 2000;

    /// Creates a new [`Message`] if the given `message` is valid.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        Self::check(&message).then_some(Self(message))
    }

    /// Checks whether the given `message` is a valid [`Message`].
    fn check(message: impl AsRef<str>) -> bool {
        message.as_ref().chars().count() <= Self::MAX_LEN
    }
}

/// Positive number of guests of a [`BookingRequest`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Guests(i16);

impl Guests {
    /// Creates new [`Guests`] if their number is positive.
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

define_kind! {
    #[doc = "Status of a [`BookingRequest`]."]
    enum Status {
        #[doc = "[`BookingRequest`] awaits the host decision."]
        Pending = 1,

        #[doc = "[`BookingRequest`] was not decided in time."]
        Expired = 2,

        #[doc = "[`BookingRequest`] was accepted and spawned a [`Booking`]."]
        Accepted = 3,

        #[doc = "[`BookingRequest`] was declined by the host."]
        Rejected = 4,

        #[doc = "[`BookingRequest`] was superseded by its accepted alteration."]
        Altered = 5,
    }
}

impl Status {
    /// Checks whether this [`Status`] may become the provided one, returning
    /// the new [`Status`] if so.
    ///
    /// [`Status::Accepted`] may only become [`Status::Altered`], the other
    /// non-[`Status::Pending`] ones are final.
    ///
    /// # Errors
    ///
    /// If the transition is not allowed.
    pub fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        use Status as S;

        match (self, to) {
            (S::Pending, S::Accepted | S::Rejected | S::Expired)
            | (S::Accepted, S::Altered) => Ok(to),
            (
                S::Pending | S::Expired | S::Accepted | S::Rejected | S::Altered,
                _,
            ) => Err(InvalidTransition { from: self, to }),
        }
    }
}

/// Error of a disallowed [`Status`] transition.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("`BookingRequest` cannot become {to} from {from}")]
pub struct InvalidTransition {
    /// Current [`Status`].
    #[error(not(source))]
    pub from: Status,

    /// Requested [`Status`].
    #[error(not(source))]
    pub to: Status,
}

/// Unvalidated terms of a [`BookingRequest`], as submitted by a guest.
#[derive(Clone, Debug)]
pub struct Proposal {
    /// [`Date`] of the first night.
    pub check_in: Date,

    /// [`Date`] of the departure.
    pub check_out: Date,

    /// Number of guests.
    pub guests: u16,

    /// Indicator whether the guests bring pets.
    pub pets: bool,

    /// Message to the host.
    pub message: String,
}

impl Proposal {
    /// Validates this [`Proposal`] against the rules of the provided
    /// [`Listing`].
    ///
    /// Availability of the nights is not checked here.
    ///
    /// # Errors
    ///
    /// With the first violated rule.
    pub fn validate(
        self,
        listing: &Listing,
        guest_id: user::Id,
    ) -> Result<Terms, ValidationError> {
        use ValidationError as E;

        if !listing.is_published {
            return Err(E::Unpublished);
        }
        if listing.is_owned_by(guest_id) {
            return Err(E::OwnListing);
        }

        let stay = Stay::new(self.check_in, self.check_out).ok_or(
            E::EmptyStay {
                check_in: self.check_in,
                check_out: self.check_out,
            },
        )?;
        let minimum = listing.minimum_stay.get();
        if stay.nights() < u32::from(minimum) {
            return Err(E::TooShort {
                nights: stay.nights(),
                minimum,
            });
        }

        if self.guests == 0 {
            return Err(E::NoGuests);
        }
        let maximum = listing.maximum_guests.get();
        let too_many = E::TooManyGuests {
            guests: self.guests,
            maximum,
        };
        if self.guests > maximum {
            return Err(too_many);
        }
        let guests = Guests::new(self.guests).ok_or(too_many)?;
        if self.pets && !listing.pets_allowed {
            return Err(E::PetsNotAllowed);
        }

        let message = Message::new(self.message).ok_or(E::MessageTooLong)?;

        Ok(Terms {
            stay,
            guests,
            pets: self.pets,
            message,
        })
    }
}

/// Validated terms of a [`BookingRequest`].
#[derive(Clone, Debug)]
pub struct Terms {
    /// Requested [`Stay`].
    pub stay: Stay,

    /// Number of guests.
    pub guests: Guests,

    /// Indicator whether the guests bring pets.
    pub pets: bool,

    /// [`Message`] to the host.
    pub message: Message,
}

/// Error of validating a [`Proposal`].
#[derive(Clone, Debug, Display, Error, From)]
pub enum ValidationError {
    /// [`Listing`] is not published.
    #[display("`Listing` is not published")]
    Unpublished,

    /// Guest owns the [`Listing`].
    #[display("`Listing` cannot be requested by its owner")]
    OwnListing,

    /// Check-out is not after check-in.
    #[display("check-out {check_out} is not after check-in {check_in}")]
    EmptyStay {
        /// Requested check-in.
        #[error(not(source))]
        check_in: Date,

        /// Requested check-out.
        #[error(not(source))]
        check_out: Date,
    },

    /// Stay is shorter than the [`Listing`] minimum.
    #[display("stay of {nights} nights is shorter than {minimum} nights")]
    TooShort {
        /// Requested number of nights.
        #[error(not(source))]
        nights: u32,

        /// Minimum number of nights.
        #[error(not(source))]
        minimum: u16,
    },

    /// No guests are requested.
    #[display("at least one guest is required")]
    NoGuests,

    /// More guests than the [`Listing`] accommodates.
    #[display("{guests} guests exceed the maximum of {maximum}")]
    TooManyGuests {
        /// Requested number of guests.
        #[error(not(source))]
        guests: u16,

        /// Maximum number of guests.
        #[error(not(source))]
        maximum: u16,
    },

    /// Pets are not allowed in the [`Listing`].
    #[display("pets are not allowed")]
    PetsNotAllowed,

    /// [`Message`] is too long.
    #[display("message exceeds {} characters", Message::MAX_LEN)]
    MessageTooLong,

    /// Some of the requested nights are not available.
    #[display("{_0}")]
    #[from]
    Unavailable(Conflict),
}

/// Alteration chain of [`BookingRequest`]s, starting from some
/// [`BookingRequest`] and following its `alteration_of` pointers back to the
/// oldest one.
///
/// Requests are stored in an arena, where the original of the request at
/// index `i` is at index `i + 1`. Pushing an already seen request, or going
/// deeper than [`Chain::MAX_DEPTH`], fails instead of looping.
#[derive(Clone, Debug)]
pub struct Chain {
    /// [`BookingRequest`]s of this [`Chain`], the newest first.
    requests: Vec<BookingRequest>,

    /// IDs of the [`BookingRequest`]s in this [`Chain`].
    seen: HashSet<Id>,
}

impl Chain {
    /// Maximum number of [`BookingRequest`]s in a [`Chain`].
    pub const MAX_DEPTH: usize = 64;

    /// Starts a new [`Chain`] from the provided [`BookingRequest`].
    #[must_use]
    pub fn new(start: BookingRequest) -> Self {
        Self {
            seen: HashSet::from([start.id]),
            requests: vec![start],
        }
    }

    /// Returns ID of the next [`BookingRequest`] to be [`push`]ed, if the
    /// [`Chain`] is not complete yet.
    ///
    /// [`push`]: Chain::push
    #[must_use]
    pub fn next_original(&self) -> Option<Id> {
        self.root().alteration_of
    }

    /// Appends the original of the oldest [`BookingRequest`] in this
    /// [`Chain`].
    ///
    /// # Errors
    ///
    /// - If the `original` is not the one [`Chain::next_original()`] points
    ///   to, or belongs to another [`Listing`] or guest.
    /// - If the `original` is already in this [`Chain`].
    /// - If this [`Chain`] would become longer than [`Chain::MAX_DEPTH`].
    pub fn push(&mut self, original: BookingRequest) -> Result<(), ChainError> {
        let root = self.root();
        if root.alteration_of != Some(original.id)
            || root.listing_id != original.listing_id
            || root.guest_id != original.guest_id
        {
            return Err(ChainError::Foreign(original.id));
        }
        if self.seen.contains(&original.id) {
            return Err(ChainError::Cycle(original.id));
        }
        if self.requests.len() >= Self::MAX_DEPTH {
            return Err(ChainError::TooDeep);
        }

        _ = self.seen.insert(original.id);
        self.requests.push(original);
        Ok(())
    }

    /// Indicates whether the oldest [`BookingRequest`] is reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_original().is_none()
    }

    /// Returns the [`BookingRequest`] this [`Chain`] was started from.
    #[must_use]
    pub fn start(&self) -> &BookingRequest {
        &self.requests[0]
    }

    /// Returns the oldest [`BookingRequest`] pushed into this [`Chain`].
    #[must_use]
    pub fn root(&self) -> &BookingRequest {
        self.requests.last().unwrap_or(&self.requests[0])
    }

    /// Returns index of the original of the [`BookingRequest`] at the
    /// provided index.
    #[must_use]
    pub fn parent(&self, index: usize) -> Option<usize> {
        let next = index.checked_add(1)?;
        (next < self.requests.len()).then_some(next)
    }

    /// Returns all the [`BookingRequest`]s of this [`Chain`], the newest
    /// first.
    #[must_use]
    pub fn requests(&self) -> &[BookingRequest] {
        &self.requests
    }
}

/// Error of building a [`Chain`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
pub enum ChainError {
    /// [`BookingRequest`] is visited twice.
    #[display("`BookingRequest(id: {_0})` is already in the alteration chain")]
    Cycle(#[error(not(source))] Id),

    /// [`BookingRequest`] doesn't continue the [`Chain`].
    #[display("`BookingRequest(id: {_0})` doesn't belong to the alteration chain")]
    Foreign(#[error(not(source))] Id),

    /// [`Chain`] is too long.
    #[display("alteration chain exceeds {} requests", Chain::MAX_DEPTH)]
    TooDeep,
}

/// [`DateTime`] when a [`BookingRequest`] was submitted.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(BookingRequest, unit::Creation)>;

/// [`DateTime`] when a [`BookingRequest`] was resolved.
///
/// [`DateTime`]: common::DateTime
pub type ResolutionDateTime = DateTimeOf<(BookingRequest, unit::Resolution)>;

#[cfg(test)]
mod spec {
    use std::{str::FromStr as _, time::Duration};

    use common::{Date, Money};

    use crate::domain::{
        listing::{self, MaximumGuests, MinimumStay},
        user, Listing,
    };

    use super::{
        BookingRequest, Chain, ChainError, CreationDateTime, Id,
        InvalidTransition, Message, Proposal, Status, ValidationError,
    };

    fn date(s: &str) -> Date {
        Date::from_str(s).unwrap()
    }

    fn listing() -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            price_per_night: Money::from_str("100USD").unwrap(),
            minimum_stay: MinimumStay::new(2).unwrap(),
            maximum_guests: MaximumGuests::new(4).unwrap(),
            pets_allowed: false,
            is_published: true,
            created_at: listing::CreationDateTime::now(),
        }
    }

    fn proposal() -> Proposal {
        Proposal {
            check_in: date("2024-06-01"),
            check_out: date("2024-06-04"),
            guests: 2,
            pets: false,
            message: "Hello!".into(),
        }
    }

    fn request(listing: &Listing, guest_id: user::Id) -> BookingRequest {
        let terms = proposal().validate(listing, guest_id).unwrap();
        BookingRequest::new(
            listing.id,
            guest_id,
            terms,
            Money::from_str("300USD").unwrap(),
            None,
        )
    }

    #[test]
    fn validates_proposal() {
        let listing = listing();
        let guest = user::Id::new();

        let terms = proposal().validate(&listing, guest).unwrap();
        assert_eq!(terms.stay.nights(), 3);
        assert_eq!(terms.guests.get(), 2);

        let check = |p: Proposal, l: &Listing, g| p.validate(l, g).unwrap_err();
        assert!(matches!(
            check(proposal(), &listing, listing.owner_id),
            ValidationError::OwnListing,
        ));
        assert!(matches!(
            check(
                proposal(),
                &Listing {
                    is_published: false,
                    ..listing.clone()
                },
                guest,
            ),
            ValidationError::Unpublished,
        ));
        assert!(matches!(
            check(
                Proposal {
                    check_out: date("2024-06-01"),
                    ..proposal()
                },
                &listing,
                guest,
            ),
            ValidationError::EmptyStay { .. },
        ));
        assert!(matches!(
            check(
                Proposal {
                    check_out: date("2024-06-02"),
                    ..proposal()
                },
                &listing,
                guest,
            ),
            ValidationError::TooShort {
                nights: 1,
                minimum: 2,
            },
        ));
        assert!(matches!(
            check(Proposal { guests: 0, ..proposal() }, &listing, guest),
            ValidationError::NoGuests,
        ));
        assert!(matches!(
            check(Proposal { guests: 5, ..proposal() }, &listing, guest),
            ValidationError::TooManyGuests {
                guests: 5,
                maximum: 4,
            },
        ));
        assert!(matches!(
            check(Proposal { guests: u16::MAX, ..proposal() }, &listing, guest),
            ValidationError::TooManyGuests {
                guests: u16::MAX,
                maximum: 4,
            },
        ));
        assert!(matches!(
            check(Proposal { pets: true, ..proposal() }, &listing, guest),
            ValidationError::PetsNotAllowed,
        ));
        assert!(matches!(
            check(
                Proposal {
                    message: "x".repeat(Message::MAX_LEN + 1),
                    ..proposal()
                },
                &listing,
                guest,
            ),
            ValidationError::MessageTooLong,
        ));
    }

    #[test]
    fn transitions() {
        use Status as S;

        let all = [S::Pending, S::Expired, S::Accepted, S::Rejected, S::Altered];
        let allowed = [
            (S::Pending, S::Accepted),
            (S::Pending, S::Rejected),
            (S::Pending, S::Expired),
            (S::Accepted, S::Altered),
        ];
        for from in all {
            for to in all {
                let res = from.transition(to);
                if allowed.contains(&(from, to)) {
                    assert_eq!(res, Ok(to), "{from} -> {to}");
                } else {
                    assert_eq!(res, Err(InvalidTransition { from, to }));
                }
            }
        }
    }

    #[test]
    fn keeps_first_resolution_time() {
        let listing = listing();
        let mut req = request(&listing, user::Id::new());
        assert!(req.resolved_at.is_none());

        req.accept().unwrap();
        let resolved_at = req.resolved_at.unwrap();
        assert!(req.expire().is_err());

        req.alter().unwrap();
        assert_eq!(req.status, Status::Altered);
        assert_eq!(req.resolved_at, Some(resolved_at));
    }

    #[test]
    fn expirable_when_checkin_passed_or_stale() {
        let listing = listing();
        let mut req = request(&listing, user::Id::new());
        let long_ago = CreationDateTime::now() - Duration::from_secs(3600);

        assert!(!req.is_expirable(date("2024-06-01"), Some(long_ago)));
        assert!(!req.is_expirable(date("2024-06-01"), None));
        assert!(req.is_expirable(date("2024-06-02"), None));
        assert!(
            req.is_expirable(date("2024-05-01"), Some(CreationDateTime::now())),
        );

        req.reject().unwrap();
        assert!(
            !req.is_expirable(date("2024-07-01"), Some(CreationDateTime::now())),
        );
    }

    #[test]
    fn chain_follows_originals() {
        let listing = listing();
        let guest = user::Id::new();
        let first = request(&listing, guest);
        let second = BookingRequest {
            alteration_of: Some(first.id),
            ..request(&listing, guest)
        };
        let third = BookingRequest {
            alteration_of: Some(second.id),
            ..request(&listing, guest)
        };

        let mut chain = Chain::new(third.clone());
        assert_eq!(chain.next_original(), Some(second.id));
        assert_eq!(
            chain.push(first.clone()),
            Err(ChainError::Foreign(first.id)),
        );
        chain.push(second.clone()).unwrap();
        chain.push(first.clone()).unwrap();

        assert!(chain.is_complete());
        assert_eq!(chain.start().id, third.id);
        assert_eq!(chain.root().id, first.id);
        assert_eq!(chain.parent(0), Some(1));
        assert_eq!(chain.parent(2), None);
        assert_eq!(
            chain.requests().iter().map(|r| r.id).collect::<Vec<_>>(),
            [third.id, second.id, first.id],
        );
    }

    #[test]
    fn chain_detects_cycles_and_depth() {
        let listing = listing();
        let guest = user::Id::new();
        let (a, b) = (Id::new(), Id::new());
        let first = BookingRequest {
            id: a,
            alteration_of: Some(b),
            ..request(&listing, guest)
        };
        let second = BookingRequest {
            id: b,
            alteration_of: Some(a),
            ..request(&listing, guest)
        };

        let mut chain = Chain::new(first.clone());
        chain.push(second).unwrap();
        assert_eq!(chain.push(first), Err(ChainError::Cycle(a)));

        let mut prev = BookingRequest {
            alteration_of: Some(Id::new()),
            ..request(&listing, guest)
        };
        let mut chain = Chain::new(prev.clone());
        for _ in 1..Chain::MAX_DEPTH {
            let next = BookingRequest {
                id: prev.alteration_of.unwrap(),
                alteration_of: Some(Id::new()),
                ..request(&listing, guest)
            };
            chain.push(next.clone()).unwrap();
            prev = next;
        }
        let next = BookingRequest {
            id: prev.alteration_of.unwrap(),
            ..request(&listing, guest)
        };
        assert_eq!(chain.push(next), Err(ChainError::TooDeep));
    }
}
