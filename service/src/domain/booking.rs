//! [`Booking`] definitions.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{booking_request, calendar::Stay, listing, user};
#[cfg(doc)]
use crate::domain::{BookingRequest, Listing, User};

/// Confirmed (or awaiting confirmation) reservation of a [`Listing`].
///
/// [`Booking`]s are never deleted, only transitioned between [`Status`]es.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the booked [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the guest [`User`].
    pub guest_id: user::Id,

    /// ID of the [`BookingRequest`] this [`Booking`] originates from, if any.
    pub request_id: Option<booking_request::Id>,

    /// Booked [`Stay`].
    pub stay: Stay,

    /// Total price of the [`Stay`].
    pub total_price: Money,

    /// [`Status`] of this [`Booking`].
    pub status: Status,

    /// [`DateTime`] when this [`Booking`] was created.
    ///
    /// [`DateTime`]: common::DateTime
    pub created_at: CreationDateTime,
}

impl Booking {
    /// Creates a new [`Booking`] according to the provided [`Approval`].
    ///
    /// The calendar is not touched.
    #[must_use]
    pub fn new(
        listing_id: listing::Id,
        guest_id: user::Id,
        stay: Stay,
        total_price: Money,
        request_id: Option<booking_request::Id>,
        approval: Approval,
    ) -> Self {
        Self {
            id: Id::new(),
            listing_id,
            guest_id,
            request_id,
            stay,
            total_price,
            status: match approval {
                Approval::Instant => Status::Accepted,
                Approval::Host => Status::Pending,
            },
            created_at: CreationDateTime::now(),
        }
    }

    /// Indicates whether this [`Booking`] holds its [`Stay`] nights.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == Status::Accepted
    }

    /// Accepts this [`Booking`] by the host.
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Pending`].
    pub fn accept(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(Status::Accepted)?;
        Ok(())
    }

    /// Rejects this [`Booking`] by the host.
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Pending`].
    pub fn reject(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(Status::Rejected)?;
        Ok(())
    }

    /// Cancels this [`Booking`].
    ///
    /// Cancelling is not idempotent: a second cancellation fails.
    ///
    /// # Errors
    ///
    /// - [`CancellationError::AlreadyTerminated`] if this [`Booking`] is
    ///   [`Status::Cancelled`] or [`Status::Rejected`] already.
    /// - [`CancellationError::Transition`] if it's still [`Status::Pending`].
    pub fn cancel(&mut self) -> Result<(), CancellationError> {
        if self.status.is_terminal() {
            return Err(CancellationError::AlreadyTerminated(self.status));
        }
        self.status = self.status.transition(Status::Cancelled)?;
        Ok(())
    }
}

/// ID of a [`Booking`].
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

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "[`Booking`] awaits the host approval."]
        Pending = 1,

        #[doc = "[`Booking`] is confirmed and holds its nights."]
        Accepted = 2,

        #[doc = "[`Booking`] was declined by the host."]
        Rejected = 3,

        #[doc = "[`Booking`] was cancelled after its confirmation."]
        Cancelled = 4,
    }
}

impl Status {
    /// Checks whether this [`Status`] may become the provided one, returning
    /// the new [`Status`] if so.
    ///
    /// # Errors
    ///
    /// If the transition is not allowed.
    pub fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        use Status as S;

        match (self, to) {
            (S::Pending, S::Accepted | S::Rejected)
            | (S::Accepted, S::Cancelled) => Ok(to),
            (S::Pending | S::Accepted | S::Rejected | S::Cancelled, _) => {
                Err(InvalidTransition { from: self, to })
            }
        }
    }

    /// Indicates whether no transition is possible from this [`Status`].
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

/// Policy of approving a newly created [`Booking`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Approval {
    /// [`Booking`] is confirmed immediately.
    #[default]
    Instant,

    /// [`Booking`] awaits the host approval.
    Host,
}

/// Policy of pricing a [`Booking`] confirmed from a [`BookingRequest`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Pricing {
    /// Total price quoted to the guest when the [`BookingRequest`] was
    /// submitted.
    #[default]
    Quoted,

    /// Sum of the current night prices at the moment of confirmation.
    Current,
}

/// Error of a disallowed [`Status`] transition.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("`Booking` cannot become {to} from {from}")]
pub struct InvalidTransition {
    /// Current [`Status`].
    #[error(not(source))]
    pub from: Status,

    /// Requested [`Status`].
    #[error(not(source))]
    pub to: Status,
}

/// Error of cancelling a [`Booking`].
#[derive(Clone, Copy, Debug, Display, Eq, Error, From, PartialEq)]
pub enum CancellationError {
    /// [`Booking`] has been cancelled or rejected already.
    #[display("`Booking` is {_0} already")]
    #[from(ignore)]
    AlreadyTerminated(#[error(not(source))] Status),

    /// [`Booking`] is not confirmed yet.
    #[display("{_0}")]
    Transition(InvalidTransition),
}

/// [`DateTime`] when a [`Booking`] was created.
///
/// [`DateTime`]: common::DateTime
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;
