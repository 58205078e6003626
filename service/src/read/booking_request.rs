//! [`BookingRequest`]-related read definitions.

use common::Date;

use crate::domain::booking_request;
#[cfg(doc)]
use crate::domain::BookingRequest;

/// Selector of [`booking_request::Status::Pending`] [`BookingRequest`]s which
/// should be expired.
#[derive(Clone, Copy, Debug)]
pub struct Expirable {
    /// Current [`Date`]: requests with an earlier check-in are expirable.
    pub today: Date,

    /// Requests submitted not after this moment are expirable.
    ///
    /// [`None`] disables expiration by age.
    pub created_before: Option<booking_request::CreationDateTime>,
}

/// Selector of the direct alterations of a [`BookingRequest`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AlterationsOf(pub booking_request::Id);
