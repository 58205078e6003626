//! [`Query`] collection related to [`Booking`]s.

use common::operations::By;

use crate::domain::{booking, booking_request, listing, Booking};
#[cfg(doc)]
use crate::{
    domain::{BookingRequest, Listing},
    Query,
};

use super::DatabaseQuery;

/// Queries a [`Booking`] by its [`booking::Id`].
pub type ById = DatabaseQuery<By<Option<Booking>, booking::Id>>;

/// Queries the [`Booking`] created out of a [`BookingRequest`].
pub type ByRequest = DatabaseQuery<By<Option<Booking>, booking_request::Id>>;

/// Queries all the [`Booking`]s of a [`Listing`], ordered by their check-in.
pub type ByListing = DatabaseQuery<By<Vec<Booking>, listing::Id>>;
