//! [`Notification`] definitions.

use crate::domain::{booking, booking_request, listing};
#[cfg(doc)]
use crate::domain::{Booking, BookingRequest, Listing};

/// Fire-and-forget event about a committed state change.
///
/// Delivered to every subscriber of the [`Service`], nobody awaits it.
///
/// [`Service`]: crate::Service
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Notification {
    /// New [`BookingRequest`] was submitted.
    RequestSubmitted {
        /// ID of the submitted [`BookingRequest`].
        request_id: booking_request::Id,

        /// ID of the requested [`Listing`].
        listing_id: listing::Id,
    },

    /// [`BookingRequest`] was accepted and became a [`Booking`].
    RequestAccepted {
        /// ID of the accepted [`BookingRequest`].
        request_id: booking_request::Id,

        /// ID of the created [`Booking`].
        booking_id: booking::Id,
    },

    /// [`BookingRequest`] was rejected by the host.
    RequestRejected {
        /// ID of the rejected [`BookingRequest`].
        request_id: booking_request::Id,
    },

    /// [`BookingRequest`] expired without an answer.
    RequestExpired {
        /// ID of the expired [`BookingRequest`].
        request_id: booking_request::Id,
    },

    /// Alteration of an accepted [`BookingRequest`] was proposed.
    AlterationProposed {
        /// ID of the proposed alteration.
        request_id: booking_request::Id,

        /// ID of the altered [`BookingRequest`].
        original_id: booking_request::Id,
    },

    /// Alteration was accepted, superseding the original [`Booking`].
    AlterationAccepted {
        /// ID of the accepted alteration.
        request_id: booking_request::Id,

        /// ID of the altered [`BookingRequest`].
        original_id: booking_request::Id,

        /// ID of the replacement [`Booking`].
        booking_id: booking::Id,
    },

    /// [`Booking`] was cancelled and its nights released.
    BookingCancelled {
        /// ID of the cancelled [`Booking`].
        booking_id: booking::Id,
    },
}
