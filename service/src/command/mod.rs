//! [`Command`] definition.

pub mod accept_alteration;
pub mod accept_booking_request;
pub mod cancel_booking;
pub mod create_listing;
pub mod expire_booking_request;
pub mod propose_alteration;
pub mod publish_listing;
pub mod reject_booking_request;
pub mod set_availability;
pub mod submit_booking_request;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    accept_alteration::AcceptAlteration,
    accept_booking_request::AcceptBookingRequest,
    cancel_booking::CancelBooking, create_listing::CreateListing,
    expire_booking_request::ExpireBookingRequest,
    propose_alteration::ProposeAlteration, publish_listing::PublishListing,
    reject_booking_request::RejectBookingRequest,
    set_availability::SetAvailability,
    submit_booking_request::SubmitBookingRequest,
};
