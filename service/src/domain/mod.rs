//! Domain definitions.

pub mod booking;
pub mod booking_request;
pub mod calendar;
pub mod listing;
pub mod user;

pub use self::{
    booking::Booking, booking_request::BookingRequest, calendar::Calendar,
    listing::Listing, user::User,
};
