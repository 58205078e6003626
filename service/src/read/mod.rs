//! Read entities definitions.

pub mod booking_request;
