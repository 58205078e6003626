//! Background [`Task`]s definitions.

mod background;
pub mod expire_booking_requests;

pub use common::Handler as Task;

pub use self::{
    background::Background, expire_booking_requests::ExpireBookingRequests,
};
