//! Fixtures for [`Service`] tests over the [`Memory`] database.

use std::str::FromStr as _;

use common::{
    operations::{By, Select},
    Date, Money,
};

use crate::{
    command::{
        AcceptBookingRequest, CreateListing, ProposeAlteration,
        PublishListing, SetAvailability, SubmitBookingRequest,
    },
    domain::{
        booking::Pricing,
        booking_request::Proposal,
        calendar::{Blocks, Stay},
        user, Booking, BookingRequest, Listing,
    },
    infra::{Database as _, Memory},
    task, Command as _, Config, Service,
};

/// [`Service`] under test.
pub(crate) type TestService = Service<Memory>;

/// Creates a new [`TestService`] over an empty [`Memory`] database.
pub(crate) fn service() -> (TestService, task::Background) {
    Service::new(Config::default(), Memory::new())
}

/// Parses the provided `YYYY-MM-DD` [`Date`].
pub(crate) fn date(s: &str) -> Date {
    Date::from_str(s).unwrap()
}

/// Creates a [`Stay`] between the provided `YYYY-MM-DD` [`Date`]s.
pub(crate) fn stay(check_in: &str, check_out: &str) -> Stay {
    Stay::new(date(check_in), date(check_out)).unwrap()
}

/// Creates a new published [`Listing`] of a new owner, priced by `price`
/// per night.
pub(crate) async fn listing(svc: &TestService, price: &str) -> Listing {
    let owner_id = user::Id::new();
    let listing = svc
        .execute(CreateListing {
            owner_id,
            price_per_night: Money::from_str(price).unwrap(),
            minimum_stay: 1,
            maximum_guests: 4,
            pets_allowed: false,
        })
        .await
        .unwrap();
    svc.execute(PublishListing {
        listing_id: listing.id,
        initiator_id: owner_id,
        publish: true,
    })
    .await
    .unwrap()
}

/// Submits a new [`BookingRequest`] of a new guest.
pub(crate) async fn request(
    svc: &TestService,
    listing: &Listing,
    check_in: &str,
    check_out: &str,
) -> BookingRequest {
    svc.execute(SubmitBookingRequest {
        listing_id: listing.id,
        guest_id: user::Id::new(),
        proposal: proposal(check_in, check_out),
    })
    .await
    .unwrap()
}

/// Submits a new [`BookingRequest`] of a new guest and accepts it,
/// returning the accepted [`BookingRequest`] and its [`Booking`].
pub(crate) async fn booked(
    svc: &TestService,
    listing: &Listing,
    check_in: &str,
    check_out: &str,
) -> (BookingRequest, Booking) {
    let request = request(svc, listing, check_in, check_out).await;
    let booking = svc
        .execute(AcceptBookingRequest {
            request_id: request.id,
            initiator_id: listing.owner_id,
            pricing: Pricing::Quoted,
            blocks: Blocks::Respect,
        })
        .await
        .unwrap();
    let request = svc
        .database()
        .execute(Select(By::<Option<BookingRequest>, _>::new(request.id)))
        .await
        .unwrap()
        .unwrap();
    (request, booking)
}

/// Proposes an alteration of the `original` [`BookingRequest`] by its
/// guest.
pub(crate) async fn alteration(
    svc: &TestService,
    original: &BookingRequest,
    check_in: &str,
    check_out: &str,
) -> BookingRequest {
    svc.execute(ProposeAlteration {
        original_id: original.id,
        initiator_id: original.guest_id,
        proposal: proposal(check_in, check_out),
    })
    .await
    .unwrap()
}

/// Blocks the night of the provided [`Date`] by the [`Listing`] owner.
pub(crate) async fn block(svc: &TestService, listing: &Listing, night: &str) {
    _ = svc
        .execute(SetAvailability {
            listing_id: listing.id,
            initiator_id: listing.owner_id,
            date: date(night),
            available: false,
            price: None,
        })
        .await
        .unwrap();
}

/// Overrides the price of the night of the provided [`Date`].
pub(crate) async fn reprice(
    svc: &TestService,
    listing: &Listing,
    night: &str,
    price: &str,
) {
    _ = svc
        .execute(SetAvailability {
            listing_id: listing.id,
            initiator_id: listing.owner_id,
            date: date(night),
            available: true,
            price: Some(Money::from_str(price).unwrap()),
        })
        .await
        .unwrap();
}

/// Creates a [`Proposal`] of two guests without pets.
fn proposal(check_in: &str, check_out: &str) -> Proposal {
    Proposal {
        check_in: date(check_in),
        check_out: date(check_out),
        guests: 2,
        pets: false,
        message: "Looking forward to it!".into(),
    }
}
