//! In-memory [`Database`] implementation.
//!
//! Mirrors the transactional semantics of [`Postgres`]: changes made in a
//! [`Tx`] are invisible to others until committed and are discarded once the
//! [`Tx`] is dropped, while [`Listing`] locks are held until then.
//!
//! [`Postgres`]: crate::infra::Postgres

mod impls;

use std::{
    collections::{BTreeMap, HashMap},
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use common::Date;
use derive_more::Deref;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{
    booking, booking_request, calendar, listing, Booking, BookingRequest,
    Listing,
};
#[cfg(doc)]
use crate::infra::Database;

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default, Deref)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Data of a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Stored [`Listing`]s.
    listings: HashMap<listing::Id, Listing>,

    /// Stored [`calendar::Day`]s, ordered by [`Listing`] and [`Date`].
    days: BTreeMap<(listing::Id, Date), calendar::Day>,

    /// Stored [`Booking`]s.
    bookings: HashMap<booking::Id, Booking>,

    /// Stored [`BookingRequest`]s.
    requests: HashMap<booking_request::Id, BookingRequest>,
}

impl State {
    /// Applies all the changes of the `other` [`State`] to this one.
    fn merge(&mut self, other: Self) {
        let Self {
            listings,
            days,
            bookings,
            requests,
        } = other;
        self.listings.extend(listings);
        self.days.extend(days);
        self.bookings.extend(bookings);
        self.requests.extend(requests);
    }
}

/// Read-only view of a [`State`], with uncommitted changes on top of it.
#[derive(Clone, Copy, Debug)]
pub struct View<'s> {
    /// Committed [`State`].
    base: &'s State,

    /// Uncommitted changes, if any.
    overlay: Option<&'s State>,
}

impl<'s> View<'s> {
    /// Returns the [`Listing`] with the provided ID.
    fn listing(&self, id: listing::Id) -> Option<&'s Listing> {
        self.overlay
            .and_then(|o| o.listings.get(&id))
            .or_else(|| self.base.listings.get(&id))
    }

    /// Returns the stored [`calendar::Day`]s of the [`Listing`] within the
    /// provided range, ordered by their [`Date`]s.
    fn days(
        &self,
        listing_id: listing::Id,
        range: calendar::Stay,
    ) -> Vec<calendar::Day> {
        let bounds =
            (listing_id, range.check_in())..(listing_id, range.check_out());
        let mut days = self
            .base
            .days
            .range(bounds.clone())
            .map(|((_, date), day)| (*date, day.clone()))
            .collect::<BTreeMap<_, _>>();
        if let Some(overlay) = self.overlay {
            days.extend(
                overlay
                    .days
                    .range(bounds)
                    .map(|((_, date), day)| (*date, day.clone())),
            );
        }
        days.into_values().collect()
    }

    /// Returns the [`Booking`] with the provided ID.
    fn booking(&self, id: booking::Id) -> Option<&'s Booking> {
        self.overlay
            .and_then(|o| o.bookings.get(&id))
            .or_else(|| self.base.bookings.get(&id))
    }

    /// Iterates over all the [`Booking`]s.
    fn bookings(&self) -> impl Iterator<Item = &'s Booking> {
        let (base, overlay) = (self.base, self.overlay);
        base.bookings
            .values()
            .filter(move |b| {
                overlay.is_none_or(|o| !o.bookings.contains_key(&b.id))
            })
            .chain(overlay.into_iter().flat_map(|o| o.bookings.values()))
    }

    /// Returns the [`BookingRequest`] with the provided ID.
    fn request(&self, id: booking_request::Id) -> Option<&'s BookingRequest> {
        self.overlay
            .and_then(|o| o.requests.get(&id))
            .or_else(|| self.base.requests.get(&id))
    }

    /// Iterates over all the [`BookingRequest`]s.
    fn requests(&self) -> impl Iterator<Item = &'s BookingRequest> {
        let (base, overlay) = (self.base, self.overlay);
        base.requests
            .values()
            .filter(move |r| {
                overlay.is_none_or(|o| !o.requests.contains_key(&r.id))
            })
            .chain(overlay.into_iter().flat_map(|o| o.requests.values()))
    }
}

/// Generic [`Memory`] database connection.
pub trait Connection {
    /// Reads the current [`View`] of the data.
    fn read<R>(&self, f: impl FnOnce(View<'_>) -> R) -> R;

    /// Modifies the data visible to this [`Connection`].
    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R;
}

/// Storage shared by all the [`Memory`] clients.
#[derive(Debug, Default)]
struct Storage {
    /// Committed [`State`].
    state: RwLock<State>,

    /// Locks of [`Listing`]s.
    locks: Mutex<HashMap<listing::Id, Arc<AsyncMutex<()>>>>,
}

/// Non-transactional [`Memory`] database client.
///
/// Every change is committed immediately.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// [`Storage`] of the database.
    storage: Arc<Storage>,
}

impl Connection for NonTx {
    fn read<R>(&self, f: impl FnOnce(View<'_>) -> R) -> R {
        let state = self
            .storage
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(View {
            base: &*state,
            overlay: None,
        })
    }

    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self
            .storage
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }
}

/// Transactional [`Memory`] database client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`Storage`] of the database.
    storage: Arc<Storage>,

    /// Uncommitted changes and held locks of this [`Tx`].
    scope: Arc<Mutex<Scope>>,
}

/// Uncommitted state of a [`Tx`].
#[derive(Debug, Default)]
struct Scope {
    /// Uncommitted changes.
    overlay: State,

    /// Held [`Listing`] locks.
    guards: HashMap<listing::Id, OwnedMutexGuard<()>>,
}

impl Tx {
    /// Starts a new [`Tx`] over the [`Storage`] of the provided [`NonTx`]
    /// client.
    fn from_non_tx(client: &NonTx) -> Self {
        Self {
            storage: Arc::clone(&client.storage),
            scope: Arc::default(),
        }
    }

    /// Returns the [`Scope`] of this [`Tx`].
    fn scope(&self) -> MutexGuard<'_, Scope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the [`Listing`] with the provided ID until this [`Tx`] is
    /// committed or dropped.
    ///
    /// Locking the same [`Listing`] twice in a [`Tx`] is a no-op.
    async fn lock(&self, id: listing::Id) {
        if self.scope().guards.contains_key(&id) {
            return;
        }
        let mutex = Arc::clone(
            self.storage
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_default(),
        );
        let guard = mutex.lock_owned().await;
        _ = self.scope().guards.insert(id, guard);
    }

    /// Commits this [`Tx`], releasing all its locks.
    fn commit(&self) {
        let Scope { overlay, guards } = mem::take(&mut *self.scope());
        self.storage
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(overlay);
        drop(guards);
    }
}

impl Connection for Tx {
    fn read<R>(&self, f: impl FnOnce(View<'_>) -> R) -> R {
        let scope = self.scope();
        let state = self
            .storage
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(View {
            base: &*state,
            overlay: Some(&scope.overlay),
        })
    }

    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.scope().overlay)
    }
}
