//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
    iter,
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Error of a [`Task`] running in the [`Background`].
type TaskError = Box<dyn Error + 'static>;

/// Background environment for running [`Task`]s.
///
/// [`Task`]s are not required to be [`Send`], so they're spawned onto a
/// [`task::LocalSet`], driven once the [`Background`] is awaited.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set of tasks.
    set: task::LocalSet,

    /// Names and handles of the spawned tasks.
    handles: Vec<(&'static str, task::JoinHandle<Result<(), TaskError>>)>,
}

impl Background {
    /// Spawns a new named [`Task`] inside the [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!("`{name}` task spawned");
        self.handles.push((
            name,
            self.set
                .spawn_local(future.map_err(|e| TaskError::from(Box::new(e)))),
        ));
    }

    /// Returns the number of [`Task`]s spawned in this [`Background`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Indicates whether no [`Task`] was spawned in this [`Background`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl IntoFuture for Background {
    type Output = Result<(), TaskError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    /// Drives all the spawned [`Task`]s, resolving with the first failure.
    fn into_future(self) -> Self::IntoFuture {
        let Self { set, handles } = self;
        let handles = handles.into_iter().map(|(name, h)| {
            h.map(move |r| {
                let res = match r {
                    Ok(res) => res,
                    Err(e) => Err(TaskError::from(Box::new(e))),
                };
                if let Err(e) = &res {
                    log::error!("`{name}` task stopped: {e}");
                }
                res
            })
            .boxed_local()
        });
        future::try_join_all(iter::once(set.map(Ok).boxed_local()).chain(handles))
            .map_ok(drop)
            .boxed_local()
    }
}
