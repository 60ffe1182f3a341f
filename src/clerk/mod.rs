//! Client side of the replicated state machine.
//!
//! A [`Clerk`] finds the leader through [`LeaderCache`], submits actions and
//! polls the leader until it sees the outcome recorded under the action's
//! request id, resubmitting the same action if confirmation takes too long.
//! Every retry is paced by [`Backoff`].

mod backoff;
mod client;
mod leader;
pub mod msg;

pub use backoff::{Backoff, BACKOFF_CEILING, BACKOFF_FLOOR};
pub use client::{ActionOutcome, Clerk, MAX_CHECK_COUNT_BEFORE_RETRY};
pub use leader::{Leader, LeaderCache};

use tokio::sync::watch;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The leader answered, but the query itself failed, e.g. a missing key.
    #[error("{0}")]
    Query(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("the cluster has no members")]
    NoMembers,
    #[error("malformed reply: {0}")]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Optional stop signal, checked at the head of every retry loop.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Option<watch::Receiver<bool>>);

impl Cancel {
    /// A signal that never fires.
    pub fn never() -> Self {
        Cancel(None)
    }

    /// Fires once `true` is sent on the paired sender.
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Cancel(Some(rx))
    }

    pub fn check(&self) -> Result<()> {
        match &self.0 {
            Some(rx) if *rx.borrow() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}
