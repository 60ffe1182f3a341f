//! The transaction state machine the clerk talks to, and a stub cluster
//! serving it over a [`LocalNet`](crate::net::LocalNet).

pub mod msg;
pub mod server;
