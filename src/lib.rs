#[macro_use]
extern crate log;

pub mod clerk;
pub mod config;
pub mod net;
pub mod shell;
pub mod tsm;

pub use clerk::{ActionOutcome, Clerk, Error};
pub use net::{LocalNet, NodeId, Transport};
