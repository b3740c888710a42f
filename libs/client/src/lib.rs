//! Client side mirror of a held reservation
//!
//! Talks to the booking API over HTTP and keeps a local countdown of the
//! running hold so a UI can show how long a slot stays reserved.

#[macro_use]
extern crate tracing;

mod api;
mod store;
mod tracker;

pub use api::*;
pub use store::*;
pub use tracker::*;
