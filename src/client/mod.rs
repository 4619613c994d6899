//! Dashboard client.
//!
//! Talks to the queuewatch API, keeps the latest queue list and metrics in a
//! [`QueuesStore`], and submits queue actions through an [`ActionDispatcher`].

mod actions;
mod api;
mod poller;
mod queues;
mod render;
mod store;

pub use actions::*;
pub use api::*;
pub use poller::*;
pub use queues::*;
pub use render::*;
pub use store::*;
