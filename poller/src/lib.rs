//! Cancellable polling of a single HTTP endpoint.
//!
//! A [`Poller`] starts as soon as it is created: it fetches, hands the
//! decoded payload to a callback, then sleeps for whatever is left of the
//! interval so that cycle *starts* stay on cadence. Failures are logged and
//! retried after a full interval until [`Poller::stop`] is called.

pub mod error;
pub mod fetch;
pub mod poller;

pub use error::PollError;
pub use fetch::{Fetch, HttpFetcher};
pub use poller::{Poller, PollerConfig, PollerState, PollerStats, DEFAULT_INTERVAL};
