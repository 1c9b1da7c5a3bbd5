//! Coordination pieces of the feed engine: cancellable fetching, lifecycle
//! tracking, the optimistic read state machine and the poller.

pub mod fetcher;
pub mod guard;
pub mod mutator;
pub mod poller;

pub use fetcher::{Category, Fetcher, Ticket};
pub use guard::{InFlight, LifecycleGuard};
pub use mutator::{Mutator, ReadPhase, Settlement};
pub use poller::Poller;
