//! Response cache for the portal backend.
//!
//! Most resources are only refreshed by a nightly batch, so they stay fresh
//! until the next cutover hour; resources users change in-session use a short
//! window; a few are never cached. [`Orchestrator`] coalesces concurrent
//! fetches of one [`CacheKey`] into a single backend call.

mod clock;
mod key;
mod orchestrator;
mod policy;
mod store;
mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{CacheKey, KeyPattern};
pub use orchestrator::Orchestrator;
pub use policy::{
    DEFAULT_CUTOVER_HOUR, DEFAULT_INTERACTIVE_WINDOW, ResourceKind, Staleness, StalenessClass,
    StalenessPolicy,
};
pub use store::{CacheStore, EntryInfo};
pub use subscription::{ResourceState, Subscription};
