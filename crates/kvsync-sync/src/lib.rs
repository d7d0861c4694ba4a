//! Keeps objects synchronized with the changes of a key-value store.
//!
//! A [`SyncRouter`] consumes the change feed of a store one update at a
//! time. Each update is applied to the synchronized object whose format
//! covers its key, and the callback of that object is told which field
//! changed through a [`ChangeEvent`].
//!
//! # Design Rules
//!
//! 1. Synchronized objects have disjoint key spaces.
//! 2. Updates are applied one at a time, in the order the store delivers
//!    them.
//! 3. Objects are locked while an update is applied and while their
//!    callback runs.
//! 4. Updates that concern no synchronized object are consumed silently.

pub mod config;
pub mod error;
pub mod event;
pub mod router;

pub use config::{CallbackErrorPolicy, SyncConfig};
pub use error::{EventError, EventResult, SyncError, SyncResult};
pub use event::ChangeEvent;
pub use router::{CallbackError, RegistrationId, SyncCallback, SyncObject, SyncRouter};
