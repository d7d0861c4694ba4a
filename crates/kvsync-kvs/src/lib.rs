//! Key-value store interfaces consumed by kvsync.
//!
//! A store is reached through three narrow traits: [`Store`] to write
//! pairs, [`Get`] to read them back and [`ChangeSource`] to follow every
//! change. Backends implement whichever of them they support.
//!
//! [`MemoryKvs`] implements all three and is intended for tests and
//! embedding.

pub mod error;
pub mod memory;
pub mod traits;
pub mod update;

pub use error::{KvsError, KvsResult};
pub use memory::MemoryKvs;
pub use traits::{ChangeSource, Get, Store};
pub use update::Update;
