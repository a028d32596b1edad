//! Label-addressed memory blocks shared between actors.
//!
//! A [`MemoryStore`] holds every [`MemoryBlock`] of an actor set. Blocks are
//! created once from a [`BlockSpec`], never deleted (a reset empties the
//! value), and only change through the validated operations on the store:
//!
//! - [`MemoryStore::write`]: substring replace-all with drift detection
//! - [`MemoryStore::append`]: pure accumulation for changelogs and plans
//! - [`MemoryStore::reset`]: clear to the empty string

mod block;
mod store;

pub use block::{AccessMode, AccessTable, BlockSpec, BlockView, MemoryBlock};
pub use store::MemoryStore;
