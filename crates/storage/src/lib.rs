//! Storage and notification contracts for haulflow.
//!
//! The production persistence store and push pipeline are external
//! collaborators; this crate defines the traits the workflow engine
//! depends on, plus in-process implementations for tests and embedding.

pub mod error;
pub mod memory;
pub mod notifier;
pub mod store;

pub use error::{NotifyError, StorageError, StorageResult};
pub use memory::MemoryStore;
pub use notifier::{ChannelNotifier, LoadEvent, LoadEventKind, Notifier, NullNotifier};
pub use store::{LoadStore, TripStore};
