//! Shared key-value store that several processes ("tabs") read and write.
//! Every write is a full snapshot of a key; writers are never merged.
//! Subscribers get a `StoreChange` for each write made by somebody else.

pub mod file;
pub mod memory;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Identity of one writer, so a subscriber can skip its own notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(Uuid);

impl WriterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WriterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WriterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    /// None when the key was removed.
    pub new_value: Option<String>,
    /// None when the write came from another process.
    pub origin: Option<WriterId>,
}

impl StoreChange {
    /// True unless `writer` made this change itself.
    pub fn is_foreign_to(&self, writer: WriterId) -> bool {
        self.origin != Some(writer)
    }
}

pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, origin: WriterId) -> Result<()>;

    fn remove(&self, key: &str, origin: WriterId) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
