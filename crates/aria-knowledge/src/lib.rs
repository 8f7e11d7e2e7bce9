//! aria-knowledge: append-only knowledge store
//!
//! Every fact the assistant observes or infers lands here as an immutable,
//! typed `KnowledgeEntry`. Entries are indexed by owner, kind, and keyword so
//! scoped searches stay sub-linear in store size. A pluggable backend decides
//! whether entries also reach disk.

pub mod backend;
pub mod config;
pub mod entry;
pub mod store;

pub use backend::{JsonlBackend, MemoryBackend, StoreBackend};
pub use config::KnowledgeConfig;
pub use entry::{Content, KnowledgeEntry, SearchFilter};
pub use store::{KnowledgeStore, StoreStats};
