//! Local history of generated images

pub mod record;
pub mod storage;
pub mod store;

pub use record::HistoryRecord;
pub use storage::{FileStorage, HistoryStorage, MemoryStorage};
pub use store::{HistoryStats, HistoryStore};
