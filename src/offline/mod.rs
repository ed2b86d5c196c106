// Offline write queue - durable FIFO of writes replayed once the server is reachable
mod queue;
mod record;
mod replay;
mod store;

pub use queue::{FlushReport, OfflineWriteQueue, RejectedWrite};
pub use record::{QueuedWrite, WriteMethod, WriteRequest};
pub use replay::{DEFAULT_REPLAY_TIMEOUT, HttpReplayer, ReplayError, WriteReplayer};
pub use store::{JsonFileQueueStore, MemoryQueueStore, QueueStore};
