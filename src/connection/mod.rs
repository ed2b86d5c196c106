// Module declarations
mod driver;
mod handle;
mod manager;
mod options;
mod state;

// Public API exports
pub use handle::Connection;
pub use manager::ConnectionManager;
pub use options::{ConnectionManagerOptions, ConnectionOptions};
pub use state::{CloseCause, ConnectionEvent, ConnectionState, ConnectionStatus};
