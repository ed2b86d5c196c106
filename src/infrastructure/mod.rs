// Infrastructure module - Timers, liveness, credentials and background task plumbing
pub mod credentials;
pub mod endpoint;
pub mod heartbeat;
pub mod task_manager;
pub mod timer;

pub use credentials::{CredentialSource, SharedCredentials};
pub use endpoint::resolve_ws_url;
pub use heartbeat::{HeartbeatBeacon, HeartbeatConfig};
pub use task_manager::TaskManager;
pub use timer::{ReconnectPolicy, Timer};
