mod factory;

pub use factory::{Connector, Transport, TransportEvent, WebSocketFactory, WebSocketTransport};
