use realtime_call_rs::{
    ConnectionEvent, ConnectionManager, ConnectionManagerOptions, ConnectionOptions,
    SharedCredentials,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Listen to the notification channel of a realtime server until Ctrl-C
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("REALTIME_URL").expect("REALTIME_URL must be set in .env");
    let token = std::env::var("REALTIME_TOKEN").ok();
    let path = std::env::var("REALTIME_PATH").unwrap_or_else(|_| "ws/notifications/".to_string());

    let credentials = Arc::new(SharedCredentials::new(token));
    let manager = ConnectionManager::new(&url, credentials, ConnectionManagerOptions::from_env())?;

    println!("📡 Connecting to {}{}\n", url, path);
    let (connection, mut events) = manager.open(&path, ConnectionOptions::default())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n👋 Closing...");
                break;
            }
            event = events.recv() => match event {
                Some(ConnectionEvent::Opened) => println!("✅ Connected"),
                Some(ConnectionEvent::Message(payload)) => {
                    let kind = payload["type"].as_str().unwrap_or("?");
                    println!("📨 {}: {}", kind, payload);
                }
                Some(ConnectionEvent::Closed { cause, reconnecting }) => {
                    println!(
                        "⚠️  Closed ({:?}), reconnecting: {} (attempt {})",
                        cause,
                        reconnecting,
                        connection.reconnect_attempts()
                    );
                    if !reconnecting {
                        break;
                    }
                }
                Some(ConnectionEvent::Error(error)) => println!("❌ {}", error),
                None => break,
            }
        }
    }

    connection.close();
    Ok(())
}
