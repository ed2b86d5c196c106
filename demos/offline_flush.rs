use realtime_call_rs::offline::JsonFileQueueStore;
use realtime_call_rs::{
    HttpReplayer, OfflineWriteQueue, SharedCredentials, WriteMethod, WriteRequest,
};
use serde_json::json;
use std::sync::Arc;

/// Queue a few writes on disk, then try to replay them against the API
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let api_url = std::env::var("REALTIME_API_URL").expect("REALTIME_API_URL must be set in .env");
    let token = std::env::var("REALTIME_TOKEN").ok();
    let queue_path =
        std::env::var("OFFLINE_QUEUE_PATH").unwrap_or_else(|_| "offline-queue.json".to_string());

    let store = Arc::new(JsonFileQueueStore::new(&queue_path));
    let queue = OfflineWriteQueue::open(store).await?;
    println!("📦 {} writes restored from {}", queue.len().await, queue_path);

    for text in ["first", "second", "third"] {
        queue
            .enqueue(
                WriteRequest::new(WriteMethod::Post, "api/messages/")
                    .with_body(json!({ "text": text })),
            )
            .await?;
    }
    println!("📝 Queued 3 writes ({} pending)\n", queue.len().await);

    let credentials = Arc::new(SharedCredentials::new(token));
    let replayer = HttpReplayer::new(&api_url, credentials)?;

    let report = queue.flush(&replayer).await;
    println!("✅ Replayed: {}", report.replayed());
    for rejected in &report.rejected {
        println!("❌ Rejected {}: {}", rejected.write.url, rejected.reason);
    }
    println!("⏳ Still queued: {}", report.remaining);

    Ok(())
}
