use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    Post,
    Put,
    Patch,
    Delete,
}

impl WriteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A write that could not reach the server.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Path relative to the API base, or an absolute URL.
    pub url: String,
    pub method: WriteMethod,
    pub body: Option<Value>,
}

impl WriteRequest {
    pub fn new(method: WriteMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// One persisted queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub url: String,
    pub method: WriteMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Milliseconds since the Unix epoch at enqueue time.
    pub timestamp: u64,
}

impl QueuedWrite {
    pub(crate) fn stamp(request: WriteRequest) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self {
            url: request.url,
            method: request.method,
            body: request.body,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_shape() {
        let write = QueuedWrite {
            url: "api/messages/".to_string(),
            method: WriteMethod::Post,
            body: Some(json!({"text": "hi"})),
            timestamp: 1_700_000_000_000,
        };

        assert_eq!(
            serde_json::to_value(&write).unwrap(),
            json!({
                "url": "api/messages/",
                "method": "POST",
                "body": {"text": "hi"},
                "timestamp": 1_700_000_000_000u64
            })
        );
    }

    #[test]
    fn test_stamp_records_enqueue_time() {
        let write = QueuedWrite::stamp(WriteRequest::new(WriteMethod::Delete, "api/messages/4/"));
        assert_eq!(write.method, WriteMethod::Delete);
        assert_eq!(write.body, None);
        assert!(write.timestamp > 0);
    }
}
