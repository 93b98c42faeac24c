//! Mock backend for testing
//!
//! Replies are scripted per test; once the script runs out every call gets
//! [`MockBackend::DEFAULT_REPLY`], a fenced receipt wrapped in prose.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text as the model output
    Text(String),
    /// Fail as if the provider answered with this HTTP status
    Status(u16),
    /// Wait, then return the text
    Delayed(Duration, String),
}

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub const DEFAULT_REPLY: &'static str = "Sure! Here is the data I found on the receipt:\n\
```json\n\
{\n\
  \"merchant\": \"Corner Market\",\n\
  \"date\": \"2024-03-15\",\n\
  \"total_amount\": 27.00,\n\
  \"currency\": \"USD\",\n\
  \"payment_method\": \"card\",\n\
  \"category\": \"groceries\",\n\
  \"description\": \"Weekly groceries\",\n\
  \"receipt_number\": \"A-1042\",\n\
  \"taxes\": 2.00,\n\
  \"items\": [\n\
    {\"name\": \"Coffee beans\", \"quantity\": 1, \"unit_price\": 15.00, \"total_price\": 15.00},\n\
    {\"name\": \"Bread\", \"quantity\": 4, \"unit_price\": 2.50}\n\
  ]\n\
}\n\
```\n\
Let me know if you need anything else.";

    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Mock that answers each call with the next scripted reply
    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mock = Self::new();
        if let Ok(mut queue) = mock.replies.lock() {
            queue.extend(replies);
        }
        mock
    }

    /// Mock that always answers with the same text
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_replies([MockReply::Text(text.into())])
    }

    /// Number of vision calls made so far (shared between clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn vision_completion(
        &self,
        _prompt: &str,
        _image_data: &[u8],
        _media_type: &str,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = {
            let mut queue = self
                .replies
                .lock()
                .map_err(|_| Error::InvalidData("Failed to acquire mock reply lock".into()))?;
            // The last scripted reply keeps answering once the queue drains
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match reply {
            None => Ok(Self::DEFAULT_REPLY.to_string()),
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Status(status)) => Err(Error::Provider {
                status,
                body: "mock provider failure".into(),
            }),
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
