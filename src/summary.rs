use tracing::warn;
use uuid::Uuid;

use crate::stream::Message;

/// Client for the external summarization service. Opaque and fire-and-forget
/// from the engine's perspective: history goes out, nothing lifecycle-related
/// depends on the answer.
#[derive(Clone)]
pub struct Summarizer {
    client: reqwest::Client,
    url: Option<String>,
}

impl Summarizer {
    /// `url = None` disables summarization entirely.
    pub fn new(url: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), url }
    }

    pub fn summarize(&self, room_id: Uuid, history: Vec<Message>) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            let body = serde_json::json!({ "room_id": room_id, "messages": history });
            if let Err(err) = client.post(&url).json(&body).send().await {
                warn!(%room_id, "summarization request failed: {err}");
            }
        });
    }
}
