use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::labeler::{
    BackendError, CategoryDefinition, ClassificationBackend, LabelMap, LabelRequest, OTHERS,
};
use crate::prompts::{system_classifier, user_batch};

/// OpenAI-compatible chat completions endpoint.
pub struct ChatBackend {
    client: Client,
    endpoint: Url,
    model: String,
    token: String,
}

impl ChatBackend {
    pub fn new(api_base: &str, model: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        // Url::join drops the last path segment unless the base ends in '/'
        let base = if api_base.ends_with('/') {
            Url::parse(api_base)?
        } else {
            Url::parse(&format!("{api_base}/"))?
        };
        let endpoint = base.join("chat/completions")?;
        let client = Client::builder().timeout(timeout).build()?;
        debug!("Chat backend ready - endpoint={}, model={}", endpoint, model);
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ClassificationBackend for ChatBackend {
    async fn classify_batch(
        &self,
        batch: &[LabelRequest],
        categories: &[CategoryDefinition],
    ) -> Result<LabelMap, BackendError> {
        let start = std::time::Instant::now();
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system_classifier(categories) },
                { "role": "user", "content": user_batch(batch) },
            ],
        });

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        info!(
            "Chat API call completed - duration={:.2}s, batch={}, response_length={} chars",
            start.elapsed().as_secs_f32(),
            batch.len(),
            content.len()
        );

        parse_label_response(&content)
    }
}

/// Parse the model's JSON answer into a label map.
///
/// Accepts a bare array or one wrapped in a ``` fence. Ids may be strings or numbers;
/// `category` may be a string or an array. Entries without usable categories map to
/// `Others`.
pub fn parse_label_response(content: &str) -> Result<LabelMap, BackendError> {
    let cleaned = strip_code_fence(content.trim());
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| BackendError::MalformedResponse("expected a JSON array".into()))?;

    let mut out = LabelMap::new();
    for item in items {
        let id = match item.get("id") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        let mut labels: Vec<String> = match item.get("category") {
            Some(Value::String(s)) => vec![s.trim().to_string()],
            Some(Value::Array(xs)) => xs
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .collect(),
            _ => Vec::new(),
        };
        labels.retain(|l| !l.is_empty());
        if labels.is_empty() {
            labels.push(OTHERS.to_string());
        }
        out.insert(id, labels);
    }
    Ok(out)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // drop the info string ("json") on the opening line
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
